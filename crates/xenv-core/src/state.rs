use crate::error::{Result, XenvError};
use crate::io;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

// ---------------------------------------------------------------------------
// ActivityState
// ---------------------------------------------------------------------------

/// Activation state for one scope: active SDK versions, environment
/// variables, extra PATH entries and required tools.
///
/// `paths` keeps insertion order and never holds duplicates. Map keys are
/// never empty. `has_update` tracks whether the in-memory state differs from
/// what was last loaded or written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityState {
    paths: Vec<String>,
    sdks: BTreeMap<String, String>,
    envs: BTreeMap<String, String>,
    tools: BTreeMap<String, String>,
    #[serde(skip)]
    file: PathBuf,
    #[serde(skip)]
    has_update: bool,
}

/// On-disk shape. Unknown keys and sections are ignored here and preserved
/// by the line updater.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StateFile {
    paths: Vec<String>,
    sdks: BTreeMap<String, String>,
    envs: BTreeMap<String, String>,
    tools: BTreeMap<String, String>,
}

impl ActivityState {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        ActivityState {
            file: file.into(),
            ..Default::default()
        }
    }

    /// Load state from `file`. A missing file yields an empty state bound to
    /// that path; a malformed one is an error naming the file.
    pub fn load(file: &Path) -> Result<Self> {
        let mut state = match io::read_optional(file)? {
            Some(data) => Self::from_toml_str(&data).map_err(|e| XenvError::StateParse {
                path: file.to_path_buf(),
                message: e.to_string(),
            })?,
            None => Self::default(),
        };
        debug!(file = %file.display(), empty = state.is_empty(), "loaded state");
        state.file = file.to_path_buf();
        Ok(state)
    }

    pub fn from_toml_str(data: &str) -> std::result::Result<Self, toml::de::Error> {
        let raw: StateFile = toml::from_str(data)?;
        let mut state = ActivityState::default();
        for p in raw.paths {
            state.push_path(p);
        }
        state.sdks = non_empty_keys(raw.sdks);
        state.envs = non_empty_keys(raw.envs);
        state.tools = non_empty_keys(raw.tools);
        Ok(state)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn sdks(&self) -> &BTreeMap<String, String> {
        &self.sdks
    }

    pub fn envs(&self) -> &BTreeMap<String, String> {
        &self.envs
    }

    pub fn tools(&self) -> &BTreeMap<String, String> {
        &self.tools
    }

    /// Active versions of SDKs, or of plain tools.
    pub fn versions(&self, is_sdk: bool) -> &BTreeMap<String, String> {
        if is_sdk {
            &self.sdks
        } else {
            &self.tools
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn set_file(&mut self, file: impl Into<PathBuf>) {
        self.file = file.into();
    }

    pub fn has_update(&self) -> bool {
        self.has_update
    }

    pub(crate) fn mark_clean(&mut self) {
        self.has_update = false;
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
            && self.sdks.is_empty()
            && self.envs.is_empty()
            && self.tools.is_empty()
    }

    pub fn exists_path(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append `path` unless it is already active. Returns true if added.
    pub fn add_active_path(&mut self, path: &str) -> bool {
        let added = self.push_path(path.to_string());
        self.has_update |= added;
        added
    }

    pub fn remove_paths(&mut self, paths: &[String]) {
        let before = self.paths.len();
        self.paths.retain(|p| !paths.contains(p));
        self.has_update |= self.paths.len() != before;
    }

    /// Bulk upsert of SDK versions, env vars and paths.
    pub fn add_tools_with_envs_paths(
        &mut self,
        sdks: &BTreeMap<String, String>,
        envs: &BTreeMap<String, String>,
        paths: &[String],
    ) {
        for (name, version) in sdks {
            self.activate_sdk(name, version);
        }
        for (name, value) in envs {
            self.set_env(name, value);
        }
        for p in paths {
            self.add_active_path(p);
        }
    }

    /// Bulk delete. Missing entries are ignored.
    pub fn del_tools_with_envs_paths(
        &mut self,
        names: &[String],
        env_names: &[String],
        paths: &[String],
    ) {
        for name in names {
            self.remove_sdk(name);
        }
        self.unset_envs(env_names);
        self.remove_paths(paths);
    }

    pub fn activate_sdk(&mut self, name: &str, version: &str) {
        upsert(&mut self.sdks, &mut self.has_update, name, version);
    }

    pub fn remove_sdk(&mut self, name: &str) -> Option<String> {
        let removed = self.sdks.remove(name);
        self.has_update |= removed.is_some();
        removed
    }

    pub fn set_env(&mut self, name: &str, value: &str) {
        upsert(&mut self.envs, &mut self.has_update, name, value);
    }

    pub fn unset_envs(&mut self, names: &[String]) {
        for name in names {
            self.has_update |= self.envs.remove(name).is_some();
        }
    }

    /// Record required tools and their version constraints.
    pub fn add_tools(&mut self, tools: &BTreeMap<String, String>) {
        for (name, constraint) in tools {
            upsert(&mut self.tools, &mut self.has_update, name, constraint);
        }
    }

    pub fn remove_tools(&mut self, names: &[String]) {
        for name in names {
            self.has_update |= self.tools.remove(name).is_some();
        }
    }

    /// Apply `other` on top of `self`: its map entries win, its paths are
    /// appended when not already present. An empty `other` is a no-op.
    pub fn merge(&mut self, other: &ActivityState) {
        if other.is_empty() {
            return;
        }
        self.add_tools_with_envs_paths(&other.sdks, &other.envs, &other.paths);
        self.add_tools(&other.tools);
    }

    /// Drop all content, keeping the backing file.
    pub fn reset(&mut self) {
        if !self.is_empty() {
            self.has_update = true;
        }
        self.paths.clear();
        self.sdks.clear();
        self.envs.clear();
        self.tools.clear();
    }

    fn push_path(&mut self, path: String) -> bool {
        if path.is_empty() || self.exists_path(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }
}

fn upsert(map: &mut BTreeMap<String, String>, dirty: &mut bool, key: &str, value: &str) {
    if key.is_empty() {
        return;
    }
    if map.get(key).map(String::as_str) != Some(value) {
        map.insert(key.to_string(), value.to_string());
        *dirty = true;
    }
}

fn non_empty_keys(map: BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.into_iter().filter(|(k, _)| !k.is_empty()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_active_path_dedups() {
        let mut state = ActivityState::default();
        assert!(state.add_active_path("/opt/go/bin"));
        assert!(!state.add_active_path("/opt/go/bin"));
        assert_eq!(state.paths(), &["/opt/go/bin".to_string()]);
        assert!(state.has_update());
    }

    #[test]
    fn empty_args_are_noops() {
        let mut state = ActivityState::default();
        state.add_tools_with_envs_paths(&BTreeMap::new(), &BTreeMap::new(), &[]);
        state.del_tools_with_envs_paths(&[], &[], &[]);
        state.remove_paths(&[]);
        state.add_active_path("");
        state.set_env("", "x");
        assert!(state.is_empty());
        assert!(!state.has_update());
    }

    #[test]
    fn remove_paths_is_idempotent() {
        let mut state = ActivityState::default();
        state.add_active_path("/a");
        state.add_active_path("/b");
        state.remove_paths(&strings(&["/a", "/missing"]));
        state.remove_paths(&strings(&["/a"]));
        assert_eq!(state.paths(), &["/b".to_string()]);
    }

    #[test]
    fn bulk_upsert_and_delete() {
        let mut state = ActivityState::default();
        state.add_tools_with_envs_paths(
            &map(&[("go", "1.22"), ("node", "20")]),
            &map(&[("GOROOT", "/opt/go")]),
            &strings(&["/opt/go/bin"]),
        );
        assert_eq!(state.sdks().get("go").unwrap(), "1.22");
        assert_eq!(state.envs().get("GOROOT").unwrap(), "/opt/go");

        state.del_tools_with_envs_paths(
            &strings(&["go", "rust"]),
            &strings(&["GOROOT", "NOPE"]),
            &strings(&["/opt/go/bin"]),
        );
        assert_eq!(state.sdks().len(), 1);
        assert!(state.envs().is_empty());
        assert!(state.paths().is_empty());
    }

    #[test]
    fn merge_empty_is_noop() {
        let mut state = ActivityState::default();
        state.activate_sdk("go", "1.22");
        let before = state.clone();
        state.merge(&ActivityState::default());
        assert_eq!(state, before);
    }

    #[test]
    fn merge_other_wins() {
        let mut base = ActivityState::default();
        base.activate_sdk("go", "1.21");
        base.set_env("A", "1");
        base.add_active_path("/base");

        let mut over = ActivityState::default();
        over.activate_sdk("go", "1.22");
        over.add_active_path("/base");
        over.add_active_path("/over");

        base.merge(&over);
        assert_eq!(base.sdks().get("go").unwrap(), "1.22");
        assert_eq!(base.envs().get("A").unwrap(), "1");
        assert_eq!(base.paths(), &strings(&["/base", "/over"])[..]);
    }

    #[test]
    fn setting_same_value_stays_clean() {
        let mut state = ActivityState::from_toml_str("[sdks]\ngo = \"1.22\"\n").unwrap();
        state.activate_sdk("go", "1.22");
        assert!(!state.has_update());
        state.activate_sdk("go", "1.23");
        assert!(state.has_update());
    }

    #[test]
    fn reset_keeps_file() {
        let mut state = ActivityState::new("/tmp/x.toml");
        state.set_env("A", "1");
        state.mark_clean();
        state.reset();
        assert!(state.is_empty());
        assert!(state.has_update());
        assert_eq!(state.file(), Path::new("/tmp/x.toml"));
    }

    #[test]
    fn parse_ignores_unknown_and_dedups() {
        let data = r#"
paths = ["/a", "/a", "/b"]
name = "demo"

[sdks]
go = "1.22"

[extra]
key = "value"
"#;
        let state = ActivityState::from_toml_str(data).unwrap();
        assert_eq!(state.paths(), &strings(&["/a", "/b"])[..]);
        assert_eq!(state.sdks().len(), 1);
        assert!(state.envs().is_empty());
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("global.toml");
        let state = ActivityState::load(&path).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.file(), path.as_path());
    }

    #[test]
    fn load_malformed_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".xenv.toml");
        std::fs::write(&path, "[sdks\ngo = ").unwrap();
        let err = ActivityState::load(&path).unwrap_err();
        assert!(err.to_string().contains(".xenv.toml"));
    }
}
