use crate::config::{Config, ToolChain};
use crate::error::Result;
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const REGISTRY_VERSION: &str = "v1";

// ---------------------------------------------------------------------------
// InstalledTool
// ---------------------------------------------------------------------------

/// One locally installed SDK or tool version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledTool {
    /// `name:version`
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub version: String,
    pub install_dir: String,
    /// Executable directory; relative values are joined onto `install_dir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Follows the list the entry is stored in; rewritten on load.
    #[serde(default)]
    pub is_sdk: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl InstalledTool {
    pub fn new(name: &str, version: &str, install_dir: &str) -> Self {
        let now = Utc::now();
        InstalledTool {
            id: tool_id(name, version),
            name: name.to_string(),
            version: version.to_string(),
            install_dir: install_dir.to_string(),
            bin_dir: None,
            source: None,
            is_sdk: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Absolute directory that goes on PATH when this version is active.
    pub fn bin_path(&self) -> String {
        let bin = self.bin_dir.as_deref().unwrap_or("bin");
        let path = Path::new(bin);
        if path.is_absolute() {
            return bin.to_string();
        }
        Path::new(&self.install_dir)
            .join(path)
            .to_string_lossy()
            .into_owned()
    }
}

pub fn tool_id(name: &str, version: &str) -> String {
    format!("{name}:{version}")
}

fn default_registry_version() -> String {
    REGISTRY_VERSION.to_string()
}

// ---------------------------------------------------------------------------
// ToolsLocal
// ---------------------------------------------------------------------------

/// Registry of installed versions, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsLocal {
    #[serde(default = "default_registry_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sdks: Vec<InstalledTool>,
    #[serde(default)]
    pub tools: Vec<InstalledTool>,
    #[serde(skip)]
    file: PathBuf,
}

impl ToolsLocal {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        ToolsLocal {
            version: REGISTRY_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            sdks: Vec::new(),
            tools: Vec::new(),
            file: file.into(),
        }
    }

    /// Load the registry; a missing file yields an empty one. Hand-written
    /// entries may omit `id`, `is_sdk` and the timestamps.
    pub fn load(file: &Path) -> Result<Self> {
        let mut registry = match io::read_optional(file)? {
            Some(data) => serde_json::from_str::<ToolsLocal>(&data)?,
            None => ToolsLocal::new(file),
        };
        registry.file = file.to_path_buf();
        for (list, is_sdk) in [(&mut registry.sdks, true), (&mut registry.tools, false)] {
            for tool in list.iter_mut() {
                tool.is_sdk = is_sdk;
                if tool.id.is_empty() {
                    tool.id = tool_id(&tool.name, &tool.version);
                }
            }
        }
        debug!(file = %file.display(), sdks = registry.sdks.len(), "loaded tool registry");
        Ok(registry)
    }

    pub fn save(&mut self) -> Result<()> {
        self.updated_at = Utc::now();
        let data = serde_json::to_string_pretty(self)?;
        io::atomic_write(&self.file, data.as_bytes())
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn find_sdk(&self, name: &str, version: &str) -> Option<&InstalledTool> {
        let id = tool_id(name, version);
        self.sdks.iter().find(|t| t.id == id)
    }

    pub fn find_tool(&self, name: &str, version: &str) -> Option<&InstalledTool> {
        let id = tool_id(name, version);
        self.tools.iter().find(|t| t.id == id)
    }

    /// Either kind of entry at an exact version.
    pub fn find_installed(&self, name: &str, version: &str) -> Option<&InstalledTool> {
        self.find_sdk(name, version)
            .or_else(|| self.find_tool(name, version))
    }

    /// Installed versions of `name`, newest first.
    pub fn list_sdk_versions(&self, name: &str) -> Vec<&InstalledTool> {
        let mut found: Vec<&InstalledTool> = self.sdks.iter().filter(|t| t.name == name).collect();
        found.sort_by(|a, b| compare_versions(&b.version, &a.version));
        found
    }

    /// Resolve a requested version against what is installed. An exact id
    /// wins; otherwise `1.22` selects the newest `1.22.x`.
    pub fn match_sdk(&self, name: &str, version: &str) -> Option<&InstalledTool> {
        if let Some(exact) = self.find_sdk(name, version) {
            return Some(exact);
        }
        let prefix = format!("{version}.");
        self.list_sdk_versions(name)
            .into_iter()
            .find(|t| t.version.starts_with(&prefix))
    }

    /// [`match_sdk`](Self::match_sdk), falling back to plain tools, which
    /// only match exactly.
    pub fn match_installed(&self, name: &str, version: &str) -> Option<&InstalledTool> {
        self.match_sdk(name, version)
            .or_else(|| self.find_tool(name, version))
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert or replace an entry, keeping the original `created_at`.
    pub fn add(&mut self, mut tool: InstalledTool) {
        let list = if tool.is_sdk {
            &mut self.sdks
        } else {
            &mut self.tools
        };
        match list.iter_mut().find(|t| t.id == tool.id) {
            Some(existing) => {
                tool.created_at = existing.created_at;
                tool.updated_at = Utc::now();
                *existing = tool;
            }
            None => list.push(tool),
        }
    }

    pub fn remove_sdk(&mut self, name: &str, version: &str) -> Option<InstalledTool> {
        let id = tool_id(name, version);
        let idx = self.sdks.iter().position(|t| t.id == id)?;
        Some(self.sdks.remove(idx))
    }

    pub fn remove_tool(&mut self, name: &str, version: &str) -> Option<InstalledTool> {
        let id = tool_id(name, version);
        let idx = self.tools.iter().position(|t| t.id == id)?;
        Some(self.tools.remove(idx))
    }

    /// Scan the install base directory of `chain` and register every version
    /// directory not yet known. Returns the newly registered entries.
    pub fn index_sdk(&mut self, config: &Config, chain: &ToolChain) -> Result<Vec<InstalledTool>> {
        let template = config.install_template(chain);
        let Some((base, _)) = template.split_once("{version}") else {
            warn!(sdk = %chain.name, "install_dir has no {{version}} placeholder, skipping index");
            return Ok(Vec::new());
        };
        let base = crate::paths::expand_home(&base.replace("{name}", &chain.name));
        let base = Path::new(&base);
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut added = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(base)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        entries.sort();
        for version in entries {
            if self.find_sdk(&chain.name, &version).is_some() {
                continue;
            }
            let install_dir = config.install_dir_for(chain, &version);
            let mut tool = InstalledTool::new(&chain.name, &version, &install_dir);
            tool.bin_dir = chain.bin_dir.clone();
            tool.source = Some("index".to_string());
            debug!(id = %tool.id, "indexed local version");
            self.add(tool.clone());
            added.push(tool);
        }
        Ok(added)
    }
}

/// Order version strings numerically where possible: `1.10` > `1.9`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parts = |s: &str| -> Vec<String> {
        s.trim_start_matches('v')
            .split(['.', '-', '+'])
            .map(str::to_string)
            .collect()
    };
    let (pa, pb) = (parts(a), parts(b));
    for (x, y) in pa.iter().zip(pb.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(nx), Ok(ny)) => nx.cmp(&ny),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    pa.len().cmp(&pb.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_with(versions: &[&str]) -> ToolsLocal {
        let mut r = ToolsLocal::new("/tmp/unused.json");
        for v in versions {
            r.add(InstalledTool::new("go", v, &format!("/opt/go/{v}")));
        }
        r
    }

    #[test]
    fn versions_sorted_newest_first() {
        let r = registry_with(&["1.9.2", "1.22.1", "1.10.0"]);
        let versions: Vec<&str> = r
            .list_sdk_versions("go")
            .iter()
            .map(|t| t.version.as_str())
            .collect();
        assert_eq!(versions, vec!["1.22.1", "1.10.0", "1.9.2"]);
    }

    #[test]
    fn match_exact_then_prefix() {
        let r = registry_with(&["1.22.0", "1.22.3", "1.2.9"]);
        assert_eq!(r.match_sdk("go", "1.22.0").unwrap().version, "1.22.0");
        assert_eq!(r.match_sdk("go", "1.22").unwrap().version, "1.22.3");
        assert_eq!(r.match_sdk("go", "1.2").unwrap().version, "1.2.9");
        assert!(r.match_sdk("go", "1.23").is_none());
        assert!(r.match_sdk("node", "1.22").is_none());
    }

    #[test]
    fn bin_path_defaults_to_bin() {
        let mut tool = InstalledTool::new("go", "1.22", "/opt/go/1.22");
        assert_eq!(tool.bin_path(), "/opt/go/1.22/bin");
        tool.bin_dir = Some("tools/bin".into());
        assert_eq!(tool.bin_path(), "/opt/go/1.22/tools/bin");
        tool.bin_dir = Some("/usr/local/go/bin".into());
        assert_eq!(tool.bin_path(), "/usr/local/go/bin");
    }

    #[test]
    fn add_replaces_same_id() {
        let mut r = registry_with(&["1.22"]);
        let created = r.sdks[0].created_at;
        r.add(InstalledTool::new("go", "1.22", "/elsewhere"));
        assert_eq!(r.sdks.len(), 1);
        assert_eq!(r.sdks[0].install_dir, "/elsewhere");
        assert_eq!(r.sdks[0].created_at, created);
    }

    #[test]
    fn remove_sdk() {
        let mut r = registry_with(&["1.21", "1.22"]);
        assert!(r.remove_sdk("go", "1.21").is_some());
        assert!(r.remove_sdk("go", "1.21").is_none());
        assert_eq!(r.sdks.len(), 1);
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join(".xenv/tools.local.json");
        let mut r = ToolsLocal::load(&file).unwrap();
        assert!(r.sdks.is_empty());
        r.add(InstalledTool::new("node", "20.11.0", "/opt/node/20.11.0"));
        r.save().unwrap();

        let content = std::fs::read_to_string(&file).unwrap();
        assert!(content.contains("\"id\": \"node:20.11.0\""));
        let loaded = ToolsLocal::load(&file).unwrap();
        assert_eq!(loaded.version, REGISTRY_VERSION);
        assert_eq!(loaded.sdks, r.sdks);
    }

    #[test]
    fn load_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tools.local.json");
        std::fs::write(
            &file,
            r#"{"sdks":[{"id":"go:1.22","name":"go","version":"1.22","install_dir":"/opt/go"}],
                "tools":[{"name":"jq","version":"1.7","install_dir":"/opt/jq"}]}"#,
        )
        .unwrap();

        let r = ToolsLocal::load(&file).unwrap();
        assert_eq!(r.version, REGISTRY_VERSION);
        let go = r.match_sdk("go", "1.22").unwrap();
        assert!(go.is_sdk);
        assert_eq!(go.bin_path(), "/opt/go/bin");
        let jq = r.find_tool("jq", "1.7").unwrap();
        assert_eq!(jq.id, "jq:1.7");
        assert!(!jq.is_sdk);
    }

    #[test]
    fn plain_tools_match_exactly() {
        let mut r = registry_with(&["1.22.1"]);
        let mut jq = InstalledTool::new("jq", "1.7.1", "/opt/jq/1.7.1");
        jq.is_sdk = false;
        r.add(jq);
        assert!(r.match_sdk("jq", "1.7.1").is_none());
        assert!(!r.match_installed("jq", "1.7.1").unwrap().is_sdk);
        assert!(r.match_installed("jq", "1.7").is_none());
        assert_eq!(r.match_installed("go", "1.22").unwrap().version, "1.22.1");
        assert!(r.remove_tool("jq", "1.7.1").is_some());
        assert!(r.tools.is_empty());
    }

    #[test]
    fn index_discovers_version_dirs() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("java");
        std::fs::create_dir_all(base.join("17")).unwrap();
        std::fs::create_dir_all(base.join("21")).unwrap();
        std::fs::write(base.join("README"), "not a version").unwrap();

        let config = Config::default();
        let chain = ToolChain {
            name: "java".into(),
            install_dir: Some(format!("{}/{{version}}", base.display())),
            ..Default::default()
        };
        let mut r = ToolsLocal::new(dir.path().join("tools.local.json"));
        let added = r.index_sdk(&config, &chain).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(
            r.find_sdk("java", "21").unwrap().install_dir,
            base.join("21").to_string_lossy()
        );

        let again = r.index_sdk(&config, &chain).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn compare_versions_cases() {
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("v2.0.0", "2.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("21", "17"), Ordering::Greater);
    }
}
