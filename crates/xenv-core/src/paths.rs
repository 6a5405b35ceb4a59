use crate::error::{Result, XenvError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File constants
// ---------------------------------------------------------------------------

/// Directory-scoped state file, discovered by walking up from the cwd.
pub const LOCAL_STATE_FILE: &str = ".xenv.toml";

pub const GLOBAL_STATE_FILE: &str = ".config/xenv/global.toml";
pub const CONFIG_FILE: &str = ".config/xenv/config.yaml";
pub const SESSION_DIR: &str = ".xenv/session";
pub const TOOLS_LOCAL_FILE: &str = ".xenv/tools.local.json";

pub const DEFAULT_INSTALL_DIR: &str = "~/.xenv/tools";
pub const DEFAULT_BIN_DIR: &str = "~/.xenv/shims";
pub const DEFAULT_HOOKS_DIR: &str = "~/.config/xenv/hooks";

// ---------------------------------------------------------------------------
// StatePaths
// ---------------------------------------------------------------------------

/// Locations of every user-level file xenv reads or writes.
///
/// Built once per invocation and handed to the components that need it, so
/// tests can point everything at a temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub global_file: PathBuf,
    pub session_dir: PathBuf,
    pub tools_local_file: PathBuf,
    pub config_file: PathBuf,
}

impl StatePaths {
    pub fn for_home(home: &Path) -> Self {
        StatePaths {
            global_file: home.join(GLOBAL_STATE_FILE),
            session_dir: home.join(SESSION_DIR),
            tools_local_file: home.join(TOOLS_LOCAL_FILE),
            config_file: home.join(CONFIG_FILE),
        }
    }

    pub fn from_home_env() -> Result<Self> {
        let home = home::home_dir().ok_or(XenvError::HomeNotFound)?;
        Ok(Self::for_home(&home))
    }

    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.session_dir.join(format!("{session_id}.toml"))
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the user's home directory. Other paths are
/// returned unchanged, as is `~` when no home directory can be resolved.
pub fn expand_home(path: &str) -> String {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        rest
    } else {
        return path.to_string();
    };
    match home::home_dir() {
        Some(home) if rest.is_empty() => home.to_string_lossy().into_owned(),
        Some(home) => home.join(rest).to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}

/// Walk upward from `start` and return the first `name` file found.
pub fn find_in_parent_dirs(start: &Path, name: &str) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

static ENV_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn env_name_re() -> &'static Regex {
    ENV_NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

pub fn validate_env_name(name: &str) -> Result<()> {
    if env_name_re().is_match(name) {
        Ok(())
    } else {
        Err(XenvError::InvalidEnvName(name.to_string()))
    }
}

static SESSION_ID_RE: OnceLock<Regex> = OnceLock::new();

/// Session ids become file names under the session directory, so they may
/// not contain separators or `..`.
pub fn validate_session_id(id: &str) -> Result<()> {
    let re = SESSION_ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());
    if re.is_match(id) && !id.contains("..") {
        Ok(())
    } else {
        Err(XenvError::InvalidSessionId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn state_paths_layout() {
        let paths = StatePaths::for_home(Path::new("/home/dev"));
        assert_eq!(
            paths.global_file,
            PathBuf::from("/home/dev/.config/xenv/global.toml")
        );
        assert_eq!(
            paths.session_file("20240101_120000"),
            PathBuf::from("/home/dev/.xenv/session/20240101_120000.toml")
        );
        assert_eq!(
            paths.tools_local_file,
            PathBuf::from("/home/dev/.xenv/tools.local.json")
        );
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/usr/local/bin"), "/usr/local/bin");
        assert_eq!(expand_home("relative/~dir"), "relative/~dir");
    }

    #[test]
    fn expand_home_replaces_tilde() {
        let expanded = expand_home("~/bin");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("bin"));
    }

    #[test]
    fn find_in_parent_dirs_walks_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOCAL_STATE_FILE), "").unwrap();
        let deep = dir.path().join("a/b/c");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_in_parent_dirs(&deep, LOCAL_STATE_FILE).unwrap();
        assert_eq!(found, dir.path().join(LOCAL_STATE_FILE));
    }

    #[test]
    fn find_in_parent_dirs_prefers_nearest() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("project");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(dir.path().join(LOCAL_STATE_FILE), "").unwrap();
        std::fs::write(inner.join(LOCAL_STATE_FILE), "").unwrap();

        let found = find_in_parent_dirs(&inner, LOCAL_STATE_FILE).unwrap();
        assert_eq!(found, inner.join(LOCAL_STATE_FILE));
    }

    #[test]
    fn env_name_validation() {
        assert!(validate_env_name("JAVA_HOME").is_ok());
        assert!(validate_env_name("_private1").is_ok());
        assert!(validate_env_name("1BAD").is_err());
        assert!(validate_env_name("BAD-NAME").is_err());
        assert!(validate_env_name("").is_err());
    }

    #[test]
    fn session_id_validation() {
        assert!(validate_session_id("20240101_120000").is_ok());
        assert!(validate_session_id("s-42.b").is_ok());
        assert!(validate_session_id("../../.config/xenv/global").is_err());
        assert!(validate_session_id("a/b").is_err());
        assert!(validate_session_id("a\\b").is_err());
        assert!(validate_session_id("..").is_err());
        assert!(validate_session_id("").is_err());
    }
}
