use crate::error::{Result, XenvError};
use crate::paths::{self, DEFAULT_BIN_DIR, DEFAULT_HOOKS_DIR, DEFAULT_INSTALL_DIR};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ToolChain
// ---------------------------------------------------------------------------

/// How one SDK is laid out on disk and what activating it exports.
///
/// `install_dir` and `active_env` values are templates: `{name}`,
/// `{version}` and (for `active_env`) `{install_dir}` are substituted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolChain {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub active_env: BTreeMap<String, String>,
    /// Executable sub-directory of an install, `bin` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<String>,
}

impl ToolChain {
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.alias.as_deref() == Some(name)
    }

    /// Render `active_env` for an installed version.
    pub fn render_env(&self, version: &str, install_dir: &str) -> BTreeMap<String, String> {
        self.active_env
            .iter()
            .map(|(k, v)| {
                let value = v
                    .replace("{name}", &self.name)
                    .replace("{version}", version)
                    .replace("{install_dir}", install_dir);
                (k.clone(), value)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// User configuration, read from `~/.config/xenv/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shims directory placed first on PATH by the shell hook.
    pub bin_dir: String,
    /// Root under which SDK versions are installed.
    pub install_dir: String,
    pub shell_hooks_dir: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub shell_aliases: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub global_env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global_paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sdks: Vec<ToolChain>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bin_dir: DEFAULT_BIN_DIR.to_string(),
            install_dir: DEFAULT_INSTALL_DIR.to_string(),
            shell_hooks_dir: DEFAULT_HOOKS_DIR.to_string(),
            shell_aliases: BTreeMap::new(),
            global_env: BTreeMap::new(),
            global_paths: Vec::new(),
            sdks: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Read one of the directory settings by key.
    pub fn get(&self, key: &str) -> Result<&str> {
        match key {
            "bin_dir" => Ok(self.bin_dir.as_str()),
            "install_dir" => Ok(self.install_dir.as_str()),
            "shell_hooks_dir" => Ok(self.shell_hooks_dir.as_str()),
            _ => Err(XenvError::UnknownConfigKey(key.to_string())),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = match key {
            "bin_dir" => &mut self.bin_dir,
            "install_dir" => &mut self.install_dir,
            "shell_hooks_dir" => &mut self.shell_hooks_dir,
            _ => return Err(XenvError::UnknownConfigKey(key.to_string())),
        };
        *slot = value.to_string();
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an exported config. Missing fields take their defaults.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn find_sdk(&self, name: &str) -> Option<&ToolChain> {
        self.sdks.iter().find(|c| c.matches(name))
    }

    /// Install directory template for `chain`, before `{version}` is known.
    pub fn install_template(&self, chain: &ToolChain) -> String {
        match &chain.install_dir {
            Some(dir) => dir.clone(),
            None => format!("{}/{{name}}/{{version}}", self.install_dir.trim_end_matches('/')),
        }
    }

    /// Concrete, home-expanded install directory of `chain` at `version`.
    pub fn install_dir_for(&self, chain: &ToolChain, version: &str) -> String {
        let dir = self
            .install_template(chain)
            .replace("{name}", &chain.name)
            .replace("{version}", version);
        paths::expand_home(&dir)
    }

    pub fn expanded_bin_dir(&self) -> String {
        paths::expand_home(&self.bin_dir)
    }

    pub fn expanded_install_dir(&self) -> String {
        paths::expand_home(&self.install_dir)
    }

    pub fn expanded_hooks_dir(&self) -> String {
        paths::expand_home(&self.shell_hooks_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let mut seen = HashSet::new();
        for chain in &self.sdks {
            if chain.name.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "sdk entry with an empty name".to_string(),
                });
                continue;
            }
            if !seen.insert(chain.name.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("sdk '{}' is defined more than once", chain.name),
                });
            }
            if let Some(alias) = &chain.alias {
                if self.sdks.iter().any(|c| c.name == *alias) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "alias '{}' of sdk '{}' shadows another sdk name",
                            alias, chain.name
                        ),
                    });
                }
            }
            if !self.install_template(chain).contains("{version}") {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "install_dir of sdk '{}' has no {{version}} placeholder; \
                         versions will share a directory",
                        chain.name
                    ),
                });
            }
            for key in chain.active_env.keys() {
                if paths::validate_env_name(key).is_err() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "invalid env name '{}' in active_env of sdk '{}'",
                            key, chain.name
                        ),
                    });
                }
            }
        }

        for key in self.global_env.keys() {
            if paths::validate_env_name(key).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid env name '{}' in global_env", key),
                });
            }
        }

        if self.install_dir.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "install_dir is empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
