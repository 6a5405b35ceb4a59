use crate::config::Config;
use crate::error::{Result, XenvError};
use crate::manager::StateManager;
use crate::registry::{InstalledTool, ToolsLocal};
use crate::shell::{set_env_effects, unset_env_effects, ShellContext};
use crate::types::Scope;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

// ---------------------------------------------------------------------------
// VersionSpec
// ---------------------------------------------------------------------------

/// A `name:version` activation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSpec {
    pub name: String,
    pub version: String,
}

impl VersionSpec {
    pub fn parse(s: &str) -> Result<Self> {
        let Some((name, version)) = s.trim().split_once(':') else {
            return Err(XenvError::InvalidSpec(s.to_string()));
        };
        let (name, version) = (name.trim(), version.trim());
        if name.is_empty() || version.is_empty() {
            return Err(XenvError::InvalidSpec(s.to_string()));
        }
        Ok(VersionSpec {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl std::str::FromStr for VersionSpec {
    type Err = XenvError;

    fn from_str(s: &str) -> Result<Self> {
        VersionSpec::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TargetFailure {
    pub target: String,
    pub error: XenvError,
}

/// Result of activating or deactivating several targets in one batch.
#[derive(Debug, Default)]
pub struct ActivationReport {
    pub changed: Vec<InstalledTool>,
    pub failed: Vec<TargetFailure>,
    /// Script for the calling shell; empty outside a hook.
    pub script: String,
}

impl ActivationReport {
    pub fn all_failed(&self) -> bool {
        self.changed.is_empty() && !self.failed.is_empty()
    }
}

/// An installed version plus what activating it exports.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub tool: InstalledTool,
    pub envs: BTreeMap<String, String>,
    pub bin_path: String,
}

// ---------------------------------------------------------------------------
// Activator
// ---------------------------------------------------------------------------

pub struct Activator<'a> {
    config: &'a Config,
    registry: &'a ToolsLocal,
}

impl<'a> Activator<'a> {
    pub fn new(config: &'a Config, registry: &'a ToolsLocal) -> Self {
        Activator { config, registry }
    }

    /// Canonical SDK name, following config aliases.
    pub fn canonical_name<'n>(&'n self, name: &'n str) -> &'n str {
        self.config
            .find_sdk(name)
            .map(|c| c.name.as_str())
            .unwrap_or(name)
    }

    /// Look `spec` up among installed SDKs, then plain tools.
    pub fn resolve(&self, spec: &VersionSpec) -> Result<Resolved> {
        let name = self.canonical_name(&spec.name);
        let tool = self
            .registry
            .match_installed(name, &spec.version)
            .ok_or_else(|| XenvError::NotInstalled(spec.to_string()))?;
        Ok(self.describe(tool))
    }

    fn describe(&self, tool: &InstalledTool) -> Resolved {
        let envs = self
            .config
            .find_sdk(&tool.name)
            .map(|c| c.render_env(&tool.version, &tool.install_dir))
            .unwrap_or_default();
        Resolved {
            bin_path: tool.bin_path(),
            envs,
            tool: tool.clone(),
        }
    }

    /// Describe an active `name@version`, falling back to the configured
    /// layout when the version is no longer in the registry.
    pub fn describe_active(&self, name: &str, version: &str) -> Option<Resolved> {
        if let Some(tool) = self.registry.find_installed(name, version) {
            return Some(self.describe(tool));
        }
        let chain = self.config.find_sdk(name)?;
        let install_dir = self.config.install_dir_for(chain, version);
        let mut tool = InstalledTool::new(&chain.name, version, &install_dir);
        tool.bin_dir = chain.bin_dir.clone();
        Some(self.describe(&tool))
    }

    /// Activate every target in `scope`. Targets that fail to parse or are
    /// not installed are reported and leave state untouched; the rest are
    /// committed together.
    pub fn activate(
        &self,
        manager: &mut StateManager,
        scope: Scope,
        targets: &[String],
        shell: Option<&ShellContext>,
    ) -> Result<ActivationReport> {
        let mut report = ActivationReport::default();
        let mut envs = BTreeMap::new();
        let mut rem_paths = Vec::new();
        let mut add_paths = Vec::new();

        let mut batch = manager.begin_batch()?;
        for target in targets {
            let resolved = match VersionSpec::parse(target).and_then(|spec| self.resolve(&spec)) {
                Ok(r) => r,
                Err(error) => {
                    report.failed.push(TargetFailure {
                        target: target.clone(),
                        error,
                    });
                    continue;
                }
            };
            let name = resolved.tool.name.clone();
            let is_sdk = resolved.tool.is_sdk;

            // Replacing another active version drops its bin dir first.
            let previous = batch
                .scope(scope)
                .and_then(|s| s.versions(is_sdk).get(&name))
                .filter(|v| **v != resolved.tool.version)
                .cloned();
            if let Some(old) = previous.and_then(|v| self.describe_active(&name, &v)) {
                batch.remove_paths(scope, std::slice::from_ref(&old.bin_path))?;
                rem_paths.push(old.bin_path);
            }

            let versions = BTreeMap::from([(name, resolved.tool.version.clone())]);
            let bin_paths = std::slice::from_ref(&resolved.bin_path);
            if is_sdk {
                batch.activate_sdks(scope, &versions, &resolved.envs, bin_paths)?;
            } else {
                batch.add_tools(scope, &versions)?;
                batch.set_envs(scope, &resolved.envs)?;
                batch.add_paths(scope, bin_paths)?;
            }
            debug!(id = %resolved.tool.id, %scope, is_sdk, "activated");

            envs.extend(resolved.envs);
            add_paths.push(resolved.bin_path);
            report.changed.push(resolved.tool);
        }
        batch.commit()?;

        if let Some(shell) = shell {
            let mut effects = set_env_effects(&envs);
            if let (Some(path), _) = shell.path_effect(&rem_paths, &add_paths) {
                effects.push(path);
            }
            report.script = shell.render(&effects);
        }
        Ok(report)
    }

    /// Deactivate every target in `scope`. A target must be active at exactly
    /// the requested version.
    pub fn deactivate(
        &self,
        manager: &mut StateManager,
        scope: Scope,
        targets: &[String],
        shell: Option<&ShellContext>,
    ) -> Result<ActivationReport> {
        let mut report = ActivationReport::default();
        let mut env_names: Vec<String> = Vec::new();
        let mut rem_paths = Vec::new();

        let mut batch = manager.begin_batch()?;
        for target in targets {
            let spec = match VersionSpec::parse(target) {
                Ok(spec) => spec,
                Err(error) => {
                    report.failed.push(TargetFailure {
                        target: target.clone(),
                        error,
                    });
                    continue;
                }
            };
            let name = self.canonical_name(&spec.name).to_string();
            let active_as = |is_sdk: bool| {
                batch
                    .scope(scope)
                    .and_then(|s| s.versions(is_sdk).get(&name))
                    .is_some_and(|v| *v == spec.version)
            };
            let is_sdk = active_as(true);
            if !is_sdk && !active_as(false) {
                report.failed.push(TargetFailure {
                    target: target.clone(),
                    error: XenvError::NotActive(spec.to_string()),
                });
                continue;
            }

            let (names, paths, tool) = match self.describe_active(&name, &spec.version) {
                Some(r) => (r.envs.into_keys().collect::<Vec<_>>(), vec![r.bin_path], r.tool),
                None => (
                    Vec::new(),
                    Vec::new(),
                    InstalledTool::new(&name, &spec.version, ""),
                ),
            };
            let names_ref = std::slice::from_ref(&name);
            if is_sdk {
                batch.deactivate_sdks(scope, names_ref, &names, &paths)?;
            } else {
                batch.remove_tools(scope, names_ref)?;
                batch.unset_envs(scope, &names)?;
                batch.remove_paths(scope, &paths)?;
            }
            debug!(id = %tool.id, %scope, "deactivated");

            env_names.extend(names);
            rem_paths.extend(paths);
            report.changed.push(tool);
        }
        batch.commit()?;

        if let Some(shell) = shell {
            let mut effects = unset_env_effects(&env_names);
            if let (Some(path), _) = shell.path_effect(&rem_paths, &[]) {
                effects.push(path);
            }
            report.script = shell.render(&effects);
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
