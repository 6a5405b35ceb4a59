use crate::error::Result;
use crate::manager::StateManager;
use crate::paths::{self, validate_env_name};
use crate::shell::{set_env_effects, unset_env_effects, ShellContext};
use crate::types::Scope;
use std::collections::BTreeMap;
use std::path::Path;

/// What an env or path command produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Script for the calling shell; empty outside a hook.
    pub script: String,
    /// Requested entries that were not present.
    pub not_found: Vec<String>,
}

/// Env names are stored upper-cased.
pub fn normalize_env_name(name: &str) -> Result<String> {
    let upper = name.trim().to_ascii_uppercase();
    validate_env_name(&upper)?;
    Ok(upper)
}

pub fn set_env(
    manager: &mut StateManager,
    scope: Scope,
    name: &str,
    value: &str,
    shell: Option<&ShellContext>,
) -> Result<Outcome> {
    let name = normalize_env_name(name)?;
    let envs = BTreeMap::from([(name, value.to_string())]);
    manager.set_envs(scope, &envs)?;
    Ok(Outcome {
        script: shell.map(|s| s.render(&set_env_effects(&envs))).unwrap_or_default(),
        not_found: Vec::new(),
    })
}

pub fn unset_envs(
    manager: &mut StateManager,
    scope: Scope,
    names: &[String],
    shell: Option<&ShellContext>,
) -> Result<Outcome> {
    let names = names
        .iter()
        .map(|n| normalize_env_name(n))
        .collect::<Result<Vec<_>>>()?;
    let not_found = match manager.scope(scope) {
        Some(state) => names
            .iter()
            .filter(|n| !state.envs().contains_key(*n))
            .cloned()
            .collect(),
        None => names.clone(),
    };
    manager.unset_envs(scope, &names)?;
    Ok(Outcome {
        script: shell.map(|s| s.render(&unset_env_effects(&names))).unwrap_or_default(),
        not_found,
    })
}

/// Expand `~` and anchor relative entries at `cwd`.
pub fn normalize_path(entry: &str, cwd: &Path) -> String {
    let expanded = paths::expand_home(entry.trim());
    let path = Path::new(&expanded);
    if path.is_absolute() {
        expanded
    } else {
        cwd.join(path).to_string_lossy().into_owned()
    }
}

pub fn add_paths(
    manager: &mut StateManager,
    scope: Scope,
    entries: &[String],
    shell: Option<&ShellContext>,
) -> Result<Outcome> {
    let entries: Vec<String> = entries
        .iter()
        .filter(|e| !e.trim().is_empty())
        .map(|e| normalize_path(e, manager.cwd()))
        .collect();
    manager.add_paths(scope, &entries)?;

    let script = match shell {
        Some(shell) => match shell.path_effect(&[], &entries) {
            (Some(effect), _) => shell.render(&[effect]),
            (None, _) => String::new(),
        },
        None => String::new(),
    };
    Ok(Outcome {
        script,
        not_found: Vec::new(),
    })
}

/// Remove entries from `scope` and, inside a hook, from the live PATH.
/// `not_found` is measured against the live PATH when there is one, and
/// against the scope's recorded paths otherwise.
pub fn remove_paths(
    manager: &mut StateManager,
    scope: Scope,
    entries: &[String],
    shell: Option<&ShellContext>,
) -> Result<Outcome> {
    let entries: Vec<String> = entries
        .iter()
        .filter(|e| !e.trim().is_empty())
        .map(|e| normalize_path(e, manager.cwd()))
        .collect();

    let recorded_missing: Vec<String> = entries
        .iter()
        .filter(|e| !manager.scope(scope).is_some_and(|s| s.exists_path(e)))
        .cloned()
        .collect();
    manager.remove_paths(scope, &entries)?;

    Ok(match shell {
        Some(shell) => {
            let (effect, not_found) = shell.path_effect(&entries, &[]);
            Outcome {
                script: effect.map(|e| shell.render(&[e])).unwrap_or_default(),
                not_found,
            }
        }
        None => Outcome {
            script: String::new(),
            not_found: recorded_missing,
        },
    })
}

/// Empty `scope`. Inside a hook the live shell also drops the layer's
/// variables and PATH entries.
pub fn reset_scope(
    manager: &mut StateManager,
    scope: Scope,
    shell: Option<&ShellContext>,
) -> Result<Outcome> {
    let (names, entries) = match manager.scope(scope) {
        Some(state) => (
            state.envs().keys().cloned().collect::<Vec<_>>(),
            state.paths().to_vec(),
        ),
        None => (Vec::new(), Vec::new()),
    };
    manager.reset_scope(scope)?;

    let script = match shell {
        Some(shell) => {
            let mut effects = unset_env_effects(&names);
            effects.extend(shell.path_effect(&entries, &[]).0);
            shell.render(&effects)
        }
        None => String::new(),
    };
    Ok(Outcome {
        script,
        not_found: Vec::new(),
    })
}
