//! Directory change hook.
//!
//! The shell hook calls `xenv direnv` whenever the working directory
//! changes. The directory file applied last is remembered in
//! [`ENV_DIRENV_FILE`] so its effects can be undone when a different file (or
//! none) takes over.

use crate::activation::Activator;
use crate::env::Outcome;
use crate::error::Result;
use crate::hook::ENV_DIRENV_FILE;
use crate::manager::StateManager;
use crate::shell::{Effect, ShellContext};
use crate::state::ActivityState;
use std::path::Path;
use tracing::debug;

/// Envs and PATH entries a directory file contributes.
#[derive(Debug, Default)]
struct Contribution {
    envs: Vec<(String, String)>,
    paths: Vec<String>,
}

impl Contribution {
    fn of(state: &ActivityState, activator: &Activator<'_>) -> Self {
        let mut paths: Vec<String> = state.paths().to_vec();
        for (name, version) in state.sdks() {
            if let Some(resolved) = activator.describe_active(name, version) {
                if !paths.contains(&resolved.bin_path) {
                    paths.push(resolved.bin_path);
                }
            }
        }
        Contribution {
            envs: state
                .envs()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            paths,
        }
    }
}

/// Compute the script that moves the shell from `previous_file` to the
/// directory state the manager discovered.
pub fn sync(
    previous_file: Option<&Path>,
    manager: &StateManager,
    activator: &Activator<'_>,
    shell: &ShellContext,
) -> Result<Outcome> {
    let current = manager.direnv();
    let current_file = current.map(|s| s.file());
    if previous_file == current_file {
        return Ok(Outcome::default());
    }
    debug!(
        previous = ?previous_file,
        current = ?current_file,
        "directory state changed"
    );

    let old = match previous_file {
        Some(file) => Contribution::of(&ActivityState::load(file)?, activator),
        None => Contribution::default(),
    };
    let new = current
        .map(|s| Contribution::of(s, activator))
        .unwrap_or_default();

    let mut effects = Vec::new();
    for (name, _) in &old.envs {
        if !new.envs.iter().any(|(n, _)| n == name) {
            effects.push(Effect::UnsetEnv { name: name.clone() });
        }
    }
    for (name, value) in &new.envs {
        effects.push(Effect::SetEnv {
            name: name.clone(),
            value: value.clone(),
        });
    }

    let (path_effect, _) = shell.path_effect(&old.paths, &new.paths);
    effects.extend(path_effect);

    effects.push(match current_file {
        Some(file) => Effect::SetEnv {
            name: ENV_DIRENV_FILE.to_string(),
            value: file.to_string_lossy().into_owned(),
        },
        None => Effect::UnsetEnv {
            name: ENV_DIRENV_FILE.to_string(),
        },
    });

    Ok(Outcome {
        script: shell.render(&effects),
        not_found: Vec::new(),
    })
}
