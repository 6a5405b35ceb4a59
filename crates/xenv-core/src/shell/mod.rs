//! Activation script generation.
//!
//! Commands describe what should change in the calling shell as a list of
//! [`Effect`]s; a [`ScriptGenerator`] renders them in one dialect. The hook
//! function installed by `xenv shell` splits command output at
//! [`SCRIPT_MARK`]: everything before it is shown to the user, everything
//! after it is evaluated.

mod clink;
mod posix;
mod pwsh;

pub use clink::ClinkFormatter;
pub use posix::PosixFormatter;
pub use pwsh::PwshFormatter;

use crate::types::ShellKind;
use std::collections::BTreeMap;
use std::str::FromStr;

pub const SCRIPT_MARK: &str = "--Expression--";

/// Subcommands the wrapper function routes through the eval helper.
pub const EVAL_COMMANDS: &[&str] = &["use", "unuse", "env", "path", "reset", "direnv"];

/// Words offered by shell completion.
pub const COMPLETION_WORDS: &[&str] = &[
    "use", "unuse", "env", "path", "list", "reset", "init", "shell", "tools", "config", "set",
    "unset",
];

/// Prefix `script` with the eval marker. Empty scripts produce no output.
pub fn wrap_eval(script: &str) -> String {
    if script.trim().is_empty() {
        return String::new();
    }
    format!("{SCRIPT_MARK}\n{script}\n")
}

// ---------------------------------------------------------------------------
// Effect
// ---------------------------------------------------------------------------

/// One change to apply to the calling shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetEnv { name: String, value: String },
    UnsetEnv { name: String },
    /// Prepend entries to PATH, first entry ends up first.
    AddPaths(Vec<String>),
    /// Replace PATH entirely.
    SetPath(Vec<String>),
}

// ---------------------------------------------------------------------------
// ShellFormatter
// ---------------------------------------------------------------------------

/// Dialect-specific rendering of each effect and of the hook script.
pub trait ShellFormatter {
    fn kind(&self) -> ShellKind;

    /// Quote `value` as a string literal in this dialect.
    fn quote(&self, value: &str) -> String;

    fn render_set_env(&self, name: &str, value: &str) -> String;

    fn render_unset_env(&self, name: &str) -> String;

    fn render_add_path(&self, paths: &[String]) -> String;

    fn render_set_path(&self, paths: &[String]) -> String;

    fn path_separator(&self) -> &'static str;

    fn hook_script(&self, params: &HookParams) -> String;
}

/// Inputs for the shell startup script.
#[derive(Debug, Clone, Default)]
pub struct HookParams {
    /// Executable the wrapper function invokes.
    pub program: String,
    pub session_id: String,
    /// Shims directory placed first on PATH.
    pub bin_dir: String,
    /// Directory of user scripts sourced at the end of the hook.
    pub hooks_dir: String,
    pub global_env: BTreeMap<String, String>,
    pub global_paths: Vec<String>,
    pub aliases: BTreeMap<String, String>,
}

/// Render the global env/PATH block shared by every hook template.
fn render_globals(f: &dyn ShellFormatter, params: &HookParams) -> String {
    let mut lines: Vec<String> = params
        .global_env
        .iter()
        .map(|(k, v)| f.render_set_env(k, v))
        .collect();
    let mut paths: Vec<String> = Vec::new();
    for p in std::iter::once(&params.bin_dir).chain(params.global_paths.iter()) {
        if !p.is_empty() && !paths.contains(p) {
            paths.push(p.clone());
        }
    }
    if !paths.is_empty() {
        lines.push(f.render_add_path(&paths));
    }
    lines.join("\n")
}

/// Fill `{{NAME}}` placeholders in a template.
fn fill(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

// ---------------------------------------------------------------------------
// ScriptGenerator
// ---------------------------------------------------------------------------

pub struct ScriptGenerator {
    formatter: Box<dyn ShellFormatter>,
}

impl std::fmt::Debug for ScriptGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptGenerator")
            .field("kind", &self.kind())
            .finish()
    }
}

impl ScriptGenerator {
    pub fn new(kind: ShellKind) -> Self {
        let formatter: Box<dyn ShellFormatter> = match kind {
            ShellKind::Bash | ShellKind::Zsh => Box::new(PosixFormatter::new(kind)),
            ShellKind::Pwsh => Box::new(PwshFormatter),
            ShellKind::Cmd => Box::new(ClinkFormatter),
        };
        ScriptGenerator { formatter }
    }

    /// Build a generator from a shell name, rejecting unknown dialects.
    pub fn for_shell(name: &str) -> crate::Result<Self> {
        Ok(Self::new(ShellKind::from_str(name)?))
    }

    pub fn kind(&self) -> ShellKind {
        self.formatter.kind()
    }

    pub fn formatter(&self) -> &dyn ShellFormatter {
        self.formatter.as_ref()
    }

    pub fn render(&self, effects: &[Effect]) -> String {
        let f = self.formatter.as_ref();
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::SetEnv { name, value } => Some(f.render_set_env(name, value)),
                Effect::UnsetEnv { name } => Some(f.render_unset_env(name)),
                Effect::AddPaths(paths) if paths.is_empty() => None,
                Effect::AddPaths(paths) => Some(f.render_add_path(paths)),
                Effect::SetPath(paths) => Some(f.render_set_path(paths)),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn gen_set_env(&self, name: &str, value: &str) -> String {
        self.formatter.render_set_env(name, value)
    }

    pub fn gen_set_envs(&self, envs: &BTreeMap<String, String>) -> String {
        self.render(&set_env_effects(envs))
    }

    pub fn gen_unset_env(&self, name: &str) -> String {
        self.formatter.render_unset_env(name)
    }

    pub fn gen_unset_envs(&self, names: &[String]) -> String {
        self.render(&unset_env_effects(names))
    }

    pub fn gen_add_paths(&self, paths: &[String]) -> String {
        self.render(&[Effect::AddPaths(paths.to_vec())])
    }

    pub fn gen_set_path(&self, paths: &[String]) -> String {
        self.formatter.render_set_path(paths)
    }

    /// Remove `paths` from `current_path`. Returns the script (empty when
    /// nothing changes) and the requested entries that were not on PATH.
    pub fn gen_remove_paths(&self, current_path: &str, paths: &[String]) -> (String, Vec<String>) {
        self.gen_rem_then_add_paths(current_path, paths, &[])
    }

    /// Remove `rem` from `current_path`, then put `add` in front.
    pub fn gen_rem_then_add_paths(
        &self,
        current_path: &str,
        rem: &[String],
        add: &[String],
    ) -> (String, Vec<String>) {
        match self.rem_then_add_effect(current_path, rem, add) {
            (Some(effect), not_found) => (self.render(&[effect]), not_found),
            (None, not_found) => (String::new(), not_found),
        }
    }

    /// Effect form of [`Self::gen_rem_then_add_paths`].
    pub fn rem_then_add_effect(
        &self,
        current_path: &str,
        rem: &[String],
        add: &[String],
    ) -> (Option<Effect>, Vec<String>) {
        let current = self.split_path(current_path);
        let not_found: Vec<String> = rem
            .iter()
            .filter(|p| !current.contains(p))
            .cloned()
            .collect();

        let mut next: Vec<String> = add.to_vec();
        next.dedup();
        for p in &current {
            if !rem.contains(p) && !next.contains(p) {
                next.push(p.clone());
            }
        }
        if next == current {
            return (None, not_found);
        }
        (Some(Effect::SetPath(next)), not_found)
    }

    pub fn split_path(&self, value: &str) -> Vec<String> {
        value
            .split(self.formatter.path_separator())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn gen_hook_script(&self, params: &HookParams) -> String {
        self.formatter.hook_script(params)
    }
}

// ---------------------------------------------------------------------------
// ShellContext
// ---------------------------------------------------------------------------

/// Generator for the calling shell plus the PATH it currently has.
///
/// Only exists inside a hook shell; outside one, commands change persisted
/// state but emit no script.
#[derive(Debug)]
pub struct ShellContext {
    pub generator: ScriptGenerator,
    pub current_path: String,
}

impl ShellContext {
    pub fn new(kind: ShellKind, current_path: impl Into<String>) -> Self {
        ShellContext {
            generator: ScriptGenerator::new(kind),
            current_path: current_path.into(),
        }
    }

    /// Context for the hook shell described by `hook`, reading PATH from the
    /// process environment. `Ok(None)` outside a hook.
    pub fn from_hook(hook: &crate::hook::HookContext) -> crate::Result<Option<Self>> {
        Ok(hook
            .shell_kind()?
            .map(|kind| Self::new(kind, std::env::var("PATH").unwrap_or_default())))
    }

    pub fn render(&self, effects: &[Effect]) -> String {
        self.generator.render(effects)
    }

    /// PATH effect that drops `rem` and puts `add` first, if anything changes.
    pub fn path_effect(&self, rem: &[String], add: &[String]) -> (Option<Effect>, Vec<String>) {
        self.generator
            .rem_then_add_effect(&self.current_path, rem, add)
    }
}

pub fn set_env_effects(envs: &BTreeMap<String, String>) -> Vec<Effect> {
    envs.iter()
        .map(|(name, value)| Effect::SetEnv {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

pub fn unset_env_effects(names: &[String]) -> Vec<Effect> {
    names
        .iter()
        .map(|name| Effect::UnsetEnv { name: name.clone() })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
