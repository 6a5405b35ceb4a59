use crate::error::Result;
use crate::types::ShellKind;
use std::str::FromStr;

pub const ENV_HOOK_SHELL: &str = "XENV_HOOK_SHELL";
pub const ENV_SESSION_ID: &str = "XENV_SESSION_ID";
pub const ENV_DEBUG_MODE: &str = "XENV_DEBUG_MODE";
pub const ENV_DIRENV_FILE: &str = "XENV_DIRENV_FILE";

/// What the process knows about the shell that launched it.
///
/// A non-empty hook shell means the command was invoked through the wrapper
/// function installed by `xenv shell`, so its output will be evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookContext {
    pub hook_shell: Option<String>,
    pub session_id: String,
    pub debug: bool,
}

impl HookContext {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a context from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let hook_shell = lookup(ENV_HOOK_SHELL).filter(|s| !s.trim().is_empty());
        let session_id = lookup(ENV_SESSION_ID)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(new_session_id);
        let debug = lookup(ENV_DEBUG_MODE)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        HookContext {
            hook_shell,
            session_id,
            debug,
        }
    }

    pub fn in_hook(&self) -> bool {
        self.hook_shell.is_some()
    }

    /// Parse the hook shell. `Ok(None)` outside a hook; an error when the
    /// marker names a dialect xenv cannot render.
    pub fn shell_kind(&self) -> Result<Option<ShellKind>> {
        self.hook_shell
            .as_deref()
            .map(ShellKind::from_str)
            .transpose()
    }
}

/// Session ids default to a local timestamp.
pub fn new_session_id() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx(vars: &[(&str, &str)]) -> HookContext {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HookContext::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn outside_hook() {
        let c = ctx(&[]);
        assert!(!c.in_hook());
        assert_eq!(c.shell_kind().unwrap(), None);
        assert!(!c.debug);
        assert_eq!(c.session_id.len(), "20240101_120000".len());
    }

    #[test]
    fn inside_hook() {
        let c = ctx(&[
            (ENV_HOOK_SHELL, "zsh"),
            (ENV_SESSION_ID, "s-42"),
            (ENV_DEBUG_MODE, "true"),
        ]);
        assert!(c.in_hook());
        assert_eq!(c.shell_kind().unwrap(), Some(ShellKind::Zsh));
        assert_eq!(c.session_id, "s-42");
        assert!(c.debug);
    }

    #[test]
    fn blank_marker_is_not_a_hook() {
        let c = ctx(&[(ENV_HOOK_SHELL, "  "), (ENV_SESSION_ID, "")]);
        assert!(!c.in_hook());
        assert!(!c.session_id.is_empty());
    }

    #[test]
    fn unknown_hook_shell_is_an_error() {
        let c = ctx(&[(ENV_HOOK_SHELL, "fish")]);
        assert!(c.in_hook());
        assert!(c.shell_kind().is_err());
    }
}
