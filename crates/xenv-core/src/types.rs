use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which layer of activation state an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    #[serde(rename = "direnv")]
    Directory,
    Session,
}

impl Scope {
    /// Layers in merge order: later entries override earlier ones.
    pub fn all() -> &'static [Scope] {
        &[Scope::Global, Scope::Directory, Scope::Session]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Directory => "direnv",
            Scope::Session => "session",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ShellKind
// ---------------------------------------------------------------------------

/// Target dialect for generated activation scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellKind {
    Bash,
    Zsh,
    Pwsh,
    /// Windows cmd.exe through Clink; scripts are Lua.
    Cmd,
}

impl ShellKind {
    pub fn all() -> &'static [ShellKind] {
        &[ShellKind::Bash, ShellKind::Zsh, ShellKind::Pwsh, ShellKind::Cmd]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Zsh => "zsh",
            ShellKind::Pwsh => "pwsh",
            ShellKind::Cmd => "cmd",
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShellKind {
    type Err = crate::error::XenvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bash" => Ok(ShellKind::Bash),
            "zsh" => Ok(ShellKind::Zsh),
            "pwsh" | "powershell" => Ok(ShellKind::Pwsh),
            "cmd" | "clink" => Ok(ShellKind::Cmd),
            _ => Err(crate::error::XenvError::UnsupportedShell(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn scope_merge_order() {
        assert!(Scope::Global < Scope::Directory);
        assert!(Scope::Directory < Scope::Session);
        assert_eq!(Scope::all().last(), Some(&Scope::Session));
    }

    #[test]
    fn scope_strings() {
        assert_eq!(Scope::Session.as_str(), "session");
        assert_eq!(Scope::Directory.to_string(), "direnv");
        assert_eq!(Scope::Global.as_str(), "global");
    }

    #[test]
    fn shell_kind_roundtrip() {
        for kind in ShellKind::all() {
            assert_eq!(ShellKind::from_str(kind.as_str()).unwrap(), *kind);
        }
    }

    #[test]
    fn shell_kind_aliases() {
        assert_eq!(ShellKind::from_str("PowerShell").unwrap(), ShellKind::Pwsh);
        assert_eq!(ShellKind::from_str("clink").unwrap(), ShellKind::Cmd);
    }

    #[test]
    fn unknown_shell_rejected() {
        let err = ShellKind::from_str("fish").unwrap_err();
        assert!(err.to_string().contains("fish"));
    }
}
