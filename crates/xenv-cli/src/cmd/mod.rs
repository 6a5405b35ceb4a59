pub mod config;
pub mod direnv;
pub mod env;
pub mod init;
pub mod list;
pub mod path;
pub mod reset;
pub mod shell;
pub mod tools;
pub mod use_cmd;

use clap::Args;
use xenv_core::types::Scope;

/// Where a change is recorded. Defaults to the current shell session.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ScopeArgs {
    /// Record in the user-wide state
    #[arg(short = 'g', long, conflicts_with = "save")]
    pub global: bool,

    /// Record in the directory's .xenv.toml
    #[arg(short = 's', long)]
    pub save: bool,
}

impl ScopeArgs {
    pub fn scope(self) -> Scope {
        if self.global {
            Scope::Global
        } else if self.save {
            Scope::Directory
        } else {
            Scope::Session
        }
    }
}
