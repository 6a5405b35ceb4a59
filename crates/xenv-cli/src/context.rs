use anyhow::Context as _;
use std::path::PathBuf;
use xenv_core::{
    config::Config,
    hook::HookContext,
    manager::StateManager,
    paths::StatePaths,
    registry::ToolsLocal,
    shell::ShellContext,
    types::Scope,
};

/// Everything a command needs to know about where it runs.
pub struct Context {
    pub hook: HookContext,
    pub paths: StatePaths,
    pub cwd: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn load(hook: HookContext) -> anyhow::Result<Self> {
        let paths = StatePaths::from_home_env()?;
        let cwd = std::env::current_dir().context("failed to read current directory")?;
        let config = Config::load(&paths.config_file)
            .with_context(|| format!("failed to load {}", paths.config_file.display()))?;
        Ok(Context {
            hook,
            paths,
            cwd,
            config,
        })
    }

    pub fn manager(&self) -> anyhow::Result<StateManager> {
        StateManager::load(self.paths.clone(), self.hook.clone(), &self.cwd)
            .context("failed to load activation state")
    }

    pub fn registry(&self) -> anyhow::Result<ToolsLocal> {
        ToolsLocal::load(&self.paths.tools_local_file).context("failed to load tool registry")
    }

    /// Script target for this invocation; `None` outside a hook shell.
    pub fn shell(&self) -> anyhow::Result<Option<ShellContext>> {
        Ok(ShellContext::from_hook(&self.hook)?)
    }

    /// Session changes only stick inside a hook shell.
    pub fn warn_session_scope(&self, scope: Scope) {
        if scope == Scope::Session && !self.hook.in_hook() {
            eprintln!(
                "warning: not running in an xenv shell, session changes are not kept; \
                 use -g or -s, or run `eval \"$(xenv shell --type bash)\"` first"
            );
        }
    }
}
