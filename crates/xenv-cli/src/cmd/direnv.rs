use crate::context::Context;
use crate::output::print_script;
use std::path::PathBuf;
use xenv_core::activation::Activator;
use xenv_core::direnv;
use xenv_core::hook::ENV_DIRENV_FILE;

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let Some(shell) = ctx.shell()? else {
        tracing::debug!("direnv outside a hook shell, nothing to do");
        return Ok(());
    };
    let previous = std::env::var_os(ENV_DIRENV_FILE)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);

    let manager = ctx.manager()?;
    let registry = ctx.registry()?;
    let activator = Activator::new(&ctx.config, &registry);
    let outcome = direnv::sync(previous.as_deref(), &manager, &activator, &shell)?;
    print_script(&outcome.script);
    Ok(())
}
