use crate::cmd::ScopeArgs;
use crate::context::Context;
use crate::output::print_script;
use xenv_core::env;

/// Drop everything recorded in one scope.
pub fn run(ctx: &Context, scope: ScopeArgs) -> anyhow::Result<()> {
    let scope = scope.scope();
    ctx.warn_session_scope(scope);
    let mut manager = ctx.manager()?;
    let shell = ctx.shell()?;
    let outcome = env::reset_scope(&mut manager, scope, shell.as_ref())?;
    println!("reset {scope} scope");
    print_script(&outcome.script);
    Ok(())
}
