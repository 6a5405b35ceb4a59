use crate::cmd::ScopeArgs;
use crate::context::Context;
use crate::output::{print_json, print_script, print_table};
use clap::Subcommand;
use std::collections::BTreeMap;
use xenv_core::env;
use xenv_core::manager::StateManager;
use xenv_core::types::Scope;

#[derive(Subcommand)]
pub enum EnvSubcommand {
    /// List variables from every scope (default)
    List,
    /// Set a variable
    Set {
        #[command(flatten)]
        scope: ScopeArgs,
        name: String,
        value: String,
    },
    /// Remove variables
    Unset {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true)]
        names: Vec<String>,
    },
}

pub fn run(ctx: &Context, subcmd: Option<EnvSubcommand>, json: bool) -> anyhow::Result<()> {
    match subcmd.unwrap_or(EnvSubcommand::List) {
        EnvSubcommand::List => list(ctx, json),
        EnvSubcommand::Set { scope, name, value } => set(ctx, scope.scope(), &name, &value),
        EnvSubcommand::Unset { scope, names } => unset(ctx, scope.scope(), &names),
    }
}

/// Effective value of each variable and the scope it comes from.
pub(crate) fn effective_envs(manager: &StateManager) -> BTreeMap<String, (String, Scope)> {
    let mut out = BTreeMap::new();
    for scope in Scope::all() {
        if let Some(state) = manager.scope(*scope) {
            for (name, value) in state.envs() {
                out.insert(name.clone(), (value.clone(), *scope));
            }
        }
    }
    out
}

fn list(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let manager = ctx.manager()?;
    let envs = effective_envs(&manager);

    if json {
        let items: Vec<_> = envs
            .iter()
            .map(|(name, (value, scope))| {
                serde_json::json!({ "name": name, "value": value, "scope": scope.as_str() })
            })
            .collect();
        return print_json(&items);
    }
    if envs.is_empty() {
        println!("No environment variables set.");
        return Ok(());
    }
    let rows = envs
        .into_iter()
        .map(|(name, (value, scope))| vec![name, value, scope.to_string()])
        .collect();
    print_table(&["NAME", "VALUE", "SCOPE"], rows);
    Ok(())
}

fn set(ctx: &Context, scope: Scope, name: &str, value: &str) -> anyhow::Result<()> {
    ctx.warn_session_scope(scope);
    let mut manager = ctx.manager()?;
    let shell = ctx.shell()?;
    let outcome = env::set_env(&mut manager, scope, name, value, shell.as_ref())?;
    println!("set {} ({scope})", env::normalize_env_name(name)?);
    print_script(&outcome.script);
    Ok(())
}

fn unset(ctx: &Context, scope: Scope, names: &[String]) -> anyhow::Result<()> {
    ctx.warn_session_scope(scope);
    let mut manager = ctx.manager()?;
    let shell = ctx.shell()?;
    let outcome = env::unset_envs(&mut manager, scope, names, shell.as_ref())?;
    for name in &outcome.not_found {
        eprintln!("warning: {name} is not set in {scope} scope");
    }
    print_script(&outcome.script);
    Ok(())
}
