use crate::cmd::ScopeArgs;
use crate::context::Context;
use crate::output::{print_json, print_script, print_table};
use clap::Subcommand;
use xenv_core::env;
use xenv_core::types::Scope;

#[derive(Subcommand)]
pub enum PathSubcommand {
    /// List PATH entries from every scope (default)
    List,
    /// Put directories in front of PATH
    Add {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true, value_name = "DIR")]
        dirs: Vec<String>,
    },
    /// Take directories off PATH
    Rm {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true, value_name = "DIR")]
        dirs: Vec<String>,
    },
}

pub fn run(ctx: &Context, subcmd: Option<PathSubcommand>, json: bool) -> anyhow::Result<()> {
    match subcmd.unwrap_or(PathSubcommand::List) {
        PathSubcommand::List => list(ctx, json),
        PathSubcommand::Add { scope, dirs } => add(ctx, scope.scope(), &dirs),
        PathSubcommand::Rm { scope, dirs } => remove(ctx, scope.scope(), &dirs),
    }
}

fn list(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let manager = ctx.manager()?;
    // Session first: that is the order entries take on PATH.
    let mut rows: Vec<(String, Scope)> = Vec::new();
    for scope in Scope::all().iter().rev() {
        if let Some(state) = manager.scope(*scope) {
            for p in state.paths() {
                if !rows.iter().any(|(seen, _)| seen == p) {
                    rows.push((p.clone(), *scope));
                }
            }
        }
    }

    if json {
        let items: Vec<_> = rows
            .iter()
            .map(|(path, scope)| serde_json::json!({ "path": path, "scope": scope.as_str() }))
            .collect();
        return print_json(&items);
    }
    if rows.is_empty() {
        println!("No paths added.");
        return Ok(());
    }
    let rows = rows
        .into_iter()
        .map(|(path, scope)| vec![path, scope.to_string()])
        .collect();
    print_table(&["PATH", "SCOPE"], rows);
    Ok(())
}

fn add(ctx: &Context, scope: Scope, dirs: &[String]) -> anyhow::Result<()> {
    ctx.warn_session_scope(scope);
    let mut manager = ctx.manager()?;
    let shell = ctx.shell()?;
    let outcome = env::add_paths(&mut manager, scope, dirs, shell.as_ref())?;
    for dir in dirs {
        println!("added {} ({scope})", env::normalize_path(dir, &ctx.cwd));
    }
    print_script(&outcome.script);
    Ok(())
}

fn remove(ctx: &Context, scope: Scope, dirs: &[String]) -> anyhow::Result<()> {
    ctx.warn_session_scope(scope);
    let mut manager = ctx.manager()?;
    let shell = ctx.shell()?;
    let outcome = env::remove_paths(&mut manager, scope, dirs, shell.as_ref())?;
    for dir in &outcome.not_found {
        eprintln!("warning: {dir} was not found");
    }
    print_script(&outcome.script);
    Ok(())
}
