use crate::context::Context;
use crate::output::{print_json, print_script};
use xenv_core::activation::{ActivationReport, Activator};
use xenv_core::types::Scope;

pub fn run(ctx: &Context, scope: Scope, targets: &[String], json: bool) -> anyhow::Result<()> {
    ctx.warn_session_scope(scope);
    let mut manager = ctx.manager()?;
    let registry = ctx.registry()?;
    let shell = ctx.shell()?;

    let report = Activator::new(&ctx.config, &registry).activate(
        &mut manager,
        scope,
        targets,
        shell.as_ref(),
    )?;
    finish(&report, scope, "activated", json)
}

pub fn run_unuse(
    ctx: &Context,
    scope: Scope,
    targets: &[String],
    json: bool,
) -> anyhow::Result<()> {
    ctx.warn_session_scope(scope);
    let mut manager = ctx.manager()?;
    let registry = ctx.registry()?;
    let shell = ctx.shell()?;

    let report = Activator::new(&ctx.config, &registry).deactivate(
        &mut manager,
        scope,
        targets,
        shell.as_ref(),
    )?;
    finish(&report, scope, "deactivated", json)
}

fn finish(report: &ActivationReport, scope: Scope, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|f| serde_json::json!({ "target": f.target, "error": f.error.to_string() }))
            .collect();
        print_json(&serde_json::json!({
            "scope": scope.as_str(),
            "action": verb,
            "tools": report.changed.iter().map(|t| &t.id).collect::<Vec<_>>(),
            "failed": failed,
        }))?;
    } else {
        for tool in &report.changed {
            println!("{verb} {} ({scope})", tool.id);
        }
    }
    for failure in &report.failed {
        eprintln!("error: {}: {}", failure.target, failure.error);
    }
    print_script(&report.script);

    if report.all_failed() {
        anyhow::bail!("no tool was {verb}");
    }
    Ok(())
}
