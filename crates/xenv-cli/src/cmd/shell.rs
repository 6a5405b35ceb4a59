use crate::context::Context;
use anyhow::Context as _;
use std::str::FromStr;
use xenv_core::hook::new_session_id;
use xenv_core::shell::{HookParams, ScriptGenerator};
use xenv_core::state::ActivityState;
use xenv_core::types::ShellKind;

pub fn run(ctx: &Context, shell_type: &str, reload: bool) -> anyhow::Result<()> {
    let kind = ShellKind::from_str(shell_type)?;
    if kind == ShellKind::Cmd && which::which("clink").is_err() {
        eprintln!("warning: clink was not found on PATH; the cmd hook is a clink Lua script");
    }

    let session_id = if reload {
        ctx.hook.session_id.clone()
    } else {
        new_session_id()
    };
    let config = &ctx.config;
    let params = HookParams {
        program: "xenv".to_string(),
        session_id: session_id.clone(),
        bin_dir: config.expanded_bin_dir(),
        hooks_dir: config.expanded_hooks_dir(),
        global_env: config.global_env.clone(),
        global_paths: config
            .global_paths
            .iter()
            .map(|p| xenv_core::paths::expand_home(p))
            .collect(),
        aliases: config.shell_aliases.clone(),
    };

    let generator = ScriptGenerator::new(kind);
    println!("{}", generator.gen_hook_script(&params));

    // A reloaded shell keeps what its session had activated.
    if reload {
        xenv_core::paths::validate_session_id(&session_id)?;
        let file = ctx.paths.session_file(&session_id);
        let session = ActivityState::load(&file)
            .with_context(|| format!("failed to load {}", file.display()))?;
        for script in [
            generator.gen_set_envs(session.envs()),
            generator.gen_add_paths(session.paths()),
        ] {
            if !script.is_empty() {
                println!("{script}");
            }
        }
    }
    Ok(())
}
