use crate::context::Context;
use crate::output::print_json;
use anyhow::Context as _;

/// Write the default config when there is none and create the directories
/// it names. Running it again keeps the existing config.
pub fn run(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let file = &ctx.paths.config_file;
    let created = !file.exists();
    if created {
        ctx.config
            .save(file)
            .with_context(|| format!("failed to write {}", file.display()))?;
    }

    let dirs = [
        ("bin_dir", ctx.config.expanded_bin_dir()),
        ("install_dir", ctx.config.expanded_install_dir()),
        ("shell_hooks_dir", ctx.config.expanded_hooks_dir()),
    ];
    for (_, dir) in &dirs {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {dir}"))?;
    }

    if json {
        let mut value = serde_json::json!({
            "config_file": file,
            "created": created,
        });
        for (key, dir) in &dirs {
            value[*key] = serde_json::json!(dir);
        }
        return print_json(&value);
    }
    if created {
        println!("  created: {}", file.display());
    } else {
        println!("  exists:  {}", file.display());
    }
    for (key, dir) in &dirs {
        println!("  {key}: {dir}");
    }
    Ok(())
}
