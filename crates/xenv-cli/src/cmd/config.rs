use crate::context::Context;
use crate::output::print_json;
use anyhow::Context as _;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use xenv_core::config::{Config, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Print one setting: bin_dir, install_dir or shell_hooks_dir
    Get { key: String },

    /// Change one setting and save the config
    Set { key: String, value: String },

    /// Write the config as JSON to a file, or to stdout
    Export {
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Replace the config with an exported JSON file
    Import { file: PathBuf },
}

pub fn run(ctx: &Context, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(ctx, json),
        ConfigSubcommand::Validate => validate(ctx, json),
        ConfigSubcommand::Get { key } => get(ctx, &key, json),
        ConfigSubcommand::Set { key, value } => set(ctx, &key, &value),
        ConfigSubcommand::Export { output } => export(ctx, output.as_deref()),
        ConfigSubcommand::Import { file } => import(ctx, &file),
    }
}

fn show(ctx: &Context, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&ctx.config);
    }
    println!("# {}", ctx.paths.config_file.display());
    print!("{}", serde_yaml::to_string(&ctx.config)?);
    Ok(())
}

fn validate(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let warnings = ctx.config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// get / set
// ---------------------------------------------------------------------------

fn get(ctx: &Context, key: &str, json: bool) -> anyhow::Result<()> {
    let value = ctx.config.get(key)?;
    if json {
        return print_json(&serde_json::json!({ "key": key, "value": value }));
    }
    println!("{value}");
    Ok(())
}

fn set(ctx: &Context, key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = ctx.config.clone();
    config.set(key, value)?;
    save(ctx, &config)?;
    println!("set {key} = {value}");
    Ok(())
}

fn save(ctx: &Context, config: &Config) -> anyhow::Result<()> {
    let file = &ctx.paths.config_file;
    config
        .save(file)
        .with_context(|| format!("failed to write {}", file.display()))
}

// ---------------------------------------------------------------------------
// export / import
// ---------------------------------------------------------------------------

fn export(ctx: &Context, output: Option<&Path>) -> anyhow::Result<()> {
    let data = ctx.config.to_json()?;
    match output {
        Some(file) => {
            let file = ctx.cwd.join(file);
            xenv_core::io::atomic_write(&file, format!("{data}\n").as_bytes())
                .with_context(|| format!("failed to write {}", file.display()))?;
            println!("exported config to {}", file.display());
        }
        None => println!("{data}"),
    }
    Ok(())
}

fn import(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let config = Config::from_json(&data)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    let warnings = config.validate();
    for w in &warnings {
        if w.level == WarnLevel::Warning {
            eprintln!("warning: {}", w.message);
        }
    }
    let errors: Vec<&str> = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message.as_str())
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("imported config is invalid: {}", errors.join("; "));
    }

    save(ctx, &config)?;
    println!(
        "imported {} into {}",
        file.display(),
        ctx.paths.config_file.display()
    );
    Ok(())
}
