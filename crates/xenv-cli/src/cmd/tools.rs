use crate::context::Context;
use crate::output::{print_json, print_table};
use anyhow::Context as _;
use clap::Subcommand;
use std::path::Path;
use xenv_core::activation::VersionSpec;
use xenv_core::registry::InstalledTool;
use xenv_core::XenvError;

#[derive(Subcommand)]
pub enum ToolsSubcommand {
    /// List installed versions
    List {
        /// Only versions of this tool
        name: Option<String>,
    },
    /// Register version directories found under configured install dirs
    Index {
        /// Only this sdk (default: every sdk in config)
        name: Option<String>,
    },
    /// Register an existing install
    Add {
        #[arg(value_name = "NAME:VERSION")]
        spec: String,
        /// Install directory
        #[arg(long)]
        dir: String,
        /// Executable directory, relative to the install directory or absolute
        #[arg(long)]
        bin_dir: Option<String>,
        /// Record as a plain tool rather than an sdk
        #[arg(long)]
        tool: bool,
    },
    /// Forget an installed version (files are left in place)
    Remove {
        #[arg(value_name = "NAME:VERSION")]
        spec: String,
    },
}

pub fn run(ctx: &Context, subcmd: ToolsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ToolsSubcommand::List { name } => list(ctx, name.as_deref(), json),
        ToolsSubcommand::Index { name } => index(ctx, name.as_deref(), json),
        ToolsSubcommand::Add {
            spec,
            dir,
            bin_dir,
            tool,
        } => add(ctx, &spec, &dir, bin_dir, tool),
        ToolsSubcommand::Remove { spec } => remove(ctx, &spec),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(ctx: &Context, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let registry = ctx.registry()?;
    let mut entries: Vec<&InstalledTool> = match name {
        Some(n) => {
            let canonical = ctx.config.find_sdk(n).map(|c| c.name.as_str()).unwrap_or(n);
            registry.list_sdk_versions(canonical)
        }
        None => registry.sdks.iter().collect(),
    };
    if name.is_none() {
        entries.extend(registry.tools.iter());
    }

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No tools installed.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                t.version.clone(),
                t.install_dir.clone(),
                if t.is_sdk { "sdk" } else { "tool" }.to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "VERSION", "INSTALL DIR", "KIND"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// index
// ---------------------------------------------------------------------------

fn index(ctx: &Context, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let mut registry = ctx.registry()?;
    let chains = match name {
        Some(n) => vec![ctx
            .config
            .find_sdk(n)
            .ok_or_else(|| XenvError::SdkNotDefined(n.to_string()))?],
        None => ctx.config.sdks.iter().collect(),
    };

    let mut added = Vec::new();
    for chain in chains {
        added.extend(
            registry
                .index_sdk(&ctx.config, chain)
                .with_context(|| format!("failed to index {}", chain.name))?,
        );
    }
    if !added.is_empty() {
        registry.save().context("failed to save tool registry")?;
    }

    if json {
        return print_json(&added);
    }
    if added.is_empty() {
        println!("No new versions found.");
    }
    for tool in &added {
        println!("indexed {} at {}", tool.id, tool.install_dir);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// add / remove
// ---------------------------------------------------------------------------

fn add(
    ctx: &Context,
    spec: &str,
    dir: &str,
    bin_dir: Option<String>,
    tool: bool,
) -> anyhow::Result<()> {
    let spec = VersionSpec::parse(spec)?;
    let install_dir = xenv_core::env::normalize_path(dir, &ctx.cwd);
    if !Path::new(&install_dir).is_dir() {
        anyhow::bail!("install directory {install_dir} does not exist");
    }

    let mut registry = ctx.registry()?;
    let mut entry = InstalledTool::new(&spec.name, &spec.version, &install_dir);
    entry.bin_dir = bin_dir;
    entry.is_sdk = !tool;
    entry.source = Some("manual".to_string());
    registry.add(entry);
    registry.save().context("failed to save tool registry")?;

    println!("registered {spec} at {install_dir}");
    Ok(())
}

fn remove(ctx: &Context, spec: &str) -> anyhow::Result<()> {
    let spec = VersionSpec::parse(spec)?;
    let mut registry = ctx.registry()?;
    let removed = registry
        .remove_sdk(&spec.name, &spec.version)
        .or_else(|| registry.remove_tool(&spec.name, &spec.version));
    if removed.is_none() {
        return Err(XenvError::NotInstalled(spec.to_string()).into());
    }
    registry.save().context("failed to save tool registry")?;
    println!("removed {spec}");
    Ok(())
}
