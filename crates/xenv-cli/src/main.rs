mod cmd;
mod context;
mod output;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, env::EnvSubcommand, path::PathSubcommand, tools::ToolsSubcommand,
    ScopeArgs,
};
use context::Context;
use xenv_core::hook::HookContext;

#[derive(Parser)]
#[command(
    name = "xenv",
    about = "Activate development tool versions per shell session, directory or user",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Activate installed tool versions (name:version)
    Use {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true, value_name = "NAME:VERSION")]
        targets: Vec<String>,
    },

    /// Deactivate tool versions (name:version)
    Unuse {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true, value_name = "NAME:VERSION")]
        targets: Vec<String>,
    },

    /// Show or change environment variables
    Env {
        #[command(subcommand)]
        subcommand: Option<EnvSubcommand>,
    },

    /// Show or change PATH entries
    Path {
        #[command(subcommand)]
        subcommand: Option<PathSubcommand>,
    },

    /// Show active tools in every scope
    List,

    /// Clear every tool, variable and PATH entry recorded in a scope
    Reset {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Write the default config and create its directories
    Init,

    /// Print the hook script for a shell
    Shell {
        /// Shell dialect: bash, zsh, pwsh or cmd
        #[arg(long = "type", value_name = "SHELL")]
        shell_type: String,
        /// Keep the current session id
        #[arg(long)]
        reload: bool,
    },

    /// Apply directory state after a directory change (run by the hook)
    #[command(hide = true)]
    Direnv,

    /// Manage the local installed-tool registry
    Tools {
        #[command(subcommand)]
        subcommand: ToolsSubcommand,
    },

    /// Inspect, change, export or import the user configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();
    let hook = HookContext::from_env();

    let default_level = if hook.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    // stdout carries the eval script; logs must stay off it.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = Context::load(hook).and_then(|ctx| match cli.command {
        Commands::Use { scope, targets } => {
            cmd::use_cmd::run(&ctx, scope.scope(), &targets, cli.json)
        }
        Commands::Unuse { scope, targets } => {
            cmd::use_cmd::run_unuse(&ctx, scope.scope(), &targets, cli.json)
        }
        Commands::Env { subcommand } => cmd::env::run(&ctx, subcommand, cli.json),
        Commands::Path { subcommand } => cmd::path::run(&ctx, subcommand, cli.json),
        Commands::List => cmd::list::run(&ctx, cli.json),
        Commands::Reset { scope } => cmd::reset::run(&ctx, scope),
        Commands::Init => cmd::init::run(&ctx, cli.json),
        Commands::Shell { shell_type, reload } => cmd::shell::run(&ctx, &shell_type, reload),
        Commands::Direnv => cmd::direnv::run(&ctx),
        Commands::Tools { subcommand } => cmd::tools::run(&ctx, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&ctx, subcommand, cli.json),
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
