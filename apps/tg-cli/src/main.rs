//! # tg-cli
//!
//! Command-line interface for Tool Governance.
//!
//! - `tg policy validate/compile/publish/show/profiles`: author and publish
//!   the security policy
//! - `tg route register/stack/unstack/mode/clear/list/ensure`: manage which
//!   governance checks bind to which tool
//! - `tg access`: report the checks that apply to a set of grants

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::GovernanceConfig;

/// Tool Governance CLI: compile policies and manage governance routes.
#[derive(Parser)]
#[command(name = "tg", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, compile and publish the security policy.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Manage governance route groups.
    Route {
        #[command(subcommand)]
        command: commands::route::RouteCommands,
    },
    /// Show which checks apply to the tools a subject is granted.
    Access(commands::access::AccessArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output on stdout stays pipeable.
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("tg_policy={}", level).parse()?)
                .add_directive(format!("tg_routing={}", level).parse()?)
                .add_directive(format!("tg_cli={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = GovernanceConfig::load(&project_root)?;

    match &cli.command {
        Commands::Policy { command } => commands::policy::execute(command, &config),
        Commands::Route { command } => commands::route::execute(command, &config),
        Commands::Access(args) => commands::access::execute(args, &config),
    }
}
