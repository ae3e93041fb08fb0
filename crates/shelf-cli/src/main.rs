//! Shelf CLI - assign addresses, package, and fetch addressed resources

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{build, fetch, init};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Rule-driven asset addressing with change-gated packaging", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign addresses and package unconditionally
    Build,

    /// Pre-packaging hook: assign and package only when the config changed
    Hook {
        /// Fail with a non-zero exit code when the build step fails
        #[arg(long)]
        strict: bool,
    },

    /// Show config location, fingerprints and last build time
    Status,

    /// Show what an assignment pass would do without changing anything
    Plan {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create a default config if none exists
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Fetch one resource from the last build by address
    Get {
        /// Logical address (e.g., icons/sword)
        address: String,

        /// Write the fetched bytes to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch resources from the last build by label or address folder
    Label {
        /// Label or address folder
        label: String,

        /// Only fetch the first match
        #[arg(long)]
        first: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let root = cli.root.as_path();

    match cli.command {
        Commands::Build => build::run_build(root),
        Commands::Hook { strict } => build::run_hook(root, strict),
        Commands::Status => build::run_status(root),
        Commands::Plan { format } => build::run_plan(root, &format),
        Commands::Init { force } => init::run(root, force),
        Commands::Get { address, output } => fetch::run_get(root, &address, output.as_deref()),
        Commands::Label { label, first } => fetch::run_label(root, &label, first),
    }
}
