mod commands;
mod dialog;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use simfleet_monitor::{BackendFactory, CloudMonitor, FileProjectContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simfleet")]
#[command(about = "Ephemeral simulation clusters on AWS or Vagrant", long_about = None)]
#[command(version)]
struct Cli {
    /// Project directory holding .simfleet/cloud.json
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Config file (skips discovery)
    #[arg(short, long, global = true, env = "SIMFLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cluster
    Up {
        /// Keep monitoring the cluster after it is up
        #[arg(short, long)]
        watch: bool,
    },
    /// Tear down the project's cluster
    Down {
        /// Tear down even if the cluster does not look running
        #[arg(short, long)]
        force: bool,
    },
    /// Show the persisted cluster
    Status {
        /// Ask the backend whether the cluster is running
        #[arg(long)]
        check: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-attach to a persisted cluster
    Reconnect {
        /// Keep monitoring the cluster after re-attaching
        #[arg(short, long)]
        watch: bool,
    },
    /// Re-attach and monitor until Ctrl-C
    Watch,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => simfleet_config::load_config(path)?,
        None => simfleet_config::load()?,
    };

    let context = Arc::new(FileProjectContext::open(&cli.project, config.default_settings()).await?);

    if let Commands::Status { check, json } = cli.command {
        return commands::status::handle(context.as_ref(), check, json).await;
    }

    let handle = CloudMonitor::new(context.clone(), Arc::new(BackendFactory))
        .with_handler(Arc::new(dialog::TerminalDialog))
        .with_settings(config.monitor.clone())
        .spawn();

    let result = match cli.command {
        Commands::Up { watch } => commands::up::handle(&handle, watch).await,
        Commands::Down { force } => commands::down::handle(&handle, force).await,
        Commands::Reconnect { watch } => commands::reconnect::handle(&handle, watch).await,
        Commands::Watch => commands::watch::handle(&handle).await,
        Commands::Status { .. } => Ok(()),
    };

    handle.shutdown().await;

    if let Err(e) = &result {
        eprintln!("{} {}", "✗".red(), e);
    }
    result
}
