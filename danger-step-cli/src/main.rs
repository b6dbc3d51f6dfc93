//! danger-step CLI - bootstrap Bundler and run Danger from a build step
//!
//! Step inputs are read from the environment (`repository_url`,
//! `github_api_token`, ...) or the matching flags. Running without a
//! subcommand runs the step.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use danger_step_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{InputArgs, RunArgs};

/// danger-step: run Danger against a repository from a build pipeline
#[derive(Parser, Debug)]
#[command(name = "danger-step")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Toolchain config file (TOML)
    #[arg(long, global = true, env = "DANGER_STEP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the commands run in (overrides config)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,

    /// Kill any command running longer than this many seconds (overrides config)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(flatten)]
    inputs: InputArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Install dependencies and run danger (default)
    #[command(visible_alias = "r")]
    Run,

    /// Show the effective toolchain configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

/// Log a fatal error and produce the failing exit code
fn fail(err: anyhow::Error) -> ExitCode {
    tracing::error!("{:#}", err);
    ExitCode::FAILURE
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    // Load configuration with overrides
    let config = Config::load_with_overrides(
        cli.config.as_deref(),
        cli.workdir.clone(),
        cli.timeout_secs.map(Duration::from_secs),
    )?;

    match cli.command {
        Some(Commands::Version) => {
            println!("danger-step {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Config) => {
            commands::show_config(&config, cli.config.as_deref());
        }
        Some(Commands::Run) | None => {
            let args = RunArgs { inputs: cli.inputs };
            args.execute(config).await?;
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}
