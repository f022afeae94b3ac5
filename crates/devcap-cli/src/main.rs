//! # devcap CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use devcap_cli::check::{run_check, CheckArgs};
use devcap_cli::merge::{run_merge, MergeArgs};
use devcap_cli::plan::{run_plan, PlanArgs};
use devcap_cli::simulate::{run_simulate, SimulateArgs};

/// Device capability profile toolchain.
///
/// Composes requirement profiles against a capability registry, checks
/// device reports for compliance, and simulates profiles on top of a
/// reported device.
#[derive(Parser, Debug)]
#[command(name = "devcap", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Evaluator configuration file (YAML or JSON). Without one the
    /// DEVCAP_* environment variables apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose a profile and print its evaluation plan.
    Plan(PlanArgs),

    /// Evaluate profiles against a device report.
    Check(CheckArgs),

    /// Override a device report with a profile's declarations.
    Simulate(SimulateArgs),

    /// Merge the blocks a profile settles on into one block.
    Merge(MergeArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = devcap_cli::load_config(cli.config.as_deref()).and_then(|config| {
        tracing::debug!(?config, "loaded configuration");
        let mut out = std::io::stdout().lock();
        match &cli.command {
            Commands::Plan(args) => run_plan(args, &mut out),
            Commands::Check(args) => run_check(args, &config, &mut out),
            Commands::Simulate(args) => run_simulate(args, &config, &mut out),
            Commands::Merge(args) => run_merge(args, &config, &mut out),
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
