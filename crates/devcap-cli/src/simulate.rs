//! # Simulate Subcommand
//!
//! Overrides a device report with everything a profile declares and prints
//! the simulated report. The profile is evaluated first so slots of
//! alternatives contribute the alternative the device actually satisfies.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use devcap_core::Diagnostic;
use devcap_eval::{Evaluator, EvaluatorConfig, Simulator};
use devcap_profile::{Composer, Encoder};
use serde::Serialize;
use serde_json::Value as Json;

use crate::input::{InputArgs, Inputs};
use crate::output::{write_diagnostics, write_json, OutputFormat};

/// Arguments for the simulate subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Device report to start from (JSON or YAML).
    #[arg(long)]
    pub device: PathBuf,

    /// Profile label to simulate.
    pub profile: String,

    /// Write the simulated device report to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct SimulationView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<Json>,
    diagnostics: &'a [Diagnostic],
}

/// Execute the simulate subcommand.
pub fn run_simulate(args: &SimulateArgs, config: &EvaluatorConfig, out: &mut impl Write) -> Result<u8> {
    let inputs = Inputs::load(&args.input)?;
    let device = inputs.device(&args.device)?;
    let plan = Composer::new(&inputs.registry, &inputs.profiles)
        .compose(&args.profile)
        .with_context(|| format!("failed to compose profile {}", args.profile))?;

    let verdict = Evaluator::new(&inputs.registry, &inputs.profiles, config.clone()).evaluate(&plan, &device);
    let simulation = Simulator::new(&inputs.registry, config.clone()).simulate(&plan, &device, Some(&verdict));
    tracing::info!(
        profile = %args.profile,
        diagnostics = simulation.diagnostics.len(),
        "simulated"
    );
    let report = Encoder::new(&inputs.registry).device(&simulation.device);

    let inline = match &args.output {
        Some(path) => {
            let content = serde_json::to_string_pretty(&report)?;
            std::fs::write(path, content + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            None
        }
        None => Some(report),
    };

    match args.format {
        OutputFormat::Json => write_json(
            out,
            &SimulationView {
                device: inline,
                diagnostics: &simulation.diagnostics,
            },
        )?,
        // Keep stdout parseable when the report goes there.
        OutputFormat::Text => match inline {
            Some(report) => {
                write_json(out, &report)?;
                for diagnostic in &simulation.diagnostics {
                    tracing::warn!("{diagnostic}");
                }
            }
            None => write_diagnostics(out, "", &simulation.diagnostics)?,
        },
    }
    Ok(0)
}
