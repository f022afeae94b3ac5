//! # Check Subcommand
//!
//! Evaluates one or more profiles against a device report. Several profiles
//! are evaluated in parallel; `--fallbacks` evaluates each profile's
//! fallbacks in order when the profile itself is not satisfied.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use devcap_eval::{Evaluator, EvaluatorConfig, Verdict};
use devcap_profile::Composer;

use crate::input::{InputArgs, Inputs};
use crate::output::{write_json, write_verdict, OutputFormat};
use crate::EXIT_UNSATISFIED;

/// Arguments for the check subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Device report (JSON or YAML).
    #[arg(long)]
    pub device: PathBuf,

    /// Profile labels to evaluate.
    #[arg(value_name = "PROFILE", required = true)]
    pub labels: Vec<String>,

    /// Fall back to the profile's fallbacks when it is not satisfied.
    #[arg(long)]
    pub fallbacks: bool,

    /// Also list warnings: unmet optionals and informational findings.
    #[arg(long)]
    pub warnings: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Execute the check subcommand.
pub fn run_check(args: &CheckArgs, config: &EvaluatorConfig, out: &mut impl Write) -> Result<u8> {
    let inputs = Inputs::load(&args.input)?;
    let device = inputs.device(&args.device)?;
    let evaluator = Evaluator::new(&inputs.registry, &inputs.profiles, config.clone());

    let verdicts: Vec<Verdict> = if args.fallbacks {
        args.labels
            .iter()
            .map(|label| {
                evaluator
                    .evaluate_with_fallbacks(label, &device)
                    .with_context(|| format!("failed to evaluate profile {label}"))
            })
            .collect::<Result<_>>()?
    } else {
        let composer = Composer::new(&inputs.registry, &inputs.profiles);
        let plans = args
            .labels
            .iter()
            .map(|label| {
                composer
                    .compose(label)
                    .with_context(|| format!("failed to compose profile {label}"))
            })
            .collect::<Result<Vec<_>>>()?;
        evaluator.evaluate_many(&plans, &device)
    };

    for verdict in &verdicts {
        tracing::info!(
            profile = %verdict.profile,
            satisfied = verdict.satisfied,
            failures = verdict.failures().len(),
            "evaluated"
        );
    }

    match args.format {
        OutputFormat::Json => write_json(out, &verdicts)?,
        OutputFormat::Text => {
            for verdict in &verdicts {
                write_verdict(out, verdict, args.warnings)?;
            }
        }
    }

    Ok(if verdicts.iter().all(|v| v.satisfied) {
        0
    } else {
        EXIT_UNSATISFIED
    })
}
