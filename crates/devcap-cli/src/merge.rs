//! # Merge Subcommand
//!
//! Folds the blocks a profile settles on into a single capability block.
//! With `--device` the device picks the alternative of each slot of
//! alternatives; without one the first alternative is used.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use devcap_core::Diagnostic;
use devcap_eval::{BlockMerger, Evaluator, EvaluatorConfig, MergePolicy};
use devcap_profile::{Composer, Encoder};
use serde::Serialize;
use serde_json::Value as Json;

use crate::input::{InputArgs, Inputs};
use crate::output::{write_diagnostics, write_json, OutputFormat};
use crate::EXIT_UNSATISFIED;

/// Arguments for the merge subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Profile label whose blocks are merged.
    pub profile: String,

    /// Device report used to select alternatives.
    #[arg(long)]
    pub device: Option<PathBuf>,

    /// Conflict policy. Defaults to the configured one.
    #[arg(long, value_parser = parse_policy)]
    pub policy: Option<MergePolicy>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

fn parse_policy(raw: &str) -> Result<MergePolicy, String> {
    raw.parse()
}

#[derive(Debug, Serialize)]
struct MergeView<'a> {
    block: Json,
    diagnostics: &'a [Diagnostic],
    rejected: Vec<&'a str>,
}

/// Execute the merge subcommand.
pub fn run_merge(args: &MergeArgs, config: &EvaluatorConfig, out: &mut impl Write) -> Result<u8> {
    let inputs = Inputs::load(&args.input)?;
    let plan = Composer::new(&inputs.registry, &inputs.profiles)
        .compose(&args.profile)
        .with_context(|| format!("failed to compose profile {}", args.profile))?;

    let verdict = match &args.device {
        Some(path) => {
            let device = inputs.device(path)?;
            Some(Evaluator::new(&inputs.registry, &inputs.profiles, config.clone()).evaluate(&plan, &device))
        }
        None => None,
    };

    let policy = args.policy.unwrap_or(config.merge_policy);
    let outcome = BlockMerger::new(&inputs.registry, policy).merge_plan(&plan, verdict.as_ref());
    tracing::info!(
        profile = %args.profile,
        ?policy,
        conflicts = outcome.diagnostics.len(),
        rejected = outcome.rejected.len(),
        "merged"
    );

    let view = MergeView {
        block: Encoder::new(&inputs.registry).block(&outcome.block),
        diagnostics: &outcome.diagnostics,
        rejected: outcome.rejected.iter().map(|r| r.block.as_str()).collect(),
    };
    match args.format {
        OutputFormat::Json => write_json(out, &view)?,
        OutputFormat::Text => {
            write_json(out, &view.block)?;
            write_diagnostics(out, "", view.diagnostics)?;
            for block in &view.rejected {
                writeln!(out, "rejected: {block}")?;
            }
        }
    }

    Ok(if outcome.is_clean() { 0 } else { EXIT_UNSATISFIED })
}
