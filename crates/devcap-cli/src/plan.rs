//! # Plan Subcommand
//!
//! Composes a profile and prints the flattened plan: resolved profiles,
//! baseline version, slots and optionals. With `--blocks` the declared
//! contents of every planned block are included.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use devcap_core::ApiVersion;
use devcap_profile::{Composer, Encoder, EvaluationPlan, PlanSlot};
use serde::Serialize;
use serde_json::Value as Json;

use crate::input::{InputArgs, Inputs};
use crate::output::{write_json, OutputFormat};

/// Arguments for the plan subcommand.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Profile label to compose.
    pub profile: String,

    /// Include the declared contents of every planned block.
    #[arg(long)]
    pub blocks: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Serialized form of a plan. Slots list `profile/block` labels.
#[derive(Debug, Serialize)]
pub struct PlanView {
    pub root: String,
    pub profiles: Vec<String>,
    pub api_version: ApiVersion,
    pub slots: Vec<Vec<String>>,
    pub optionals: Vec<Vec<String>>,
    pub fallbacks: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, Json>,
}

impl PlanView {
    pub fn new(plan: &EvaluationPlan) -> Self {
        let labels = |slots: &[PlanSlot]| -> Vec<Vec<String>> {
            slots
                .iter()
                .map(|slot| slot.blocks().iter().map(|b| b.label()).collect())
                .collect()
        };
        Self {
            root: plan.root.clone(),
            profiles: plan.profiles.clone(),
            api_version: plan.api_version,
            slots: labels(&plan.slots),
            optionals: labels(&plan.optionals),
            fallbacks: plan.fallbacks.clone(),
            blocks: BTreeMap::new(),
        }
    }

    fn with_blocks(mut self, plan: &EvaluationPlan, encoder: Encoder<'_>) -> Self {
        for slot in plan.slots.iter().chain(&plan.optionals) {
            for planned in slot.blocks() {
                self.blocks
                    .entry(planned.name().to_string())
                    .or_insert_with(|| encoder.block(&planned.block));
            }
        }
        self
    }
}

/// Execute the plan subcommand.
pub fn run_plan(args: &PlanArgs, out: &mut impl Write) -> Result<u8> {
    let inputs = Inputs::load(&args.input)?;
    let plan = Composer::new(&inputs.registry, &inputs.profiles)
        .compose(&args.profile)
        .with_context(|| format!("failed to compose profile {}", args.profile))?;

    let mut view = PlanView::new(&plan);
    if args.blocks {
        view = view.with_blocks(&plan, Encoder::new(&inputs.registry));
    }

    match args.format {
        OutputFormat::Json => write_json(out, &view)?,
        OutputFormat::Text => write_text(out, &view)?,
    }
    Ok(0)
}

fn write_text(out: &mut impl Write, view: &PlanView) -> Result<()> {
    writeln!(out, "{} (api {})", view.root, view.api_version)?;
    writeln!(out, "  profiles: {}", view.profiles.join(", "))?;
    for (i, slot) in view.slots.iter().enumerate() {
        writeln!(out, "  slot {i}: {}", slot.join(" | "))?;
    }
    for (i, slot) in view.optionals.iter().enumerate() {
        writeln!(out, "  optional {i}: {}", slot.join(" | "))?;
    }
    if !view.fallbacks.is_empty() {
        writeln!(out, "  fallbacks: {}", view.fallbacks.join(", "))?;
    }
    for (name, body) in &view.blocks {
        writeln!(out, "  block {name}:")?;
        writeln!(out, "{}", serde_json::to_string_pretty(body)?)?;
    }
    Ok(())
}
