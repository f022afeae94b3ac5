//! Output formatting shared by the subcommands.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use devcap_core::Diagnostic;
use devcap_eval::{SlotVerdict, Verdict};
use serde::Serialize;

/// How results are printed.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

pub fn write_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_diagnostics<'d>(
    out: &mut impl Write,
    indent: &str,
    diagnostics: impl IntoIterator<Item = &'d Diagnostic>,
) -> Result<()> {
    for diagnostic in diagnostics {
        writeln!(out, "{indent}{diagnostic}")?;
    }
    Ok(())
}

/// Print a verdict as text. Failures are always listed; warnings only when
/// `warnings` is set.
pub fn write_verdict(out: &mut impl Write, verdict: &Verdict, warnings: bool) -> Result<()> {
    let status = if verdict.satisfied { "satisfied" } else { "NOT satisfied" };
    writeln!(out, "{}: {status} (api {})", verdict.profile, verdict.api_version)?;
    write_diagnostics(out, "  ", &verdict.diagnostics)?;
    for (i, slot) in verdict.slots.iter().enumerate() {
        write_slot(out, &format!("slot {i}"), slot)?;
        if !slot.satisfied {
            write_diagnostics(out, "    ", slot.diagnostics().filter(|d| d.is_failure()))?;
        }
    }
    if warnings {
        for (i, slot) in verdict.optionals.iter().enumerate() {
            write_slot(out, &format!("optional {i}"), slot)?;
        }
        write_diagnostics(out, "    ", verdict.warnings())?;
    }
    Ok(())
}

fn write_slot(out: &mut impl Write, name: &str, slot: &SlotVerdict) -> Result<()> {
    match slot.selected_block() {
        Some(block) => writeln!(out, "  {name}: {} ok", block.label())?,
        None => {
            let labels: Vec<String> = slot.alternatives.iter().map(|b| b.label()).collect();
            writeln!(out, "  {name}: {} failed", labels.join(" | "))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcap_core::{ApiVersion, DiagnosticKind};
    use devcap_eval::BlockVerdict;

    fn verdict() -> Verdict {
        let failing = BlockVerdict {
            profile: "P".into(),
            block: "b".into(),
            satisfied: false,
            diagnostics: vec![Diagnostic::new("P/b.extensions.VK_X", DiagnosticKind::Missing)],
            queue_assignment: None,
        };
        Verdict {
            profile: "P".into(),
            satisfied: false,
            api_version: ApiVersion::new(1, 2, 0),
            api_version_met: true,
            slots: vec![SlotVerdict {
                satisfied: false,
                selected: None,
                alternatives: vec![failing],
            }],
            optionals: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn text_lists_failures_under_their_slot() {
        let mut out = Vec::new();
        write_verdict(&mut out, &verdict(), false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "P: NOT satisfied (api 1.2.0)\n  slot 0: P/b failed\n    [missing] P/b.extensions.VK_X\n"
        );
    }

    #[test]
    fn json_is_newline_terminated() {
        let mut out = Vec::new();
        write_json(&mut out, &verdict()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("}\n"));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["satisfied"], false);
    }
}
