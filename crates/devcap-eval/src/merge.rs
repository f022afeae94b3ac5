//! # Block Merger
//!
//! Folds the blocks a plan settles on into one capability block: extensions
//! union at the highest spec version, struct values merge per member under
//! the limit-type merge, formats merge per format, queue families and video
//! declarations concatenate.
//!
//! A member two blocks cannot agree on is handled by [`MergePolicy`]:
//! `Lenient` drops the member and records a conflict diagnostic, `Strict`
//! rolls back everything the offending block contributed. A dropped member
//! stays dropped: later blocks declaring it again do not bring it back.

use std::collections::{BTreeMap, BTreeSet};

use devcap_core::diagnostic::child_path;
use devcap_core::{ConflictError, Diagnostic};
use devcap_profile::{CapabilityBlock, EvaluationPlan, PlanSlot, PlannedBlock};
use devcap_registry::Registry;

use crate::config::MergePolicy;
use crate::evaluator::Verdict;
use crate::walker::FieldWalker;

/// A block whose contribution was rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedBlock {
    pub block: String,
    pub conflicts: Vec<ConflictError>,
}

/// Result of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub block: CapabilityBlock,
    /// One conflict diagnostic per member that could not be merged.
    pub diagnostics: Vec<Diagnostic>,
    /// Blocks rolled back under [`MergePolicy::Strict`].
    pub rejected: Vec<RejectedBlock>,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlockMerger<'r> {
    walker: FieldWalker<'r>,
    policy: MergePolicy,
}

impl<'r> BlockMerger<'r> {
    pub fn new(registry: &'r Registry, policy: MergePolicy) -> Self {
        Self {
            walker: FieldWalker::new(registry),
            policy,
        }
    }

    /// Merge `blocks` in order into a block named `name`.
    pub fn merge_blocks<'b>(
        &self,
        name: &str,
        blocks: impl IntoIterator<Item = &'b CapabilityBlock>,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            block: CapabilityBlock::new(name),
            diagnostics: Vec::new(),
            rejected: Vec::new(),
        };
        let mut dropped = Dropped::default();
        for incoming in blocks {
            let (merged, conflicts, now_dropped) = self.merge_pair(&outcome.block, incoming, &dropped);
            if conflicts.is_empty() {
                outcome.block = merged;
                continue;
            }
            match self.policy {
                MergePolicy::Lenient => {
                    tracing::debug!(block = %incoming.name, conflicts = conflicts.len(), "dropping conflicting members");
                    outcome.block = merged;
                    dropped = now_dropped;
                    outcome.diagnostics.extend(
                        conflicts
                            .into_iter()
                            .map(|c| Diagnostic::from(c).with_note("member dropped from the merge")),
                    );
                }
                MergePolicy::Strict => {
                    tracing::warn!(block = %incoming.name, conflicts = conflicts.len(), "rolling back conflicting block");
                    outcome.diagnostics.extend(conflicts.iter().cloned().map(|c| {
                        Diagnostic::from(c).with_note(format!("block {} rolled back", incoming.name))
                    }));
                    outcome.rejected.push(RejectedBlock {
                        block: incoming.name.clone(),
                        conflicts,
                    });
                }
            }
        }
        outcome
    }

    /// Merge the blocks a plan settles on, see [`chosen_blocks`].
    pub fn merge_plan(&self, plan: &EvaluationPlan, verdict: Option<&Verdict>) -> MergeOutcome {
        self.merge_blocks(
            &plan.root,
            chosen_blocks(plan, verdict).into_iter().map(|p| p.block.as_ref()),
        )
    }

    fn merge_pair(
        &self,
        acc: &CapabilityBlock,
        incoming: &CapabilityBlock,
        dropped: &Dropped,
    ) -> (CapabilityBlock, Vec<ConflictError>, Dropped) {
        let mut out = acc.clone();
        let mut conflicts = Vec::new();
        let mut now_dropped = Dropped::default();

        for (ext, &version) in &incoming.extensions {
            let slot = out.extensions.entry(ext.clone()).or_insert(version);
            *slot = (*slot).max(version);
        }

        let features = self.walker.merge_excluding(
            &child_path(&incoming.name, "features"),
            &acc.features,
            &incoming.features,
            &dropped.features,
        );
        out.features = features.values;
        conflicts.extend(features.conflicts);
        now_dropped.features = features.dropped;

        let properties = self.walker.merge_excluding(
            &child_path(&incoming.name, "properties"),
            &acc.properties,
            &incoming.properties,
            &dropped.properties,
        );
        out.properties = properties.values;
        conflicts.extend(properties.conflicts);
        now_dropped.properties = properties.dropped;

        now_dropped.formats = dropped.formats.clone();
        let formats_path = child_path(&incoming.name, "formats");
        for (format, values) in &incoming.formats {
            let base = acc.formats.get(format).cloned().unwrap_or_default();
            let excluded = dropped.formats.get(format).cloned().unwrap_or_default();
            let merged = self.walker.merge_excluding(
                &child_path(&formats_path, format),
                &base,
                values,
                &excluded,
            );
            out.formats.insert(format.clone(), merged.values);
            conflicts.extend(merged.conflicts);
            now_dropped.formats.insert(format.clone(), merged.dropped);
        }

        out.queue_families.extend(incoming.queue_families.iter().cloned());
        out.video_profiles.extend(incoming.video_profiles.iter().cloned());
        (out, conflicts, now_dropped)
    }
}

/// Members a lenient merge has dropped so far, per category. Keys are
/// relative to the category, see [`crate::Merged::dropped`].
#[derive(Debug, Clone, Default)]
struct Dropped {
    features: BTreeSet<String>,
    properties: BTreeSet<String>,
    formats: BTreeMap<String, BTreeSet<String>>,
}

/// The blocks a plan settles on: every single-block slot, plus for each
/// slot of alternatives the one the verdict selected (the first when there
/// is no verdict or nothing was selected).
pub fn chosen_blocks<'p>(plan: &'p EvaluationPlan, verdict: Option<&Verdict>) -> Vec<&'p PlannedBlock> {
    plan.slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| match slot {
            PlanSlot::Single(planned) => Some(planned),
            PlanSlot::AnyOf(alternatives) => {
                let pick = verdict
                    .and_then(|v| v.slots.get(i))
                    .and_then(|s| s.selected)
                    .unwrap_or(0);
                alternatives.get(pick)
            }
        })
        .collect()
}
