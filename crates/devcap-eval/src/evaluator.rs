//! # Compliance Evaluator
//!
//! Evaluates a composed [`EvaluationPlan`] against a [`DeviceCapabilities`]
//! snapshot and returns a [`Verdict`].
//!
//! A block is satisfied iff every required extension is reported at or
//! above its declared spec version and every category passes: features,
//! properties and formats through the [`FieldWalker`], queue families
//! through [`queue::assign`], video profiles through the
//! [`VideoResolver`]. A slot of alternatives is satisfied iff one of them
//! is; the first satisfied alternative is selected, and every alternative's
//! diagnostics are kept so a caller can explain the ones that failed.
//!
//! The plan's baseline API version must be met and every slot satisfied.
//! Optional slots are evaluated too, their diagnostics downgraded to
//! warnings; they never affect `satisfied`.
//!
//! Compliance failures are never errors: only composing a plan can fail.

use serde::Serialize;

use devcap_core::diagnostic::child_path;
use devcap_core::{ApiVersion, Diagnostic, SchemaError, Value};
use devcap_profile::{Composer, DeviceCapabilities, EvaluationPlan, PlanSlot, PlannedBlock, ProfileSet};
use devcap_registry::Registry;

use crate::config::EvaluatorConfig;
use crate::queue;
use crate::video::VideoResolver;
use crate::walker::FieldWalker;

/// Outcome of evaluating one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockVerdict {
    /// Profile that contributed the block.
    pub profile: String,
    pub block: String,
    pub satisfied: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Accepted queue-family permutation, when the block declares queue
    /// families and an assignment exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_assignment: Option<Vec<usize>>,
}

impl BlockVerdict {
    pub fn label(&self) -> String {
        format!("{}/{}", self.profile, self.block)
    }
}

/// Outcome of evaluating one slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotVerdict {
    pub satisfied: bool,
    /// Index of the first satisfied alternative.
    pub selected: Option<usize>,
    /// One verdict per alternative, in declaration order. Single-block
    /// slots have exactly one.
    pub alternatives: Vec<BlockVerdict>,
}

impl SlotVerdict {
    pub fn selected_block(&self) -> Option<&BlockVerdict> {
        self.selected.and_then(|i| self.alternatives.get(i))
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.alternatives.iter().flat_map(|b| b.diagnostics.iter())
    }
}

/// The complete, explained result of evaluating a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    /// Label of the evaluated profile.
    pub profile: String,
    pub satisfied: bool,
    /// Baseline version the plan requires.
    pub api_version: ApiVersion,
    pub api_version_met: bool,
    pub slots: Vec<SlotVerdict>,
    pub optionals: Vec<SlotVerdict>,
    /// Plan-level diagnostics (the baseline version).
    pub diagnostics: Vec<Diagnostic>,
}

impl Verdict {
    /// Selected alternative per mandatory slot.
    pub fn selected_alternatives(&self) -> Vec<Option<usize>> {
        self.slots.iter().map(|s| s.selected).collect()
    }

    /// Every diagnostic: plan-level, then mandatory slots, then optionals.
    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .chain(self.slots.iter().flat_map(SlotVerdict::diagnostics))
            .chain(self.optionals.iter().flat_map(SlotVerdict::diagnostics))
    }

    /// Diagnostics that explain why the verdict is unsatisfied.
    ///
    /// Satisfied slots contribute nothing; a failed slot contributes every
    /// alternative's failures.
    pub fn failures(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .chain(
                self.slots
                    .iter()
                    .filter(|s| !s.satisfied)
                    .flat_map(SlotVerdict::diagnostics),
            )
            .filter(|d| d.is_failure())
            .collect()
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.all_diagnostics().filter(|d| !d.is_failure()).collect()
    }
}

/// Evaluates plans against device snapshots.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    registry: &'a Registry,
    profiles: &'a ProfileSet,
    config: EvaluatorConfig,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a Registry, profiles: &'a ProfileSet, config: EvaluatorConfig) -> Self {
        Self {
            registry,
            profiles,
            config,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Compose the profile labelled `label` and evaluate it.
    pub fn evaluate_profile(
        &self,
        label: &str,
        device: &DeviceCapabilities,
    ) -> Result<Verdict, SchemaError> {
        let plan = Composer::new(self.registry, self.profiles).compose(label)?;
        Ok(self.evaluate(&plan, device))
    }

    /// Evaluate a composed plan.
    pub fn evaluate(&self, plan: &EvaluationPlan, device: &DeviceCapabilities) -> Verdict {
        let api_version_met = device.api_version >= plan.api_version;
        let mut diagnostics = Vec::new();
        if !api_version_met {
            diagnostics.push(
                Diagnostic::unsatisfied(
                    "api_version",
                    Value::Str(plan.api_version.to_string()),
                    Value::Str(device.api_version.to_string()),
                )
                .with_note("baseline version not met"),
            );
        }

        let slots: Vec<SlotVerdict> = plan
            .slots
            .iter()
            .map(|slot| self.evaluate_slot(slot, device))
            .collect();
        let optionals: Vec<SlotVerdict> = if self.config.evaluate_optionals {
            plan.optionals
                .iter()
                .map(|slot| downgrade(self.evaluate_slot(slot, device)))
                .collect()
        } else {
            Vec::new()
        };

        let satisfied = api_version_met && slots.iter().all(|s| s.satisfied);
        tracing::info!(
            profile = %plan.root,
            satisfied,
            api_version_met,
            slots = slots.len(),
            failed_slots = slots.iter().filter(|s| !s.satisfied).count(),
            "profile evaluated"
        );
        Verdict {
            profile: plan.root.clone(),
            satisfied,
            api_version: plan.api_version,
            api_version_met,
            slots,
            optionals,
            diagnostics,
        }
    }

    /// Evaluate one slot; alternatives are an explicit OR.
    pub fn evaluate_slot(&self, slot: &PlanSlot, device: &DeviceCapabilities) -> SlotVerdict {
        let alternatives: Vec<BlockVerdict> = slot
            .blocks()
            .iter()
            .map(|planned| self.evaluate_block(planned, device))
            .collect();
        let selected = alternatives.iter().position(|b| b.satisfied);
        if let PlanSlot::AnyOf(_) = slot {
            tracing::debug!(
                alternatives = alternatives.len(),
                selected = ?selected.and_then(|i| alternatives.get(i)).map(BlockVerdict::label),
                "alternative slot evaluated"
            );
        }
        SlotVerdict {
            satisfied: selected.is_some(),
            selected,
            alternatives,
        }
    }

    /// Evaluate one block across every category.
    pub fn evaluate_block(&self, planned: &PlannedBlock, device: &DeviceCapabilities) -> BlockVerdict {
        let label = planned.label();
        let block = &planned.block;
        let walker = FieldWalker::new(self.registry);
        let mut diagnostics = Vec::new();

        let ext_path = child_path(&label, "extensions");
        for (name, &version) in &block.extensions {
            let at = child_path(&ext_path, name);
            match device.extensions.get(name) {
                None => diagnostics.push(Diagnostic::missing(at, Some(Value::Uint(u64::from(version))))),
                Some(&reported) if reported < version => diagnostics.push(
                    Diagnostic::unsatisfied(
                        at,
                        Value::Uint(u64::from(version)),
                        Value::Uint(u64::from(reported)),
                    )
                    .with_note("extension spec version too low"),
                ),
                Some(_) => {}
            }
        }

        diagnostics.extend(walker.compare(
            &child_path(&label, "features"),
            &block.features,
            &device.features,
        ));
        diagnostics.extend(walker.compare(
            &child_path(&label, "properties"),
            &block.properties,
            &device.properties,
        ));

        let fmt_path = child_path(&label, "formats");
        for (format, declared) in &block.formats {
            let at = child_path(&fmt_path, format);
            match device.formats.get(format) {
                Some(reported) => diagnostics.extend(walker.compare(&at, declared, reported)),
                None => diagnostics.push(Diagnostic::missing(at, None).with_note("format not reported")),
            }
        }

        let mut queue_assignment = None;
        if !block.queue_families.is_empty() {
            match queue::assign(
                &walker,
                &child_path(&label, "queueFamiliesProperties"),
                &block.queue_families,
                &device.queue_families,
                self.config.max_queue_family_search,
            ) {
                Ok(assignment) => queue_assignment = Some(assignment.permutation),
                Err(found) => diagnostics.extend(found),
            }
        }

        if !block.video_profiles.is_empty() {
            diagnostics.extend(VideoResolver::new(walker).check(
                &child_path(&label, "videoProfiles"),
                &block.video_profiles,
                &device.video_profiles,
            ));
        }

        let satisfied = !diagnostics.iter().any(Diagnostic::is_failure);
        tracing::debug!(block = %label, satisfied, diagnostics = diagnostics.len(), "block evaluated");
        BlockVerdict {
            profile: planned.profile.clone(),
            block: planned.name().to_string(),
            satisfied,
            diagnostics,
            queue_assignment,
        }
    }

    /// Evaluate `label`; when unsatisfied, try its fallbacks in order.
    ///
    /// Returns the first satisfied verdict, or the verdict of `label` when
    /// no fallback is satisfied either.
    pub fn evaluate_with_fallbacks(
        &self,
        label: &str,
        device: &DeviceCapabilities,
    ) -> Result<Verdict, SchemaError> {
        let composer = Composer::new(self.registry, self.profiles);
        let plan = composer.compose(label)?;
        let verdict = self.evaluate(&plan, device);
        if verdict.satisfied {
            return Ok(verdict);
        }
        for fallback in &plan.fallbacks {
            let candidate = self.evaluate(&composer.compose(fallback)?, device);
            if candidate.satisfied {
                tracing::info!(profile = %label, fallback = %fallback, "fallback profile satisfied");
                return Ok(candidate);
            }
        }
        Ok(verdict)
    }

    /// Evaluate independent plans on scoped worker threads.
    ///
    /// Verdicts are returned in plan order.
    pub fn evaluate_many(&self, plans: &[EvaluationPlan], device: &DeviceCapabilities) -> Vec<Verdict> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = plans
                .iter()
                .map(|plan| scope.spawn(move || self.evaluate(plan, device)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }
}

/// Optional slots report, they never fail.
fn downgrade(mut slot: SlotVerdict) -> SlotVerdict {
    for block in &mut slot.alternatives {
        block.diagnostics = std::mem::take(&mut block.diagnostics)
            .into_iter()
            .map(Diagnostic::into_warning)
            .collect();
    }
    slot
}
