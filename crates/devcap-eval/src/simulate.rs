//! # Simulator
//!
//! The override direction: lays a plan's requirements over a reported
//! device so the result reports at least what the plan declares. Every
//! substitution the real target does not back is surfaced as a warning and
//! never blocks the override.
//!
//! - The baseline version and extension spec versions are raised.
//! - Features, properties and formats take the declared values, except for
//!   members the registry marks as not modifiable.
//! - Queue families are replaced by the carry-over assignment when one
//!   exists.
//! - Video profiles: reported instances take the resolved declarations.
//!   Instances the target does not report are synthesized only from a
//!   complete declaration, and only when the configuration allows it.

use devcap_core::diagnostic::child_path;
use devcap_core::{Diagnostic, Value};
use devcap_profile::{
    ActualVideoProfile, CapabilityBlock, DeviceCapabilities, EvaluationPlan, StructValues,
    VideoProfileInstance,
};
use devcap_registry::Registry;

use crate::config::EvaluatorConfig;
use crate::evaluator::Verdict;
use crate::merge::BlockMerger;
use crate::queue;
use crate::video::{Resolution, VideoResolver};
use crate::walker::FieldWalker;

/// A simulated device and everything worth telling about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub device: DeviceCapabilities,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct Simulator<'r> {
    registry: &'r Registry,
    config: EvaluatorConfig,
}

impl<'r> Simulator<'r> {
    pub fn new(registry: &'r Registry, config: EvaluatorConfig) -> Self {
        Self { registry, config }
    }

    /// Simulate `plan` on top of `device`.
    ///
    /// Slots of alternatives contribute the alternative `verdict` selected,
    /// or their first alternative without one.
    pub fn simulate(
        &self,
        plan: &EvaluationPlan,
        device: &DeviceCapabilities,
        verdict: Option<&Verdict>,
    ) -> Simulation {
        let merged = BlockMerger::new(self.registry, self.config.merge_policy).merge_plan(plan, verdict);
        let mut diagnostics = merged.diagnostics;
        let block = merged.block;
        let mut out = device.clone();

        if out.api_version < plan.api_version {
            diagnostics.push(
                Diagnostic::warning(
                    "api_version",
                    Some(Value::Str(plan.api_version.to_string())),
                    Some(Value::Str(out.api_version.to_string())),
                )
                .with_note("baseline version raised"),
            );
            out.api_version = plan.api_version;
        }

        self.extensions(&block, &mut out, &mut diagnostics);
        self.structs(&block, &mut out, &mut diagnostics);
        self.queue_families(&block, &mut out, &mut diagnostics);
        self.video_profiles(&block, device, &mut out, &mut diagnostics);

        tracing::info!(
            profile = %plan.root,
            warnings = diagnostics.len(),
            video_profiles = out.video_profiles.len(),
            "simulated device"
        );
        Simulation {
            device: out,
            diagnostics,
        }
    }

    fn extensions(&self, block: &CapabilityBlock, out: &mut DeviceCapabilities, diagnostics: &mut Vec<Diagnostic>) {
        for (name, &version) in &block.extensions {
            let reported = out.extensions.get(name).copied();
            if reported.is_some_and(|v| v >= version) {
                continue;
            }
            diagnostics.push(
                Diagnostic::warning(
                    child_path("extensions", name),
                    Some(Value::Uint(u64::from(version))),
                    reported.map(|v| Value::Uint(u64::from(v))),
                )
                .with_note("extension not backed by the target"),
            );
            out.extensions.insert(name.clone(), version);
        }
    }

    fn structs(&self, block: &CapabilityBlock, out: &mut DeviceCapabilities, diagnostics: &mut Vec<Diagnostic>) {
        let walker = FieldWalker::new(self.registry);

        let (features, found) = walker.override_values("features", &out.features, &block.features);
        out.features = features;
        diagnostics.extend(found);

        let (properties, found) = walker.override_values("properties", &out.properties, &block.properties);
        out.properties = properties;
        diagnostics.extend(found);

        for (format, declared) in &block.formats {
            let reported = out.formats.get(format).cloned().unwrap_or_default();
            let (values, found) =
                walker.override_values(&child_path("formats", format), &reported, declared);
            out.formats.insert(format.clone(), values);
            diagnostics.extend(found);
        }
    }

    fn queue_families(&self, block: &CapabilityBlock, out: &mut DeviceCapabilities, diagnostics: &mut Vec<Diagnostic>) {
        if block.queue_families.is_empty() {
            return;
        }
        let walker = FieldWalker::new(self.registry);
        match queue::assign(
            &walker,
            "queueFamiliesProperties",
            &block.queue_families,
            &out.queue_families,
            self.config.max_queue_family_search,
        ) {
            Ok(assignment) => out.queue_families = assignment.families,
            Err(found) => diagnostics.extend(
                found
                    .into_iter()
                    .map(|d| d.into_warning().with_note("queue families left as reported")),
            ),
        }
    }

    fn video_profiles(
        &self,
        block: &CapabilityBlock,
        device: &DeviceCapabilities,
        out: &mut DeviceCapabilities,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if block.video_profiles.is_empty() {
            return;
        }
        let walker = FieldWalker::new(self.registry);
        let resolver = VideoResolver::new(walker);
        let candidates: Vec<VideoProfileInstance> = if self.config.synthesize_video_profiles {
            resolver.candidate_instances(&device.video_profiles)
        } else {
            device.video_profiles.iter().map(|p| p.instance.clone()).collect()
        };

        for instance in candidates {
            let at = format!("videoProfiles{instance}");
            let resolution = resolver.resolve(&at, &instance, &block.video_profiles);
            if !resolution.is_selected() {
                continue;
            }
            if !resolution.conflicts.is_empty() {
                tracing::debug!(instance = %instance, "conflicting video declarations; leaving the profile alone");
                diagnostics.extend(resolution.conflicts.iter().cloned().map(|c| {
                    Diagnostic::from(c).with_note("video profile neither overridden nor synthesized")
                }));
                continue;
            }

            if let Some(reported) = out.video_profiles.iter_mut().find(|p| p.instance == instance) {
                let (capabilities, found) = walker.override_values(
                    &child_path(&at, "capabilities"),
                    &reported.capabilities,
                    &resolution.capabilities,
                );
                reported.capabilities = capabilities;
                diagnostics.extend(found);
                reported.formats = overlay_formats(&resolver, &reported.formats, &resolution);
            } else if resolution.complete {
                diagnostics.push(
                    Diagnostic::warning(at, None, None)
                        .with_note("video profile not reported; synthesized from a complete declaration"),
                );
                out.video_profiles.push(ActualVideoProfile {
                    instance,
                    formats: resolution.all_formats(),
                    capabilities: resolution.capabilities,
                });
            } else {
                tracing::debug!(instance = %instance, "only partial declarations; not synthesizing");
                diagnostics.push(
                    Diagnostic::warning(at, None, None)
                        .with_note("video profile not reported and only partially declared; not synthesized"),
                );
            }
        }
    }
}

/// Reported formats with the declared ones laid over them by format key;
/// declared formats the target does not report are appended.
fn overlay_formats(
    resolver: &VideoResolver<'_>,
    reported: &[StructValues],
    resolution: &Resolution,
) -> Vec<StructValues> {
    let mut out = reported.to_vec();
    for declared in resolution.all_formats() {
        let key = resolver.format_key(&declared);
        let existing = key
            .as_ref()
            .and_then(|k| out.iter_mut().find(|f| resolver.format_key(f).as_ref() == Some(k)));
        match existing {
            Some(entry) => *entry = crate::walker::overlay(entry, &declared),
            None => out.push(declared),
        }
    }
    out
}
