//! # Capability-Set Composer
//!
//! Flattens a profile and everything it transitively requires into an
//! [`EvaluationPlan`]: an ordered sequence of mandatory slots, each either a
//! single block or a list of alternative blocks.
//!
//! ## Resolution order
//!
//! Required profiles are resolved depth-first, post-order, with duplicate
//! suppression: a profile required along two paths appears once, at its
//! first discovery. The plan concatenates each resolved profile's own slots
//! in that order, so the requesting profile's slots come last.
//!
//! A cycle in the requirement relation is a [`SchemaError::ProfileCycle`]
//! raised here, never a verdict.
//!
//! ## Validation
//!
//! Every struct a planned block references must be available under the
//! plan: its provenance is satisfied by the plan's API version, by an
//! extension of a mandatory single-block slot, or by one of the block's own
//! extensions. Every struct must also fit the category it is declared under.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use devcap_core::{ApiVersion, SchemaError};
use devcap_registry::Registry;

use crate::block::CapabilityBlock;
use crate::profile::{Profile, ProfileSet, Slot};

/// A block placed in a plan, with the profile that contributed it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBlock {
    pub profile: String,
    pub block: Arc<CapabilityBlock>,
}

impl PlannedBlock {
    pub fn name(&self) -> &str {
        &self.block.name
    }

    /// `profile/block`, for diagnostics.
    pub fn label(&self) -> String {
        format!("{}/{}", self.profile, self.block.name)
    }
}

/// One plan slot.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanSlot {
    Single(PlannedBlock),
    /// Logical OR. Never collapsed, even when alternatives are structurally
    /// equal across profiles.
    AnyOf(Vec<PlannedBlock>),
}

impl PlanSlot {
    pub fn blocks(&self) -> &[PlannedBlock] {
        match self {
            Self::Single(block) => std::slice::from_ref(block),
            Self::AnyOf(blocks) => blocks,
        }
    }
}

/// A flattened, validated profile.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationPlan {
    /// Label of the profile the plan was composed for.
    pub root: String,
    /// Resolved profiles, required ones first, the root last.
    pub profiles: Vec<String>,
    /// Highest API version among the resolved profiles.
    pub api_version: ApiVersion,
    pub slots: Vec<PlanSlot>,
    pub optionals: Vec<PlanSlot>,
    /// The root profile's fallbacks.
    pub fallbacks: Vec<String>,
}

impl EvaluationPlan {
    /// Extensions required by every satisfying target: those of mandatory
    /// single-block slots.
    pub fn mandatory_extensions(&self) -> BTreeSet<&str> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                PlanSlot::Single(planned) => Some(planned.block.extensions.keys()),
                PlanSlot::AnyOf(_) => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// The blocks of every mandatory single-block slot.
    pub fn mandatory_blocks(&self) -> impl Iterator<Item = &PlannedBlock> {
        self.slots.iter().filter_map(|slot| match slot {
            PlanSlot::Single(planned) => Some(planned),
            PlanSlot::AnyOf(_) => None,
        })
    }
}

/// Composes plans from a profile set.
#[derive(Debug, Clone, Copy)]
pub struct Composer<'a> {
    registry: &'a Registry,
    profiles: &'a ProfileSet,
}

impl<'a> Composer<'a> {
    pub fn new(registry: &'a Registry, profiles: &'a ProfileSet) -> Self {
        Self { registry, profiles }
    }

    /// Flatten and validate the profile labelled `label`.
    pub fn compose(&self, label: &str) -> Result<EvaluationPlan, SchemaError> {
        let order = self.resolution_order(label)?;

        let mut plan = EvaluationPlan {
            root: label.to_string(),
            profiles: order.iter().map(|p| p.label.clone()).collect(),
            api_version: order
                .iter()
                .map(|p| p.api_version)
                .max()
                .unwrap_or_default(),
            slots: Vec::new(),
            optionals: Vec::new(),
            fallbacks: Vec::new(),
        };
        for profile in &order {
            for slot in &profile.slots {
                plan.slots.push(self.plan_slot(profile, slot)?);
            }
            for slot in &profile.optionals {
                plan.optionals.push(self.plan_slot(profile, slot)?);
            }
        }
        if let Some(root) = order.last() {
            plan.fallbacks = root.fallbacks.clone();
        }

        self.validate(&plan)?;
        tracing::debug!(
            profile = %label,
            resolved = ?plan.profiles,
            slots = plan.slots.len(),
            api_version = %plan.api_version,
            "composed evaluation plan"
        );
        Ok(plan)
    }

    /// Post-order DFS over the requirement relation.
    fn resolution_order(&self, label: &str) -> Result<Vec<&'a Profile>, SchemaError> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        self.visit(label, &mut visited, &mut stack, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        label: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
        order: &mut Vec<&'a Profile>,
    ) -> Result<(), SchemaError> {
        if let Some(start) = stack.iter().position(|l| l == label) {
            let mut chain = stack[start..].to_vec();
            chain.push(label.to_string());
            return Err(SchemaError::ProfileCycle { chain });
        }
        if visited.contains(label) {
            tracing::trace!(profile = %label, "required profile already resolved");
            return Ok(());
        }
        let profile = self
            .profiles
            .profile(label)
            .ok_or_else(|| SchemaError::UnknownProfile {
                label: label.to_string(),
            })?;

        stack.push(label.to_string());
        for required in &profile.required {
            self.visit(required, visited, stack, order)?;
        }
        stack.pop();

        visited.insert(label.to_string());
        order.push(profile);
        Ok(())
    }

    fn plan_slot(&self, profile: &Profile, slot: &Slot) -> Result<PlanSlot, SchemaError> {
        let planned = |name: &String| {
            self.profiles
                .block(name)
                .map(|block| PlannedBlock {
                    profile: profile.label.clone(),
                    block: Arc::clone(block),
                })
                .ok_or_else(|| SchemaError::UnknownBlock {
                    block: name.clone(),
                    profile: profile.label.clone(),
                })
        };
        match slot {
            Slot::Single(name) => planned(name).map(PlanSlot::Single),
            Slot::AnyOf(names) => names
                .iter()
                .map(planned)
                .collect::<Result<Vec<_>, _>>()
                .map(PlanSlot::AnyOf),
        }
    }

    /// Check provenance and category fit of every referenced struct.
    pub fn validate(&self, plan: &EvaluationPlan) -> Result<(), SchemaError> {
        let mandatory = plan.mandatory_extensions();

        for planned in plan
            .slots
            .iter()
            .chain(&plan.optionals)
            .flat_map(PlanSlot::blocks)
        {
            let block = &planned.block;
            for (category, id) in block.struct_refs() {
                let spec = self.registry.spec(id).ok_or_else(|| SchemaError::UnknownStruct {
                    name: id.to_string(),
                    path: planned.label(),
                })?;
                if !self.registry.fits_category(id, category) {
                    return Err(SchemaError::CategoryMismatch {
                        structure: spec.name.clone(),
                        category: category.to_string(),
                    });
                }
                let available = spec.provenance.is_satisfied_by(plan.api_version, |ext| {
                    mandatory.contains(ext) || block.extensions.contains_key(ext)
                });
                if !available {
                    return Err(SchemaError::ProvenanceNotRequired {
                        block: planned.label(),
                        structure: spec.name.clone(),
                        requirement: spec.provenance.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::from_json(&json!({
            "structs": [
                { "name": "Features2", "members": [
                    { "name": "features", "type": "struct:Features" } ] },
                { "name": "Features", "members": [
                    { "name": "geometryShader", "type": "bool", "limit": "max" } ] },
                { "name": "TimelineFeatures", "extends": ["Features2"],
                  "provenance": { "version": "1.2", "extensions": ["VK_KHR_timeline_semaphore"] },
                  "members": [ { "name": "timelineSemaphore", "type": "bool", "limit": "max" } ] },
                { "name": "Props2", "members": [] },
                { "name": "DriverProps", "extends": ["Props2"], "members": [] }
            ],
            "extensions": { "VK_KHR_timeline_semaphore": 2 },
            "chain_roots": { "features": "Features2", "properties": "Props2" }
        }))
        .unwrap()
    }

    fn compose(doc: serde_json::Value, label: &str) -> Result<EvaluationPlan, SchemaError> {
        let reg = registry();
        let set = Decoder::new(&reg).profile_document(&doc).unwrap();
        Composer::new(&reg, &set).compose(label)
    }

    fn slot_names(plan: &EvaluationPlan) -> Vec<Vec<&str>> {
        plan.slots
            .iter()
            .map(|s| s.blocks().iter().map(PlannedBlock::name).collect())
            .collect()
    }

    #[test]
    fn required_slots_come_first() {
        let plan = compose(
            json!({
                "capabilities": { "S1": {}, "S2": {} },
                "profiles": {
                    "P":  { "api-version": "1.3", "profiles": ["P2"], "capabilities": ["S1"] },
                    "P2": { "api-version": "1.1", "capabilities": ["S2"] }
                }
            }),
            "P",
        )
        .unwrap();
        assert_eq!(slot_names(&plan), vec![vec!["S2"], vec!["S1"]]);
        assert_eq!(plan.profiles, vec!["P2", "P"]);
        assert_eq!(plan.api_version, ApiVersion::new(1, 3, 0));
        assert_eq!(plan.slots[0].blocks()[0].label(), "P2/S2");
    }

    #[test]
    fn diamond_requirement_resolved_once() {
        let plan = compose(
            json!({
                "capabilities": { "a": {}, "b": {}, "c": {}, "d": {} },
                "profiles": {
                    "A": { "api-version": "1.0", "profiles": ["B", "C"], "capabilities": ["a"] },
                    "B": { "api-version": "1.0", "profiles": ["D"], "capabilities": ["b"] },
                    "C": { "api-version": "1.0", "profiles": ["D"], "capabilities": ["c"] },
                    "D": { "api-version": "1.0", "capabilities": ["d"] }
                }
            }),
            "A",
        )
        .unwrap();
        assert_eq!(plan.profiles, vec!["D", "B", "C", "A"]);
        assert_eq!(plan.slots.len(), 4);
    }

    #[test]
    fn cycle_is_schema_error() {
        let err = compose(
            json!({
                "capabilities": { "x": {} },
                "profiles": {
                    "A": { "api-version": "1.0", "profiles": ["B"], "capabilities": ["x"] },
                    "B": { "api-version": "1.0", "profiles": ["A"], "capabilities": [] }
                }
            }),
            "A",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::ProfileCycle {
                chain: vec!["A".into(), "B".into(), "A".into()]
            }
        );
    }

    #[test]
    fn alternatives_are_kept_apart() {
        let plan = compose(
            json!({
                "capabilities": { "x": {}, "y": {} },
                "profiles": {
                    "P": { "api-version": "1.0", "capabilities": [["x", "y"], ["x", "x"]] }
                }
            }),
            "P",
        )
        .unwrap();
        assert_eq!(slot_names(&plan), vec![vec!["x", "y"], vec!["x", "x"]]);
    }

    #[test]
    fn provenance_satisfied_by_version_or_extension() {
        let doc = |version: &str, ext: serde_json::Value| {
            json!({
                "capabilities": {
                    "tl": { "extensions": ext, "features": { "TimelineFeatures": { "timelineSemaphore": true } } }
                },
                "profiles": { "P": { "api-version": version, "capabilities": ["tl"] } }
            })
        };
        assert!(compose(doc("1.2", json!({})), "P").is_ok());
        assert!(compose(doc("1.1", json!({ "VK_KHR_timeline_semaphore": 1 })), "P").is_ok());
        assert!(matches!(
            compose(doc("1.1", json!({})), "P"),
            Err(SchemaError::ProvenanceNotRequired { .. })
        ));
    }

    #[test]
    fn mandatory_extension_covers_alternative_blocks() {
        let plan = compose(
            json!({
                "capabilities": {
                    "ext": { "extensions": { "VK_KHR_timeline_semaphore": 1 } },
                    "alt": { "features": { "TimelineFeatures": { "timelineSemaphore": true } } }
                },
                "profiles": { "P": { "api-version": "1.0", "capabilities": ["ext", ["alt"]] } }
            }),
            "P",
        )
        .unwrap();
        assert_eq!(plan.mandatory_extensions().into_iter().collect::<Vec<_>>(), vec!["VK_KHR_timeline_semaphore"]);
    }

    #[test]
    fn category_mismatch_rejected() {
        let err = compose(
            json!({
                "capabilities": { "bad": { "features": { "DriverProps": {} } } },
                "profiles": { "P": { "api-version": "1.3", "capabilities": ["bad"] } }
            }),
            "P",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::CategoryMismatch { .. }), "{err}");
    }

    #[test]
    fn fallbacks_come_from_root_only() {
        let plan = compose(
            json!({
                "capabilities": { "x": {} },
                "profiles": {
                    "P": { "api-version": "1.0", "profiles": ["Q"], "capabilities": ["x"], "fallback": ["Q"] },
                    "Q": { "api-version": "1.0", "capabilities": [], "fallback": ["P"] }
                }
            }),
            "P",
        )
        .unwrap();
        assert_eq!(plan.fallbacks, vec!["Q"]);
    }

    #[test]
    fn unknown_root_profile() {
        let err = compose(json!({ "profiles": {} }), "P").unwrap_err();
        assert_eq!(err, SchemaError::UnknownProfile { label: "P".into() });
    }
}
