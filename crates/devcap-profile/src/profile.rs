//! # Profiles
//!
//! A [`Profile`] is a requirement document: a baseline API version, the
//! profiles it requires, and an ordered list of slots. Each slot names one
//! block or a list of alternative blocks (logical OR).
//!
//! A [`ProfileSet`] owns every block and profile loaded for one invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use devcap_core::{ApiVersion, SchemaError};

use crate::block::CapabilityBlock;

/// One requirement slot, by block name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slot {
    Single(String),
    AnyOf(Vec<String>),
}

impl Slot {
    pub fn block_names(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::AnyOf(names) => names,
        }
    }
}

/// A requirement document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub label: String,
    #[serde(default)]
    pub version: u32,
    pub api_version: ApiVersion,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Labels of profiles this one requires.
    #[serde(default)]
    pub required: Vec<String>,
    pub slots: Vec<Slot>,
    /// Reported when unmet, never affecting satisfaction.
    #[serde(default)]
    pub optionals: Vec<Slot>,
    /// Labels to try, in order, when this profile is not satisfied.
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

/// Every block and profile of one invocation.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    blocks: BTreeMap<String, Arc<CapabilityBlock>>,
    profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_block(&mut self, block: CapabilityBlock) -> Result<(), SchemaError> {
        if self.blocks.contains_key(&block.name) {
            return Err(SchemaError::DuplicateDefinition {
                kind: "capability block".into(),
                name: block.name,
            });
        }
        self.blocks.insert(block.name.clone(), Arc::new(block));
        Ok(())
    }

    pub fn insert_profile(&mut self, profile: Profile) -> Result<(), SchemaError> {
        if self.profiles.contains_key(&profile.label) {
            return Err(SchemaError::DuplicateDefinition {
                kind: "profile".into(),
                name: profile.label,
            });
        }
        self.profiles.insert(profile.label.clone(), profile);
        Ok(())
    }

    /// Fold another set into this one. Names must not collide.
    pub fn extend(&mut self, other: ProfileSet) -> Result<(), SchemaError> {
        for (_, block) in other.blocks {
            self.insert_block(Arc::try_unwrap(block).unwrap_or_else(|shared| (*shared).clone()))?;
        }
        for (_, profile) in other.profiles {
            self.insert_profile(profile)?;
        }
        Ok(())
    }

    /// Check that every slot, optional, requirement and fallback names
    /// something this set defines.
    pub fn check_references(&self) -> Result<(), SchemaError> {
        for profile in self.profiles.values() {
            for name in profile
                .slots
                .iter()
                .chain(&profile.optionals)
                .flat_map(Slot::block_names)
            {
                if !self.blocks.contains_key(name) {
                    return Err(SchemaError::UnknownBlock {
                        block: name.clone(),
                        profile: profile.label.clone(),
                    });
                }
            }
            for label in profile.required.iter().chain(&profile.fallbacks) {
                if !self.profiles.contains_key(label) {
                    return Err(SchemaError::UnknownProfile {
                        label: label.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn block(&self, name: &str) -> Option<&Arc<CapabilityBlock>> {
        self.blocks.get(name)
    }

    pub fn profile(&self, label: &str) -> Option<&Profile> {
        self.profiles.get(label)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Arc<CapabilityBlock>> {
        self.blocks.values()
    }
}
