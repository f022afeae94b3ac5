//! # Device Snapshot
//!
//! The actual capabilities a target reports, in the same category shape as
//! a [`CapabilityBlock`](crate::CapabilityBlock). Queue families are the
//! unordered reported groups; video profiles are concrete instances.

use std::collections::BTreeMap;

use devcap_core::{ApiVersion, Fields, StructId};

use crate::block::StructValues;
use crate::video::{ActualVideoProfile, VideoProfileInstance};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceCapabilities {
    pub api_version: ApiVersion,
    /// Extension → reported spec version.
    pub extensions: BTreeMap<String, u32>,
    pub features: StructValues,
    pub properties: StructValues,
    pub formats: BTreeMap<String, StructValues>,
    pub queue_families: Vec<StructValues>,
    pub video_profiles: Vec<ActualVideoProfile>,
}

impl DeviceCapabilities {
    /// Whether the extension is reported at `min_version` or later.
    pub fn has_extension(&self, name: &str, min_version: u32) -> bool {
        self.extensions
            .get(name)
            .is_some_and(|&reported| reported >= min_version)
    }

    pub fn feature(&self, id: StructId) -> Option<&Fields> {
        self.features.get(&id)
    }

    pub fn property(&self, id: StructId) -> Option<&Fields> {
        self.properties.get(&id)
    }

    pub fn video_profile(&self, instance: &VideoProfileInstance) -> Option<&ActualVideoProfile> {
        self.video_profiles.iter().find(|p| &p.instance == instance)
    }
}
