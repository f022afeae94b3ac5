//! # Capability Blocks
//!
//! A [`CapabilityBlock`] is a named bundle of declared values across the
//! five categories. Struct keys are interned [`StructId`]s, so a block
//! declared under an alias and one declared under the canonical name hold
//! the same key.

use std::collections::BTreeMap;

use devcap_core::{Fields, StructId};
use devcap_registry::Category;

use crate::video::VideoProfileDecl;

/// Struct → declared members, for one category (or one queue family, one
/// format, one video profile).
pub type StructValues = BTreeMap<StructId, Fields>;

/// A named bundle of declared capabilities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityBlock {
    pub name: String,
    /// Extension → minimum spec version.
    pub extensions: BTreeMap<String, u32>,
    pub features: StructValues,
    pub properties: StructValues,
    /// Format identifier → format property structs.
    pub formats: BTreeMap<String, StructValues>,
    /// Ordered required queue families.
    pub queue_families: Vec<StructValues>,
    pub video_profiles: Vec<VideoProfileDecl>,
}

impl CapabilityBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the block declares nothing at all.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
            && self.features.is_empty()
            && self.properties.is_empty()
            && self.formats.is_empty()
            && self.queue_families.is_empty()
            && self.video_profiles.is_empty()
    }

    /// Every struct the block references, with the category it appears under.
    pub fn struct_refs(&self) -> Vec<(Category, StructId)> {
        let mut refs = Vec::new();
        refs.extend(self.features.keys().map(|id| (Category::Features, *id)));
        refs.extend(self.properties.keys().map(|id| (Category::Properties, *id)));
        for values in self.formats.values() {
            refs.extend(values.keys().map(|id| (Category::Formats, *id)));
        }
        for family in &self.queue_families {
            refs.extend(family.keys().map(|id| (Category::QueueFamilies, *id)));
        }
        for decl in &self.video_profiles {
            refs.extend(
                decl.capabilities
                    .keys()
                    .map(|id| (Category::VideoCapabilities, *id)),
            );
            for format in &decl.formats {
                refs.extend(format.keys().map(|id| (Category::VideoFormats, *id)));
            }
        }
        refs.sort();
        refs.dedup();
        refs
    }
}
