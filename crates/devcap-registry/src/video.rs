//! # Video Catalog
//!
//! Registry-supplied configuration for wildcard video-profile resolution:
//!
//! - **Axes**: the discrete dimensions of a video profile and the concrete
//!   values each can take. The cartesian product of all axes is the space
//!   of instances a simulation may synthesize.
//! - **Complete fields**: the capability members a declaration must specify
//!   to count as complete. Only complete declarations may synthesize support
//!   for an instance the target does not report.
//! - **Format categories**: usage classes of video formats, selected by a
//!   flag predicate on a usage member, each with post-merge fixups.

use serde::{Deserialize, Serialize};

use devcap_core::StructId;

/// One video-profile dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub name: String,
    /// Concrete values this dimension may take.
    #[serde(default)]
    pub values: Vec<String>,
}

/// A resolved `Struct.member` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    pub structure: StructId,
    pub member: String,
}

/// Post-merge consistency rule for a format category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fixup {
    /// Clear `bits` in the `field` capability flags when the category ends
    /// up with no formats at all.
    ClearFlagsWithoutFormats { field: FieldRef, bits: u64 },
}

/// A usage class of video formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCategory {
    pub name: String,
    /// Flags member holding a format's usage.
    pub usage: FieldRef,
    /// A format belongs to this category iff its usage contains all of these bits.
    pub required_usage: u64,
    pub fixups: Vec<Fixup>,
}

/// Resolved video configuration.
#[derive(Debug, Clone, Default)]
pub struct VideoCatalog {
    pub axes: Vec<AxisSpec>,
    pub complete_fields: Vec<FieldRef>,
    /// Member identifying a format within a category; same-key entries merge.
    pub format_key: Option<FieldRef>,
    pub format_categories: Vec<FormatCategory>,
}

impl VideoCatalog {
    pub fn axis(&self, name: &str) -> Option<&AxisSpec> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn category(&self, name: &str) -> Option<&FormatCategory> {
        self.format_categories.iter().find(|c| c.name == name)
    }
}

// ---------------------------------------------------------------------------
// Schema form
// ---------------------------------------------------------------------------

/// Fixup as written in the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixupDef {
    ClearFlagsWithoutFormats { field: String, flags: Vec<String> },
}

/// Format category as written in the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatCategoryDef {
    pub name: String,
    /// `Struct.member` of the usage flags.
    pub usage_field: String,
    /// Flag names that must all be present.
    #[serde(default)]
    pub required_usage: Vec<String>,
    #[serde(default)]
    pub fixups: Vec<FixupDef>,
}

/// Video configuration as written in the schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoDef {
    #[serde(default)]
    pub axes: Vec<AxisSpec>,
    /// `Struct.member` paths.
    #[serde(default)]
    pub complete_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_key: Option<String>,
    #[serde(default)]
    pub format_categories: Vec<FormatCategoryDef>,
}
