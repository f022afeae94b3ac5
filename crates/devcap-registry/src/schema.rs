//! # Registry Schema
//!
//! The serde form of a registry as produced by schema ingestion. It is
//! validated and interned by [`Registry::from_schema`](crate::Registry::from_schema).
//!
//! ```json
//! {
//!   "structs": [
//!     { "name": "VkPhysicalDeviceLimits",
//!       "provenance": { "version": "1.0" },
//!       "members": [ { "name": "maxImageDimension2D", "type": "uint", "limit": "max" } ] }
//!   ],
//!   "aliases": { "VkPhysicalDeviceFoo2KHR": "VkPhysicalDeviceFoo2" },
//!   "flag_sets": { "VkQueueFlags": { "VK_QUEUE_GRAPHICS_BIT": 1 } },
//!   "enums": { "VkDriverId": [ "VK_DRIVER_ID_MESA_RADV" ] },
//!   "formats": [ "VK_FORMAT_R8G8B8A8_UNORM" ],
//!   "extensions": { "VK_KHR_swapchain": 70 },
//!   "chain_roots": { "features": "VkPhysicalDeviceFeatures2" },
//!   "video": { "axes": [], "complete_fields": [], "format_categories": [] }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::spec::{FieldSpec, Provenance};
use crate::video::VideoDef;

/// A struct as declared in the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub members: Vec<FieldSpec>,
    #[serde(default)]
    pub provenance: Provenance,
    /// Chain roots this struct extends, by name (aliases accepted).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
}

/// Full registry schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySchema {
    #[serde(default)]
    pub structs: Vec<StructDef>,
    /// Alias → canonical struct name. Every target must be canonical.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Flag set → flag name → bit value.
    #[serde(default)]
    pub flag_sets: BTreeMap<String, BTreeMap<String, u64>>,
    /// Enumeration → enumerant names.
    #[serde(default)]
    pub enums: BTreeMap<String, Vec<String>>,
    /// Format identifiers usable as keys of a block's `formats` category.
    #[serde(default)]
    pub formats: Vec<String>,
    /// Extension → latest spec version.
    #[serde(default)]
    pub extensions: BTreeMap<String, u32>,
    /// Category → chain-root struct name.
    #[serde(default)]
    pub chain_roots: BTreeMap<Category, String>,
    #[serde(default)]
    pub video: VideoDef,
}
