//! # devcap-registry: Capability Registry
//!
//! The registry is the typed, alias-resolved model of a capability API:
//! which structs exist, which members they carry, how each member compares
//! (its [`LimitType`](devcap_core::LimitType)), which API version or
//! extension defines each struct, and which chain root each struct extends.
//!
//! ## Loading
//!
//! A [`RegistrySchema`] is the serde form handed over by the schema
//! ingestion stage. [`Registry::from_schema`] validates it once and interns
//! every canonical name and alias into a [`StructId`](devcap_core::StructId).
//! The resulting [`Registry`] is immutable, `Send + Sync`, and passed down
//! explicitly; there is no process-wide registry.
//!
//! ## Video configuration
//!
//! Which video-capability members make a wildcard declaration "complete",
//! how video formats are classified into usage categories, and which
//! post-merge fixups apply per category are registry data
//! ([`VideoCatalog`]), not hard-coded rules.

pub mod category;
pub mod registry;
pub mod schema;
pub mod spec;
pub mod video;

// Re-export primary types.
pub use category::Category;
pub use registry::Registry;
pub use schema::{RegistrySchema, StructDef};
pub use spec::{ArraySpec, FieldSpec, Provenance, StructSpec, ValueType};
pub use video::{AxisSpec, FieldRef, Fixup, FormatCategory, VideoCatalog};
