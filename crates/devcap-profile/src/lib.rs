//! # devcap-profile: Requirement Documents and Composition
//!
//! Typed requirement documents decoded against a [`Registry`]:
//!
//! - **Capability blocks** ([`block`]): named bundles of declared values per
//!   category (features, properties, formats, queue families, video profiles).
//! - **Profiles** ([`profile`]): baseline version, required profiles, slots of
//!   single or alternative blocks, optionals and fallbacks.
//! - **Device snapshots** ([`device`]): what a target actually reports.
//! - **Decoding and encoding** ([`decode`], [`encode`]): generic document
//!   trees to typed values and back.
//! - **Composition** ([`composer`]): flattening a profile and everything it
//!   requires into a validated [`EvaluationPlan`].
//!
//! [`Registry`]: devcap_registry::Registry

pub mod block;
pub mod composer;
pub mod decode;
pub mod device;
pub mod encode;
pub mod profile;
pub mod video;

pub use block::{CapabilityBlock, StructValues};
pub use composer::{Composer, EvaluationPlan, PlanSlot, PlannedBlock};
pub use decode::Decoder;
pub use device::DeviceCapabilities;
pub use encode::Encoder;
pub use profile::{Profile, ProfileSet, Slot};
pub use video::{
    ActualVideoProfile, AxisValue, VideoProfileAxis, VideoProfileDecl, VideoProfileInstance,
};
