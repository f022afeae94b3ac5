//! # devcap-core: Foundational Types for devcap
//!
//! This crate is the leaf of the devcap workspace. It defines the value
//! model that every capability declaration and every target report is
//! decoded into, and the pure decision functions that give those values
//! their meaning.
//!
//! ## Key Design Principles
//!
//! 1. **One value model.** A declared limit and a reported limit are the
//!    same [`Value`] type. Comparison never depends on where a value came
//!    from, only on the field's [`LimitType`].
//!
//! 2. **Total algebra.** [`limits::compare`], [`limits::merge`] and
//!    [`limits::override_value`] are defined for every pair of values and
//!    every limit type. Type mismatches are answered (as "not satisfied" or
//!    as a merge conflict), never panicked on.
//!
//! 3. **Interned identifiers.** Struct names are resolved to a [`StructId`]
//!    exactly once, when the registry is built. Nothing downstream repeats
//!    alias lookups.
//!
//! 4. **Failures are data.** A failed comparison is a [`Diagnostic`], not an
//!    error. Only [`SchemaError`] aborts a call.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `devcap-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod diagnostic;
pub mod error;
pub mod id;
pub mod limits;
pub mod value;
pub mod version;

// Re-export primary types for ergonomic imports.
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{ConflictError, SchemaError, ValueError};
pub use id::StructId;
pub use limits::{LimitBase, LimitType, MergeConflict, Overridden};
pub use value::{Fields, Value};
pub use version::ApiVersion;
