//! # Error Hierarchy
//!
//! Structured error types for devcap, built with `thiserror`.
//!
//! - [`SchemaError`] is fatal and raised only while building a registry,
//!   decoding a document, or composing an evaluation plan. It never comes
//!   out of per-target evaluation.
//! - [`ConflictError`] is scoped to one member: two declarations that no
//!   single value implies.
//! - [`ValueError`] covers malformed literals (versions, limit types).
//!
//! Compliance failures are not errors. They are diagnostics inside a
//! verdict.

use thiserror::Error;

use crate::value::Value;

/// A registry or requirement document references something undefined, or
/// the document set is structurally invalid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A struct name resolves to nothing, even through aliases.
    #[error("unknown struct {name:?} at {path}")]
    UnknownStruct { name: String, path: String },

    /// A struct has no member with this name.
    #[error("struct {structure} has no member {member:?} (at {path})")]
    UnknownMember {
        structure: String,
        member: String,
        path: String,
    },

    /// Extension not defined by the registry.
    #[error("unknown extension {name:?} at {path}")]
    UnknownExtension { name: String, path: String },

    /// Format identifier not defined by the registry.
    #[error("unknown format {name:?} at {path}")]
    UnknownFormat { name: String, path: String },

    /// Flag name not defined in the member's flag set.
    #[error("unknown flag {flag:?} in {flag_set} at {path}")]
    UnknownFlag {
        flag: String,
        flag_set: String,
        path: String,
    },

    /// Enumerant not defined in the member's enumeration.
    #[error("unknown enumerant {value:?} in {enumeration} at {path}")]
    UnknownEnumerant {
        value: String,
        enumeration: String,
        path: String,
    },

    /// A member type names a flag set, enumeration or struct that does not exist.
    #[error("unknown type {name:?} referenced by {context}")]
    UnknownType { name: String, context: String },

    /// A profile label that is not in the document set.
    #[error("unknown profile {label:?}")]
    UnknownProfile { label: String },

    /// A profile slot names a capability block that is not defined.
    #[error("profile {profile} references undefined capability block {block:?}")]
    UnknownBlock { block: String, profile: String },

    /// `requiredProfiles` forms a cycle.
    #[error("required-profile cycle: {}", chain.join(" -> "))]
    ProfileCycle { chain: Vec<String> },

    /// A block uses a struct whose defining version/extension the plan does not require.
    #[error("block {block} uses {structure}, which requires {requirement}, but the plan does not require it")]
    ProvenanceNotRequired {
        block: String,
        structure: String,
        requirement: String,
    },

    /// A struct placed in a category it does not extend.
    #[error("struct {structure} cannot appear under {category}")]
    CategoryMismatch { structure: String, category: String },

    /// An alias that collides with, or points through, another name.
    #[error("invalid alias {alias:?}: {detail}")]
    InvalidAlias { alias: String, detail: String },

    /// The same name defined twice.
    #[error("duplicate {kind} {name:?}")]
    DuplicateDefinition { kind: String, name: String },

    /// A value in a document does not fit its member's declared type.
    #[error("invalid value at {path}: {detail}")]
    InvalidValue { path: String, detail: String },

    /// Structurally malformed document tree.
    #[error("invalid document at {path}: {detail}")]
    InvalidDocument { path: String, detail: String },
}

/// Two declarations of one member that cannot be merged.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("conflicting declarations at {path}: {first} vs {second}")]
pub struct ConflictError {
    /// Dotted member path.
    pub path: String,
    /// The value already accumulated.
    pub first: Value,
    /// The value that could not be folded in.
    pub second: Value,
}

/// Malformed literal values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Version string is not `major.minor[.patch]`.
    #[error("invalid version {0:?} (expected major.minor[.patch])")]
    InvalidVersion(String),

    /// Limit type string is malformed or combines incompatible parts.
    #[error("invalid limit type {input:?}: {reason}")]
    InvalidLimitType { input: String, reason: String },

    /// A member type string is malformed.
    #[error("invalid member type {0:?}")]
    InvalidType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display_carries_context() {
        let err = SchemaError::UnknownMember {
            structure: "VkPhysicalDeviceLimits".into(),
            member: "maxBogus".into(),
            path: "capabilities.base.properties".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("VkPhysicalDeviceLimits"));
        assert!(msg.contains("maxBogus"));
    }

    #[test]
    fn cycle_display_joins_chain() {
        let err = SchemaError::ProfileCycle {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "required-profile cycle: A -> B -> A");
    }

    #[test]
    fn conflict_display() {
        let err = ConflictError {
            path: "F.x".into(),
            first: Value::Uint(1),
            second: Value::Uint(2),
        };
        assert!(err.to_string().contains("F.x"));
    }

    #[test]
    fn value_error_display() {
        let err = ValueError::InvalidVersion("one".into());
        assert!(err.to_string().contains("major.minor"));
    }
}
