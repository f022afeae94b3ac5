//! # Diagnostics
//!
//! Every reason a verdict is what it is. Diagnostics carry a dotted member
//! path (`properties.VkPhysicalDeviceLimits.maxImageDimension2D`,
//! `queueFamilies[1].VkQueueFamilyProperties.queueFlags`), the declared and
//! reported values where they exist, and an optional note.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConflictError;
use crate::value::Value;

/// What a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Informational: an override the target does not back, an unmet optional.
    Warning,
    /// Two declarations could not be merged.
    Conflict,
    /// The target does not report the declared member, struct, extension or group.
    Missing,
    /// The target reports a value that does not satisfy the declaration.
    Unsatisfied,
    /// Every required queue family is individually satisfiable, but no
    /// assignment satisfies all of them simultaneously.
    Exhausted,
    /// The input exceeds a configured search bound and was rejected.
    BoundExceeded,
}

impl DiagnosticKind {
    /// Whether this kind makes the enclosing block unsatisfied.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Warning)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Conflict => "conflict",
            Self::Missing => "missing",
            Self::Unsatisfied => "unsatisfied",
            Self::Exhausted => "exhausted",
            Self::BoundExceeded => "bound_exceeded",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One explained finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self {
            path: path.into(),
            kind,
            declared: None,
            actual: None,
            note: None,
        }
    }

    /// The target does not report what was declared.
    pub fn missing(path: impl Into<String>, declared: Option<Value>) -> Self {
        Self {
            declared,
            ..Self::new(path, DiagnosticKind::Missing)
        }
    }

    /// The reported value does not satisfy the declared one.
    pub fn unsatisfied(path: impl Into<String>, declared: Value, actual: Value) -> Self {
        Self {
            declared: Some(declared),
            actual: Some(actual),
            ..Self::new(path, DiagnosticKind::Unsatisfied)
        }
    }

    pub fn warning(path: impl Into<String>, declared: Option<Value>, actual: Option<Value>) -> Self {
        Self {
            declared,
            actual,
            ..Self::new(path, DiagnosticKind::Warning)
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Downgrade a failure to a warning, keeping its note.
    pub fn into_warning(self) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            ..self
        }
    }

    pub fn is_failure(&self) -> bool {
        self.kind.is_failure()
    }
}

impl From<ConflictError> for Diagnostic {
    fn from(err: ConflictError) -> Self {
        Self {
            path: err.path,
            kind: DiagnosticKind::Conflict,
            declared: Some(err.first),
            actual: Some(err.second),
            note: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.path)?;
        if let Some(d) = &self.declared {
            write!(f, " declared={d}")?;
        }
        if let Some(a) = &self.actual {
            write!(f, " actual={a}")?;
        }
        if let Some(n) = &self.note {
            write!(f, " ({n})")?;
        }
        Ok(())
    }
}

/// Append a member name to a dotted path.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Append an index to a path.
pub fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_warnings_pass() {
        assert!(!DiagnosticKind::Warning.is_failure());
        for kind in [
            DiagnosticKind::Conflict,
            DiagnosticKind::Missing,
            DiagnosticKind::Unsatisfied,
            DiagnosticKind::Exhausted,
            DiagnosticKind::BoundExceeded,
        ] {
            assert!(kind.is_failure(), "{kind} should fail");
        }
    }

    #[test]
    fn display_includes_values() {
        let d = Diagnostic::unsatisfied("properties.F.alignment", Value::Uint(256), Value::Uint(512));
        assert_eq!(
            d.to_string(),
            "[unsatisfied] properties.F.alignment declared=256 actual=512"
        );
    }

    #[test]
    fn conflict_converts() {
        let d: Diagnostic = ConflictError {
            path: "x".into(),
            first: Value::Uint(1),
            second: Value::Uint(2),
        }
        .into();
        assert_eq!(d.kind, DiagnosticKind::Conflict);
        assert_eq!(d.declared, Some(Value::Uint(1)));
    }

    #[test]
    fn paths() {
        assert_eq!(child_path("", "features"), "features");
        assert_eq!(child_path("features", "F"), "features.F");
        assert_eq!(index_path("queueFamilies", 2), "queueFamilies[2]");
    }

    #[test]
    fn serde_skips_empty_fields() {
        let d = Diagnostic::missing("extensions.VK_KHR_x", None);
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("declared"));
        assert!(json.contains("\"missing\""));
    }
}
