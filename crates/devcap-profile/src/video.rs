//! # Video Profiles
//!
//! Declarations apply to classes of runtime instances: each dimension of a
//! [`VideoProfileAxis`] is either a concrete value or a wildcard. Device
//! snapshots report concrete [`VideoProfileInstance`]s.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block::StructValues;

/// One axis coordinate of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisValue {
    /// Matches any concrete value.
    Any,
    Is(String),
}

impl AxisValue {
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Is(want) => value == Some(want.as_str()),
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Is(v) => f.write_str(v),
        }
    }
}

/// A concrete video profile reported by a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VideoProfileInstance {
    pub dims: BTreeMap<String, String>,
}

impl VideoProfileInstance {
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.dims.get(axis).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VideoProfileInstance {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            dims: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl fmt::Display for VideoProfileInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.dims.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Axis constraints of a declaration. Dimensions not listed are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProfileAxis {
    pub dims: BTreeMap<String, AxisValue>,
}

impl VideoProfileAxis {
    pub fn get(&self, axis: &str) -> &AxisValue {
        self.dims.get(axis).unwrap_or(&AxisValue::Any)
    }

    /// An instance matches iff every constrained dimension equals the
    /// instance's coordinate on that dimension.
    pub fn matches(&self, instance: &VideoProfileInstance) -> bool {
        self.dims
            .iter()
            .all(|(axis, want)| want.matches(instance.get(axis)))
    }
}

impl fmt::Display for VideoProfileAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.dims.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A declared `{axis, capabilities, formats[]}` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoProfileDecl {
    pub axis: VideoProfileAxis,
    pub capabilities: StructValues,
    pub formats: Vec<StructValues>,
}

/// A reported video profile with its capabilities and supported formats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActualVideoProfile {
    pub instance: VideoProfileInstance,
    pub capabilities: StructValues,
    pub formats: Vec<StructValues>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(dims: &[(&str, &str)]) -> VideoProfileAxis {
        VideoProfileAxis {
            dims: dims
                .iter()
                .map(|(k, v)| {
                    let value = if *v == "*" {
                        AxisValue::Any
                    } else {
                        AxisValue::Is((*v).to_string())
                    };
                    ((*k).to_string(), value)
                })
                .collect(),
        }
    }

    fn instance(s: &str, l: &str, c: &str) -> VideoProfileInstance {
        [
            ("chromaSubsampling", s),
            ("lumaBitDepth", l),
            ("chromaBitDepth", c),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn wildcard_dimension_matches_any_value() {
        let decl = axis(&[
            ("chromaSubsampling", "4:2:0"),
            ("lumaBitDepth", "8"),
            ("chromaBitDepth", "*"),
        ]);
        assert!(decl.matches(&instance("4:2:0", "8", "8")));
        assert!(decl.matches(&instance("4:2:0", "8", "10")));
        assert!(!decl.matches(&instance("4:2:0", "10", "10")));
    }

    #[test]
    fn constrained_dimension_excludes_other_values() {
        let decl = axis(&[("chromaSubsampling", "4:4:4")]);
        assert!(!decl.matches(&instance("4:2:0", "8", "8")));
        assert!(decl.matches(&instance("4:4:4", "10", "8")));
    }

    #[test]
    fn constrained_dimension_absent_from_instance_does_not_match() {
        let decl = axis(&[("codecOperation", "decode_h264")]);
        assert!(!decl.matches(&instance("4:2:0", "8", "8")));
    }

    #[test]
    fn wildcard_axis_displays_as_star() {
        assert_eq!(axis(&[("lumaBitDepth", "*")]).to_string(), "{lumaBitDepth=*}");
    }
}
