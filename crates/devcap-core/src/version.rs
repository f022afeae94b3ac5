//! # API Versions
//!
//! `major.minor.patch` versions used for profile baselines, struct
//! provenance and the target's reported version. Patch is optional when
//! parsing and defaults to 0. The packed form is
//! `major << 22 | minor << 12 | patch`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A three-part API version, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decode the packed 32-bit form.
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            major: (packed >> 22) & 0x7f,
            minor: (packed >> 12) & 0x3ff,
            patch: packed & 0xfff,
        }
    }

    /// Encode to the packed 32-bit form. Components are masked to their
    /// field widths.
    pub const fn to_packed(self) -> u32 {
        ((self.major & 0x7f) << 22) | ((self.minor & 0x3ff) << 12) | (self.patch & 0xfff)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ApiVersion {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidVersion(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid());
        }
        let mut nums = [0u32; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ValueError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(v: ApiVersion) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_and_without_patch() {
        assert_eq!("1.3.204".parse::<ApiVersion>().unwrap(), ApiVersion::new(1, 3, 204));
        assert_eq!("1.2".parse::<ApiVersion>().unwrap(), ApiVersion::new(1, 2, 0));
        assert!("1".parse::<ApiVersion>().is_err());
        assert!("1.2.3.4".parse::<ApiVersion>().is_err());
        assert!("1.x".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(ApiVersion::new(1, 3, 0) > ApiVersion::new(1, 2, 250));
        assert!(ApiVersion::new(1, 3, 204) > ApiVersion::new(1, 3, 0));
    }

    #[test]
    fn packed_roundtrip() {
        let v = ApiVersion::new(1, 3, 204);
        assert_eq!(ApiVersion::from_packed(v.to_packed()), v);
        assert_eq!(ApiVersion::new(1, 0, 0).to_packed(), 1 << 22);
    }

    #[test]
    fn serde_as_string() {
        let v: ApiVersion = serde_json::from_str("\"1.1.0\"").unwrap();
        assert_eq!(v, ApiVersion::new(1, 1, 0));
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"1.1.0\"");
    }
}
