//! Interned struct identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a canonical struct, assigned once at registry load.
///
/// Every alias resolves to the id of its canonical struct, so two
/// declarations made under historically different names land on the same
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructId(u32);

impl StructId {
    /// Wrap a registry index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position in the registry's struct table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "struct#{}", self.0)
    }
}
