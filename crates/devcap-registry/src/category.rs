//! Capability categories and their chain roots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The category a struct is declared under inside a capability block.
///
/// Each category has a chain root in the registry (e.g. the features-2
/// struct for [`Category::Features`]); a struct may appear under a category
/// only if it is that root, extends it, or is a direct member type of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Features,
    Properties,
    Formats,
    QueueFamilies,
    VideoCapabilities,
    VideoFormats,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Properties => "properties",
            Self::Formats => "formats",
            Self::QueueFamilies => "queue_families",
            Self::VideoCapabilities => "video_capabilities",
            Self::VideoFormats => "video_formats",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
