//! Recording format version management

use serde::{Deserialize, Serialize};

/// Recording format version using semantic versioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

/// Current recording format version
pub const CURRENT_VERSION: FormatVersion = FormatVersion {
    major: 1,
    minor: 0,
    patch: 0,
};

impl FormatVersion {
    /// Whether a reader at this version can replay records written at `other`
    ///
    /// Only the major version is binding. Minor revisions add optional
    /// fields, so they are accepted in both directions.
    pub fn is_compatible_with(&self, other: &FormatVersion) -> bool {
        self.major == other.major
    }
}
