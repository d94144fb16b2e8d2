//! Type definition versioning
//!
//! A type's `version` is a monotonic counter; `version_name` is a human label
//! and plays no part in ordering or compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version stamp carried by every type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeVersion {
    /// Monotonic version number
    pub version: i64,
    /// Display label (e.g. "1.2")
    pub version_name: String,
}

impl TypeVersion {
    /// Create a version stamp
    pub fn new(version: i64, version_name: impl Into<String>) -> Self {
        Self {
            version,
            version_name: version_name.into(),
        }
    }

    /// First published version of a type
    pub fn initial() -> Self {
        Self::new(1, "1.0")
    }

    /// Check that `self` may replace `previous`
    pub fn is_successor_of(&self, previous: &TypeVersion) -> bool {
        self.version > previous.version
    }

    /// Next version with the given label
    pub fn successor(&self, version_name: impl Into<String>) -> Self {
        Self::new(self.version + 1, version_name)
    }
}

impl Default for TypeVersion {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for TypeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version_name.is_empty() {
            write!(f, "v{}", self.version)
        } else {
            write!(f, "v{} ({})", self.version, self.version_name)
        }
    }
}

impl PartialEq for TypeVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for TypeVersion {}

impl PartialOrd for TypeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version.cmp(&other.version)
    }
}
