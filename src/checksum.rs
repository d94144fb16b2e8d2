//! Content fingerprints for published type definitions

use sha2::{Sha256, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// SHA256 fingerprint of a type definition's canonical JSON form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from JSON value (canonicalized)
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        // serde_json::Map keeps keys sorted, so this string is canonical
        let canonical = serde_json::to_string(value)?;
        Ok(Self::from_bytes(canonical.as_bytes()))
    }

    /// Fingerprint any serializable definition
    pub fn of<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)?;
        Self::from_json(&json)
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a definition matches this checksum
    pub fn verify<T: Serialize>(&self, value: &T) -> Result<bool> {
        Ok(Self::of(value)? == *self)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}
