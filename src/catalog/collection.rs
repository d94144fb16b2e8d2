//! Collection value types

use serde::{Deserialize, Serialize};

/// Kinds of collection attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionDefCategory {
    Unknown,
    Map,
    Array,
    Struct,
}

impl CollectionDefCategory {
    pub fn ordinal(&self) -> i32 {
        match self {
            CollectionDefCategory::Unknown => 0,
            CollectionDefCategory::Map => 1,
            CollectionDefCategory::Array => 2,
            CollectionDefCategory::Struct => 3,
        }
    }

    /// Number of argument types the collection must declare
    pub fn argument_count(&self) -> usize {
        match self {
            CollectionDefCategory::Unknown => 0,
            CollectionDefCategory::Map => 2,
            CollectionDefCategory::Array => 1,
            CollectionDefCategory::Struct => 0,
        }
    }

    /// Build the canonical collection name from its argument type names
    ///
    /// The caller is expected to pass exactly `argument_count()` names.
    pub fn type_name(&self, arguments: &[&str]) -> String {
        match self {
            CollectionDefCategory::Unknown => "collection".to_string(),
            CollectionDefCategory::Map => format!(
                "map<{},{}>",
                arguments.first().copied().unwrap_or_default(),
                arguments.get(1).copied().unwrap_or_default()
            ),
            CollectionDefCategory::Array => {
                format!("array<{}>", arguments.first().copied().unwrap_or_default())
            }
            CollectionDefCategory::Struct => "struct<>".to_string(),
        }
    }
}
