//! Instance lifecycle statuses

use serde::{Deserialize, Serialize};

/// Status an instance of a type may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Unknown,
    Draft,
    Prepared,
    Proposed,
    Approved,
    Rejected,
    ApprovedConcept,
    UnderDevelopment,
    DevelopmentComplete,
    ApprovedForDeployment,
    Standby,
    Active,
    Failed,
    Disabled,
    Complete,
    Deprecated,
    Other,
    Deleted,
}

impl InstanceStatus {
    pub fn ordinal(&self) -> i32 {
        *self as i32
    }

    /// Statuses every type accepts when none are declared
    pub fn default_valid_statuses() -> Vec<InstanceStatus> {
        vec![InstanceStatus::Active, InstanceStatus::Deleted]
    }
}

impl Default for InstanceStatus {
    fn default() -> Self {
        InstanceStatus::Active
    }
}
