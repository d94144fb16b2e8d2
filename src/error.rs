//! Error types for the type registry

use thiserror::Error;

/// Result type for type registry operations
pub type Result<T> = std::result::Result<T, TypeRegistryError>;

/// How a caller should treat a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Re-read the current definition and try again.
    Retryable,
    /// The request can never succeed as submitted.
    Permanent,
    /// The request was served, but the registry saw inconsistent identities.
    Degraded,
    /// A referenced type is not known locally; defer or ask a peer for it.
    Deferred,
}

/// Type registry errors
#[derive(Error, Debug)]
pub enum TypeRegistryError {
    #[error("Invalid evolution of type {type_name}: {reason}")]
    InvalidTypeDefEvolution { type_name: String, reason: String },

    #[error("Version conflict on type {type_name} ({guid}): patch applies to version {apply_to_version} but stored version is {current_version}")]
    VersionConflict {
        guid: String,
        type_name: String,
        apply_to_version: i64,
        current_version: i64,
    },

    #[error("Unsupported evolution of type {type_name}: {reason}")]
    UnsupportedEvolution { type_name: String, reason: String },

    #[error("Type identity conflict for guid {guid}: expected name {expected_name}, found {actual_name}")]
    TypeDefIdentityConflict {
        guid: String,
        expected_name: String,
        actual_name: String,
    },

    #[error("Unresolved type link: {name} ({guid})")]
    UnresolvedTypeLink { guid: String, name: String },

    #[error("Invalid patch for type {type_name}: {reason}")]
    InvalidPatch { type_name: String, reason: String },

    #[error("Invalid type definition {name}: {reason}")]
    InvalidTypeDef { name: String, reason: String },

    #[error("Type already registered: {name} ({guid}) version {version}")]
    AlreadyRegistered {
        guid: String,
        name: String,
        version: i64,
    },

    #[error("Operation not permitted in {mode} mode: {operation}")]
    NotPermitted { mode: String, operation: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl TypeRegistryError {
    /// Classify the error for the caller.
    pub fn disposition(&self) -> Disposition {
        match self {
            TypeRegistryError::VersionConflict { .. } => Disposition::Retryable,
            TypeRegistryError::TypeDefIdentityConflict { .. } => Disposition::Degraded,
            TypeRegistryError::UnresolvedTypeLink { .. } => Disposition::Deferred,
            TypeRegistryError::Io(_) => Disposition::Retryable,
            _ => Disposition::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Retryable
    }

    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        TypeRegistryError::InvalidTypeDef {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        TypeRegistryError::UnsupportedEvolution {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_patch(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        TypeRegistryError::InvalidPatch {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_evolution(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        TypeRegistryError::InvalidTypeDefEvolution {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(guid: impl Into<String>, name: impl Into<String>) -> Self {
        TypeRegistryError::UnresolvedTypeLink {
            guid: guid.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_is_retryable() {
        let err = TypeRegistryError::VersionConflict {
            guid: "g".to_string(),
            type_name: "Asset".to_string(),
            apply_to_version: 3,
            current_version: 4,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("stored version is 4"));
    }

    #[test]
    fn test_unsupported_evolution_is_permanent() {
        let err = TypeRegistryError::unsupported("Asset", "attribute deletion");
        assert_eq!(err.disposition(), Disposition::Permanent);
    }

    #[test]
    fn test_unresolved_link_is_deferred() {
        let err = TypeRegistryError::unresolved("1234", "Process");
        assert_eq!(err.disposition(), Disposition::Deferred);
    }
}
