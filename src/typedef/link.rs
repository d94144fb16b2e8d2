//! Lightweight references to type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::AttributeTypeDef;
use crate::version::TypeVersion;

use super::{TypeDef, TypeDefCategory};

/// Reference to a type definition by identity
///
/// The guid is authoritative; the name is carried for display and as a
/// consistency check when the link is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDefLink {
    pub guid: String,
    pub name: String,
}

impl TypeDefLink {
    pub fn new(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeDefLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.guid)
    }
}

/// Value description of a type, used where the type may not be held locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefSummary {
    #[serde(default)]
    pub guid: String,
    pub name: String,
    #[serde(flatten)]
    pub version: TypeVersion,
    #[serde(default)]
    pub category: TypeDefCategory,
}

impl TypeDefSummary {
    pub fn new(
        guid: impl Into<String>,
        name: impl Into<String>,
        version: TypeVersion,
        category: TypeDefCategory,
    ) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            version,
            category,
        }
    }

    /// A summary known only by name, as written in hand-edited configuration
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(String::new(), name, TypeVersion::default(), TypeDefCategory::Unknown)
    }

    /// Whether this summary identifies the given type
    ///
    /// When both sides carry a guid only the guid is compared; the name is the
    /// fallback for summaries written without one.
    pub fn identifies(&self, guid: &str, name: &str) -> bool {
        if !self.guid.is_empty() && !guid.is_empty() {
            self.guid == guid
        } else {
            self.name == name
        }
    }

    pub fn link(&self) -> TypeDefLink {
        TypeDefLink::new(&self.guid, &self.name)
    }
}

/// Every type known to a repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefGallery {
    pub attribute_type_defs: Vec<AttributeTypeDef>,
    pub type_defs: Vec<TypeDef>,
}

impl TypeDefGallery {
    pub fn is_empty(&self) -> bool {
        self.attribute_type_defs.is_empty() && self.type_defs.is_empty()
    }

    pub fn summaries(&self) -> Vec<TypeDefSummary> {
        self.type_defs.iter().map(TypeDef::summary).collect()
    }
}
