//! Structural type definitions
//!
//! A [`TypeDef`] describes an entity, relationship or classification type.
//! The category-specific part lives in [`TypeDefKind`], so every operation that
//! depends on the category matches on it exhaustively.
//!
//! Type definitions are immutable values. A new version is produced by the
//! patch engine ([`crate::patch`]) or arrives from a peer as a complete value;
//! the `with_*` helpers here are for building fresh definitions.

mod attribute;
mod link;
mod status;

pub use attribute::{TypeDefAttribute, TypeDefAttributeStatus};
pub use link::{TypeDefGallery, TypeDefLink, TypeDefSummary};
pub use status::InstanceStatus;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::OnceLock;

use crate::cardinality::{ClassificationPropagationRule, RelationshipEnd, RelationshipEndCardinality};
use crate::checksum::Checksum;
use crate::error::{Result, TypeRegistryError};
use crate::version::TypeVersion;

/// Category of a structural type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDefCategory {
    #[default]
    #[serde(rename = "UNKNOWN_DEF")]
    Unknown,
    EntityDef,
    RelationshipDef,
    ClassificationDef,
}

impl fmt::Display for TypeDefCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TypeDefCategory::Unknown => "UnknownDef",
            TypeDefCategory::EntityDef => "EntityDef",
            TypeDefCategory::RelationshipDef => "RelationshipDef",
            TypeDefCategory::ClassificationDef => "ClassificationDef",
        };
        write!(f, "{}", label)
    }
}

/// Mapping of a type onto an external standard
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalStandardMapping {
    pub standard_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_organization: Option<String>,
    pub standard_type_name: String,
}

impl ExternalStandardMapping {
    pub fn new(standard_name: impl Into<String>, standard_type_name: impl Into<String>) -> Self {
        Self {
            standard_name: standard_name.into(),
            standard_organization: None,
            standard_type_name: standard_type_name.into(),
        }
    }

    /// Two mappings describe the same standard type when name and type name agree
    pub fn same_target(&self, other: &ExternalStandardMapping) -> bool {
        self.standard_name == other.standard_name && self.standard_type_name == other.standard_type_name
    }
}

/// One end of a relationship type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEndDef {
    /// Entity type allowed at this end
    pub entity_type: TypeDefLink,
    /// Name by which the far entity sees this end
    pub attribute_name: String,
    #[serde(default)]
    pub attribute_cardinality: RelationshipEndCardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_description: Option<String>,
}

impl RelationshipEndDef {
    pub fn new(
        entity_type: TypeDefLink,
        attribute_name: impl Into<String>,
        attribute_cardinality: RelationshipEndCardinality,
    ) -> Self {
        Self {
            entity_type,
            attribute_name: attribute_name.into(),
            attribute_cardinality,
            attribute_description: None,
        }
    }
}

/// Relationship-specific part of a type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDef {
    pub end_def1: RelationshipEndDef,
    pub end_def2: RelationshipEndDef,
    #[serde(default)]
    pub propagation_rule: ClassificationPropagationRule,
    /// Whether more than one relationship may link the same two entities
    #[serde(default)]
    pub multi_link: bool,
}

impl RelationshipDef {
    pub fn end(&self, end: RelationshipEnd) -> &RelationshipEndDef {
        match end {
            RelationshipEnd::End1 => &self.end_def1,
            RelationshipEnd::End2 => &self.end_def2,
        }
    }
}

/// Classification-specific part of a type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationDef {
    /// Entity types that may carry the classification; empty means any
    #[serde(default)]
    pub valid_entity_defs: Vec<TypeDefLink>,
    #[serde(default)]
    pub propagatable: bool,
}

impl ClassificationDef {
    pub fn allows_entity(&self, guid: &str) -> bool {
        self.valid_entity_defs.is_empty() || self.valid_entity_defs.iter().any(|l| l.guid == guid)
    }
}

/// Category-specific content of a type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum TypeDefKind {
    #[serde(rename = "ENTITY_DEF")]
    Entity,
    #[serde(rename = "RELATIONSHIP_DEF")]
    Relationship(RelationshipDef),
    #[serde(rename = "CLASSIFICATION_DEF")]
    Classification(ClassificationDef),
}

impl TypeDefKind {
    pub fn category(&self) -> TypeDefCategory {
        match self {
            TypeDefKind::Entity => TypeDefCategory::EntityDef,
            TypeDefKind::Relationship(_) => TypeDefCategory::RelationshipDef,
            TypeDefKind::Classification(_) => TypeDefCategory::ClassificationDef,
        }
    }
}

/// A structural type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDef {
    pub guid: String,
    pub name: String,
    #[serde(flatten)]
    pub version: TypeVersion,
    /// Single inheritance; must name a type of the same category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_type: Option<TypeDefLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_guid: Option<String>,
    /// Metadata collection that originated the type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    /// Free-form; the registry does not interpret these
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub external_standard_mappings: Vec<ExternalStandardMapping>,
    #[serde(default = "InstanceStatus::default_valid_statuses")]
    pub valid_instance_status_list: Vec<InstanceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_status: Option<InstanceStatus>,
    #[serde(default)]
    pub properties_definition: Vec<TypeDefAttribute>,
    #[serde(flatten)]
    pub kind: TypeDefKind,
}

fn type_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid type name pattern"))
}

/// Whether `name` is usable as a type or attribute name
pub fn is_valid_type_name(name: &str) -> bool {
    type_name_pattern().is_match(name)
}

impl TypeDef {
    fn with_kind(guid: impl Into<String>, name: impl Into<String>, kind: TypeDefKind) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            version: TypeVersion::initial(),
            super_type: None,
            description: None,
            description_guid: None,
            origin: None,
            created_by: None,
            updated_by: None,
            create_time: None,
            update_time: None,
            options: BTreeMap::new(),
            external_standard_mappings: Vec::new(),
            valid_instance_status_list: InstanceStatus::default_valid_statuses(),
            initial_status: Some(InstanceStatus::Active),
            properties_definition: Vec::new(),
            kind,
        }
    }

    pub fn entity(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_kind(guid, name, TypeDefKind::Entity)
    }

    pub fn relationship(
        guid: impl Into<String>,
        name: impl Into<String>,
        end_def1: RelationshipEndDef,
        end_def2: RelationshipEndDef,
        propagation_rule: ClassificationPropagationRule,
    ) -> Self {
        Self::with_kind(
            guid,
            name,
            TypeDefKind::Relationship(RelationshipDef {
                end_def1,
                end_def2,
                propagation_rule,
                multi_link: false,
            }),
        )
    }

    pub fn classification(
        guid: impl Into<String>,
        name: impl Into<String>,
        valid_entity_defs: Vec<TypeDefLink>,
        propagatable: bool,
    ) -> Self {
        Self::with_kind(
            guid,
            name,
            TypeDefKind::Classification(ClassificationDef {
                valid_entity_defs,
                propagatable,
            }),
        )
    }

    pub fn with_super_type(mut self, super_type: TypeDefLink) -> Self {
        self.super_type = Some(super_type);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: TypeVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_attribute(mut self, attribute: TypeDefAttribute) -> Self {
        self.properties_definition.push(attribute);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_external_standard(mut self, mapping: ExternalStandardMapping) -> Self {
        self.external_standard_mappings.push(mapping);
        self
    }

    pub fn with_valid_statuses(mut self, statuses: Vec<InstanceStatus>, initial: InstanceStatus) -> Self {
        self.valid_instance_status_list = statuses;
        self.initial_status = Some(initial);
        self
    }

    pub fn category(&self) -> TypeDefCategory {
        self.kind.category()
    }

    pub fn link(&self) -> TypeDefLink {
        TypeDefLink::new(&self.guid, &self.name)
    }

    pub fn summary(&self) -> TypeDefSummary {
        TypeDefSummary::new(&self.guid, &self.name, self.version.clone(), self.category())
    }

    /// Attribute declared directly on this type (inherited ones are not searched)
    pub fn attribute(&self, name: &str) -> Option<&TypeDefAttribute> {
        self.properties_definition.iter().find(|a| a.attribute_name == name)
    }

    pub fn as_relationship(&self) -> Option<&RelationshipDef> {
        match &self.kind {
            TypeDefKind::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_classification(&self) -> Option<&ClassificationDef> {
        match &self.kind {
            TypeDefKind::Classification(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_valid_status(&self, status: InstanceStatus) -> bool {
        self.valid_instance_status_list.contains(&status)
    }

    /// Fingerprint of the definition's content
    ///
    /// Audit fields are left out, so two repositories holding the same version
    /// of a type agree on the fingerprint even though they stamped it differently.
    pub fn fingerprint(&self) -> Result<Checksum> {
        let mut content = self.clone();
        content.origin = None;
        content.created_by = None;
        content.updated_by = None;
        content.create_time = None;
        content.update_time = None;
        Checksum::of(&content)
    }

    /// Check everything that can be checked without the rest of the registry
    pub fn validate(&self) -> Result<()> {
        if self.guid.trim().is_empty() {
            return Err(TypeRegistryError::invalid(&self.name, "guid is empty"));
        }
        if !is_valid_type_name(&self.name) {
            return Err(TypeRegistryError::invalid(&self.name, "name is not a valid type name"));
        }
        if self.version.version < 1 {
            return Err(TypeRegistryError::invalid(
                &self.name,
                format!("version {} is below 1", self.version.version),
            ));
        }
        if let Some(super_type) = &self.super_type {
            if super_type.guid == self.guid {
                return Err(TypeRegistryError::invalid(&self.name, "type is its own super type"));
            }
        }

        let statuses: BTreeSet<_> = self.valid_instance_status_list.iter().collect();
        if statuses.len() != self.valid_instance_status_list.len() {
            return Err(TypeRegistryError::invalid(&self.name, "duplicate valid instance status"));
        }
        if let Some(initial) = self.initial_status {
            if !self.is_valid_status(initial) {
                return Err(TypeRegistryError::invalid(
                    &self.name,
                    format!("initial status {:?} is not a valid status", initial),
                ));
            }
        }

        let mut names = HashSet::new();
        for attribute in &self.properties_definition {
            attribute.validate(&self.name)?;
            if !is_valid_type_name(&attribute.attribute_name) {
                return Err(TypeRegistryError::invalid(
                    &self.name,
                    format!("attribute name {} is not valid", attribute.attribute_name),
                ));
            }
            if !names.insert(attribute.attribute_name.as_str()) {
                return Err(TypeRegistryError::invalid(
                    &self.name,
                    format!("attribute {} declared twice", attribute.attribute_name),
                ));
            }
        }
        for attribute in &self.properties_definition {
            if let Some(replacement) = &attribute.replaced_by_attribute {
                if !names.contains(replacement.as_str()) {
                    return Err(TypeRegistryError::invalid(
                        &self.name,
                        format!(
                            "attribute {} is replaced by undeclared attribute {}",
                            attribute.attribute_name, replacement
                        ),
                    ));
                }
            }
        }

        if let TypeDefKind::Relationship(relationship) = &self.kind {
            for end in [&relationship.end_def1, &relationship.end_def2] {
                if end.attribute_name.trim().is_empty() {
                    return Err(TypeRegistryError::invalid(&self.name, "relationship end has no attribute name"));
                }
                if end.entity_type.guid.trim().is_empty() {
                    return Err(TypeRegistryError::invalid(&self.name, "relationship end has no entity type"));
                }
            }
        }

        Ok(())
    }
}
