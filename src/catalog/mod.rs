//! Attribute type catalog
//!
//! Attribute types are the leaves of the type system: the closed set of value
//! types (primitives, collections and enumerations) that an attribute of an
//! entity, relationship or classification can hold.
//!
//! An [`AttributeTypeDef`] is immutable once published. A new version shares
//! the `guid` and `name` of its predecessor with a higher `version`; edits to
//! the description alone are applied in place without a version bump.

mod collection;
mod primitive;
mod standard;

pub use collection::CollectionDefCategory;
pub use primitive::PrimitiveDefCategory;
pub use standard::AttributeTypeCatalog;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, TypeRegistryError};
use crate::version::TypeVersion;

/// One value of an enumeration attribute type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumElementDef {
    /// Durable wire value
    pub ordinal: i32,
    /// Durable symbolic name
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_guid: Option<String>,
}

impl EnumElementDef {
    pub fn new(ordinal: i32, value: impl Into<String>) -> Self {
        Self {
            ordinal,
            value: value.into(),
            description: None,
            description_guid: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The shape of the value an attribute holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeTypeCategory {
    Primitive {
        primitive: PrimitiveDefCategory,
    },
    Collection {
        collection: CollectionDefCategory,
        #[serde(rename = "argumentTypes", default)]
        argument_types: Vec<AttributeTypeCategory>,
    },
    Enum {
        elements: Vec<EnumElementDef>,
        #[serde(rename = "defaultValue", default, skip_serializing_if = "Option::is_none")]
        default_value: Option<i32>,
    },
}

impl AttributeTypeCategory {
    /// Short label for messages
    pub fn label(&self) -> String {
        match self {
            AttributeTypeCategory::Primitive { primitive } => primitive.type_name().to_string(),
            AttributeTypeCategory::Collection { collection, argument_types } => {
                let labels: Vec<String> = argument_types.iter().map(|a| a.label()).collect();
                let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
                collection.type_name(&refs)
            }
            AttributeTypeCategory::Enum { elements, .. } => format!("enum[{}]", elements.len()),
        }
    }

    /// Number of argument types a collection must carry; zero otherwise
    pub fn argument_count(&self) -> usize {
        match self {
            AttributeTypeCategory::Collection { collection, .. } => collection.argument_count(),
            _ => 0,
        }
    }

    /// Check the structural invariants of the category
    pub fn validate(&self, owner: &str) -> Result<()> {
        match self {
            AttributeTypeCategory::Primitive { primitive } => {
                if !primitive.is_known() {
                    return Err(TypeRegistryError::invalid(owner, "primitive category is unknown"));
                }
            }
            AttributeTypeCategory::Collection { collection, argument_types } => {
                if *collection == CollectionDefCategory::Unknown {
                    return Err(TypeRegistryError::invalid(owner, "collection category is unknown"));
                }
                if argument_types.len() != collection.argument_count() {
                    return Err(TypeRegistryError::invalid(
                        owner,
                        format!(
                            "{:?} collection needs {} argument types, found {}",
                            collection,
                            collection.argument_count(),
                            argument_types.len()
                        ),
                    ));
                }
                for argument in argument_types {
                    argument.validate(owner)?;
                }
            }
            AttributeTypeCategory::Enum { elements, default_value } => {
                if elements.is_empty() {
                    return Err(TypeRegistryError::invalid(owner, "enumeration has no elements"));
                }
                let mut ordinals = HashSet::new();
                let mut values = HashSet::new();
                for element in elements {
                    if !ordinals.insert(element.ordinal) {
                        return Err(TypeRegistryError::invalid(
                            owner,
                            format!("duplicate enum ordinal {}", element.ordinal),
                        ));
                    }
                    if !values.insert(element.value.as_str()) {
                        return Err(TypeRegistryError::invalid(
                            owner,
                            format!("duplicate enum value {}", element.value),
                        ));
                    }
                }
                if let Some(default) = default_value {
                    if !ordinals.contains(default) {
                        return Err(TypeRegistryError::invalid(
                            owner,
                            format!("default value {} is not an element ordinal", default),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn same_kind(&self, other: &AttributeTypeCategory) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Definition of an attribute's value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeTypeDef {
    pub guid: String,
    pub name: String,
    #[serde(flatten)]
    pub version: TypeVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_guid: Option<String>,
    pub category: AttributeTypeCategory,
}

/// How a candidate attribute type relates to the one already known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTypeUpdate {
    /// Nothing changed
    Unchanged,
    /// Only the description changed; the version stays put
    DescriptionOnly,
    /// A higher version with compatible content
    NewVersion,
}

impl AttributeTypeDef {
    pub fn new(guid: impl Into<String>, name: impl Into<String>, category: AttributeTypeCategory) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            version: TypeVersion::initial(),
            description: None,
            description_guid: None,
            category,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: TypeVersion) -> Self {
        self.version = version;
        self
    }

    /// Check the definition is well formed
    pub fn validate(&self) -> Result<()> {
        if self.guid.trim().is_empty() {
            return Err(TypeRegistryError::invalid(&self.name, "guid is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(TypeRegistryError::invalid(&self.guid, "name is empty"));
        }
        self.category.validate(&self.name)
    }

    /// Classify `candidate` as a replacement for `self`
    ///
    /// Both must carry the same guid. Enumeration elements are durable: a new
    /// version may add elements but never drop one or change an existing
    /// ordinal's value.
    pub fn classify_update(&self, candidate: &AttributeTypeDef) -> Result<AttributeTypeUpdate> {
        if candidate.name != self.name {
            return Err(TypeRegistryError::invalid_evolution(
                &self.name,
                format!("attribute type may not be renamed to {}", candidate.name),
            ));
        }
        if candidate.version < self.version {
            return Err(TypeRegistryError::invalid_evolution(
                &self.name,
                format!("version {} is older than stored {}", candidate.version, self.version),
            ));
        }
        if !self.category.same_kind(&candidate.category) {
            return Err(TypeRegistryError::invalid_evolution(
                &self.name,
                format!("category changed from {} to {}", self.category.label(), candidate.category.label()),
            ));
        }

        match (&self.category, &candidate.category) {
            (
                AttributeTypeCategory::Enum { elements: old, .. },
                AttributeTypeCategory::Enum { elements: new, .. },
            ) => {
                for element in old {
                    match new.iter().find(|e| e.ordinal == element.ordinal) {
                        None => {
                            return Err(TypeRegistryError::invalid_evolution(
                                &self.name,
                                format!("enum element {} ({}) removed", element.value, element.ordinal),
                            ))
                        }
                        Some(e) if e.value != element.value => {
                            return Err(TypeRegistryError::invalid_evolution(
                                &self.name,
                                format!(
                                    "enum element {} renamed to {} outside a patch",
                                    element.value, e.value
                                ),
                            ))
                        }
                        Some(_) => {}
                    }
                }
            }
            (old, new) if old != new => {
                return Err(TypeRegistryError::invalid_evolution(
                    &self.name,
                    format!("value type changed from {} to {}", old.label(), new.label()),
                ));
            }
            _ => {}
        }

        let content_changed = self.category != candidate.category;
        let description_changed = self.description != candidate.description
            || self.description_guid != candidate.description_guid;

        if candidate.version.is_successor_of(&self.version) {
            Ok(AttributeTypeUpdate::NewVersion)
        } else if content_changed {
            Err(TypeRegistryError::invalid_evolution(
                &self.name,
                "content changed without a version bump",
            ))
        } else if description_changed {
            Ok(AttributeTypeUpdate::DescriptionOnly)
        } else {
            Ok(AttributeTypeUpdate::Unchanged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_enum() -> AttributeTypeDef {
        AttributeTypeDef::new(
            "enum-guid",
            "Criticality",
            AttributeTypeCategory::Enum {
                elements: vec![
                    EnumElementDef::new(0, "Unclassified"),
                    EnumElementDef::new(1, "Marginal"),
                    EnumElementDef::new(2, "Important"),
                ],
                default_value: Some(0),
            },
        )
    }

    #[test]
    fn test_collection_argument_count_enforced() {
        let bad = AttributeTypeCategory::Collection {
            collection: CollectionDefCategory::Map,
            argument_types: vec![AttributeTypeCategory::Primitive {
                primitive: PrimitiveDefCategory::String,
            }],
        };
        assert!(bad.validate("map<string>").is_err());
    }

    #[test]
    fn test_enum_default_must_exist() {
        let mut def = status_enum();
        if let AttributeTypeCategory::Enum { default_value, .. } = &mut def.category {
            *default_value = Some(7);
        }
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_enum_duplicate_ordinal_rejected() {
        let mut def = status_enum();
        if let AttributeTypeCategory::Enum { elements, .. } = &mut def.category {
            elements.push(EnumElementDef::new(1, "Critical"));
        }
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_description_only_update_keeps_version() {
        let old = status_enum();
        let new = old.clone().with_description("How critical the asset is");
        assert_eq!(old.classify_update(&new).unwrap(), AttributeTypeUpdate::DescriptionOnly);
    }

    #[test]
    fn test_enum_element_added_in_new_version() {
        let old = status_enum();
        let mut new = old.clone().with_version(TypeVersion::new(2, "1.1"));
        if let AttributeTypeCategory::Enum { elements, .. } = &mut new.category {
            elements.push(EnumElementDef::new(3, "Critical"));
        }
        assert_eq!(old.classify_update(&new).unwrap(), AttributeTypeUpdate::NewVersion);
    }

    #[test]
    fn test_enum_element_rename_rejected() {
        let old = status_enum();
        let mut new = old.clone().with_version(TypeVersion::new(2, "1.1"));
        if let AttributeTypeCategory::Enum { elements, .. } = &mut new.category {
            elements[1].value = "Minor".to_string();
        }
        let err = old.classify_update(&new).unwrap_err();
        assert!(matches!(err, TypeRegistryError::InvalidTypeDefEvolution { .. }));
    }

    #[test]
    fn test_content_change_without_bump_rejected() {
        let old = status_enum();
        let mut new = old.clone();
        if let AttributeTypeCategory::Enum { default_value, .. } = &mut new.category {
            *default_value = Some(2);
        }
        assert!(old.classify_update(&new).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let def = AttributeTypeCatalog::new().primitive(PrimitiveDefCategory::String);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["category"]["kind"], "primitive");
        assert_eq!(json["category"]["primitive"], "STRING");
        assert_eq!(json["versionName"], "1.0");
    }
}
