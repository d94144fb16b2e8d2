//! Attributes declared by a type definition

use serde::{Deserialize, Serialize};

use crate::cardinality::AttributeCardinality;
use crate::catalog::AttributeTypeDef;
use crate::error::{Result, TypeRegistryError};

/// Lifecycle of an attribute within its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TypeDefAttributeStatus {
    #[default]
    #[serde(rename = "ACTIVE_ATTRIBUTE")]
    Active,
    /// Superseded by `replaced_by_attribute`; the old name stays resolvable
    #[serde(rename = "RENAMED_ATTRIBUTE")]
    Renamed,
    #[serde(rename = "DEPRECATED_ATTRIBUTE")]
    Deprecated,
}

/// A named attribute of an entity, relationship or classification type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefAttribute {
    pub attribute_name: String,
    pub attribute_type: AttributeTypeDef,
    #[serde(default)]
    pub attribute_status: TypeDefAttributeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced_by_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_description_guid: Option<String>,
    #[serde(default)]
    pub cardinality: AttributeCardinality,
    #[serde(default)]
    pub values_min_count: u32,
    /// Absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_max_count: Option<u32>,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default = "default_true")]
    pub is_indexable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

fn default_true() -> bool {
    true
}

impl TypeDefAttribute {
    /// An optional single-valued attribute
    pub fn new(attribute_name: impl Into<String>, attribute_type: AttributeTypeDef) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            attribute_type,
            attribute_status: TypeDefAttributeStatus::Active,
            replaced_by_attribute: None,
            attribute_description: None,
            attribute_description_guid: None,
            cardinality: AttributeCardinality::AtMostOne,
            values_min_count: 0,
            values_max_count: Some(1),
            is_unique: false,
            is_indexable: true,
            default_value: None,
        }
    }

    /// Set the cardinality and the matching value-count bounds
    pub fn with_cardinality(mut self, cardinality: AttributeCardinality) -> Self {
        let (min, max) = cardinality.bounds();
        self.cardinality = cardinality;
        self.values_min_count = min as u32;
        self.values_max_count = max.map(|m| m as u32);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.attribute_description = Some(description.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.attribute_status == TypeDefAttributeStatus::Active
    }

    /// Whether `count` values satisfy both the cardinality and the count bounds
    pub fn accepts_value_count(&self, count: usize) -> bool {
        self.cardinality.admits(count)
            && count >= self.values_min_count as usize
            && self.values_max_count.map_or(true, |max| count <= max as usize)
    }

    /// Check the attribute in isolation
    pub fn validate(&self, owner: &str) -> Result<()> {
        if self.attribute_name.trim().is_empty() {
            return Err(TypeRegistryError::invalid(owner, "attribute with empty name"));
        }
        if let Some(max) = self.values_max_count {
            if self.values_min_count > max {
                return Err(TypeRegistryError::invalid(
                    owner,
                    format!(
                        "attribute {} has valuesMinCount {} above valuesMaxCount {}",
                        self.attribute_name, self.values_min_count, max
                    ),
                ));
            }
        }
        match (self.attribute_status, &self.replaced_by_attribute) {
            (TypeDefAttributeStatus::Renamed, None) => {
                return Err(TypeRegistryError::invalid(
                    owner,
                    format!("renamed attribute {} has no replacement", self.attribute_name),
                ))
            }
            (TypeDefAttributeStatus::Active, Some(_)) => {
                return Err(TypeRegistryError::invalid(
                    owner,
                    format!("active attribute {} names a replacement", self.attribute_name),
                ))
            }
            _ => {}
        }
        self.attribute_type.validate().map_err(|e| match e {
            TypeRegistryError::InvalidTypeDef { reason, .. } => TypeRegistryError::invalid(
                owner,
                format!("attribute {}: {}", self.attribute_name, reason),
            ),
            other => other,
        })
    }
}
