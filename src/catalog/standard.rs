//! Constructors for the standard attribute types

use super::{AttributeTypeCategory, AttributeTypeDef, CollectionDefCategory, EnumElementDef, PrimitiveDefCategory};
use crate::checksum::Checksum;
use crate::error::Result;

/// Builds the standard primitive and collection attribute types
///
/// Primitive types carry fixed guids. Collection types get a guid derived
/// from their canonical name, so every repository that builds
/// `map<string,string>` arrives at the same identity.
#[derive(Debug, Clone, Default)]
pub struct AttributeTypeCatalog;

impl AttributeTypeCatalog {
    pub fn new() -> Self {
        Self
    }

    /// The standard attribute type for a primitive
    pub fn primitive(&self, primitive: PrimitiveDefCategory) -> AttributeTypeDef {
        AttributeTypeDef::new(
            primitive.guid(),
            primitive.type_name(),
            AttributeTypeCategory::Primitive { primitive },
        )
    }

    /// Every known primitive attribute type
    pub fn standard_primitives(&self) -> Vec<AttributeTypeDef> {
        PrimitiveDefCategory::ALL
            .iter()
            .filter(|p| p.is_known())
            .map(|p| self.primitive(*p))
            .collect()
    }

    /// A collection over the given argument types
    pub fn collection(
        &self,
        collection: CollectionDefCategory,
        argument_types: Vec<AttributeTypeCategory>,
    ) -> Result<AttributeTypeDef> {
        let category = AttributeTypeCategory::Collection {
            collection,
            argument_types,
        };
        let name = category.label();
        category.validate(&name)?;
        Ok(AttributeTypeDef::new(derived_guid(&name), name, category))
    }

    pub fn map(&self, key: PrimitiveDefCategory, value: PrimitiveDefCategory) -> Result<AttributeTypeDef> {
        self.collection(
            CollectionDefCategory::Map,
            vec![
                AttributeTypeCategory::Primitive { primitive: key },
                AttributeTypeCategory::Primitive { primitive: value },
            ],
        )
    }

    pub fn array(&self, element: PrimitiveDefCategory) -> Result<AttributeTypeDef> {
        self.collection(
            CollectionDefCategory::Array,
            vec![AttributeTypeCategory::Primitive { primitive: element }],
        )
    }

    /// An enumeration; elements are validated before the definition is returned
    pub fn enumeration(
        &self,
        guid: impl Into<String>,
        name: impl Into<String>,
        elements: Vec<EnumElementDef>,
        default_value: Option<i32>,
    ) -> Result<AttributeTypeDef> {
        let def = AttributeTypeDef::new(
            guid,
            name,
            AttributeTypeCategory::Enum {
                elements,
                default_value,
            },
        );
        def.validate()?;
        Ok(def)
    }
}

/// Guid-shaped identifier derived from a canonical type name
pub(crate) fn derived_guid(name: &str) -> String {
    let digest = Checksum::from_bytes(name.as_bytes());
    let hex = digest.as_str();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
