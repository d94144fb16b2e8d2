//! Primitive value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of primitive attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimitiveDefCategory {
    Unknown,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    String,
    Date,
}

impl PrimitiveDefCategory {
    /// Every known primitive, in ordinal order
    pub const ALL: [PrimitiveDefCategory; 13] = [
        PrimitiveDefCategory::Unknown,
        PrimitiveDefCategory::Boolean,
        PrimitiveDefCategory::Byte,
        PrimitiveDefCategory::Char,
        PrimitiveDefCategory::Short,
        PrimitiveDefCategory::Int,
        PrimitiveDefCategory::Long,
        PrimitiveDefCategory::Float,
        PrimitiveDefCategory::Double,
        PrimitiveDefCategory::BigInteger,
        PrimitiveDefCategory::BigDecimal,
        PrimitiveDefCategory::String,
        PrimitiveDefCategory::Date,
    ];

    pub fn ordinal(&self) -> i32 {
        match self {
            PrimitiveDefCategory::Unknown => 0,
            PrimitiveDefCategory::Boolean => 1,
            PrimitiveDefCategory::Byte => 2,
            PrimitiveDefCategory::Char => 3,
            PrimitiveDefCategory::Short => 4,
            PrimitiveDefCategory::Int => 5,
            PrimitiveDefCategory::Long => 6,
            PrimitiveDefCategory::Float => 7,
            PrimitiveDefCategory::Double => 8,
            PrimitiveDefCategory::BigInteger => 9,
            PrimitiveDefCategory::BigDecimal => 10,
            PrimitiveDefCategory::String => 11,
            PrimitiveDefCategory::Date => 12,
        }
    }

    /// Canonical type name, as used for the attribute type's `name`
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveDefCategory::Unknown => "object",
            PrimitiveDefCategory::Boolean => "boolean",
            PrimitiveDefCategory::Byte => "byte",
            PrimitiveDefCategory::Char => "char",
            PrimitiveDefCategory::Short => "short",
            PrimitiveDefCategory::Int => "int",
            PrimitiveDefCategory::Long => "long",
            PrimitiveDefCategory::Float => "float",
            PrimitiveDefCategory::Double => "double",
            PrimitiveDefCategory::BigInteger => "biginteger",
            PrimitiveDefCategory::BigDecimal => "bigdecimal",
            PrimitiveDefCategory::String => "string",
            PrimitiveDefCategory::Date => "date",
        }
    }

    /// Fixed guid of the standard attribute type for this primitive
    pub fn guid(&self) -> &'static str {
        match self {
            PrimitiveDefCategory::Unknown => "1c4b21f4-0b67-41a7-a6ed-2af185eb9b3b",
            PrimitiveDefCategory::Boolean => "3863f010-611c-41fe-aaae-5d4d427f863b",
            PrimitiveDefCategory::Byte => "d5c8ad9f-8fee-4a64-80b3-63ce1e47f6bb",
            PrimitiveDefCategory::Char => "b0abebe5-cf85-4065-86ad-f3c6360ed9c7",
            PrimitiveDefCategory::Short => "8e95b966-ab60-46d4-a03f-40c5a1ba6c2a",
            PrimitiveDefCategory::Int => "7fc49104-fd3a-46c8-b6bf-f16b6074cd35",
            PrimitiveDefCategory::Long => "33a91510-92ee-4825-9f49-facd7a6f9db6",
            PrimitiveDefCategory::Float => "52aeb769-37b7-4b30-b949-ddc7dcebcfa2",
            PrimitiveDefCategory::Double => "e13572e8-25c3-4994-acb6-2ea66c95812e",
            PrimitiveDefCategory::BigInteger => "8aa56e52-1076-4e0d-9b66-3873a5ed7392",
            PrimitiveDefCategory::BigDecimal => "84f7a9b8-d2b6-4a14-a7e6-0b1c4f5b9b2e",
            PrimitiveDefCategory::String => "b34a64b9-554a-42b1-8f8a-7d5c2339f9c4",
            PrimitiveDefCategory::Date => "1bef35ca-d4f9-48db-87c2-afce4649362d",
        }
    }

    /// Look up a primitive by its canonical type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.type_name() == name)
    }

    /// Whether this primitive can hold a value (Unknown cannot)
    pub fn is_known(&self) -> bool {
        *self != PrimitiveDefCategory::Unknown
    }
}

impl fmt::Display for PrimitiveDefCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}
