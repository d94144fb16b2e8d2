//! Open Metadata Type Registry
//!
//! The type system shared by a cohort of independent metadata repositories:
//! what an entity, relationship, classification or attribute type is, how a
//! type is evolved through patches without breaking live instances, and which
//! type and instance events cross a repository's boundary.
//!
//! ## Features
//!
//! - **Closed Type Model**: Entity, relationship and classification types as
//!   a tagged variant, with primitive, collection and enum attribute types
//! - **Patch Engine**: Versioned, non-breaking evolution with optimistic
//!   concurrency on `applyToVersion`
//! - **Cardinality & Propagation**: Pure checks for attribute value counts and
//!   classification propagation across relationships
//! - **Exchange Policy**: Reproducible accept/reject decisions per cohort event
//! - **Type Archives**: Bundles of types installed in dependency order
//!
//! ## Architecture
//!
//! ```text
//! catalog ──► typedef ──► patch ──► registry ◄── archive
//!                │          │          │
//!           cardinality  evolution  hierarchy
//!                                      │
//!                          exchange ◄──┴──► cohort
//! ```

pub mod archive;
pub mod cardinality;
pub mod catalog;
pub mod checksum;
pub mod cohort;
pub mod config;
pub mod error;
pub mod evolution;
pub mod exchange;
pub mod hierarchy;
pub mod patch;
pub mod registry;
pub mod typedef;
pub mod version;

pub use archive::{ArchiveReport, TypeArchive};
pub use cardinality::{
    propagation_target, resolve_propagation, validate_attribute_value, AttributeCardinality,
    ClassificationPropagationRule, PropagationDirection, RelationshipEnd, RelationshipEndCardinality,
};
pub use catalog::{
    AttributeTypeCatalog, AttributeTypeCategory, AttributeTypeDef, CollectionDefCategory, EnumElementDef,
    PrimitiveDefCategory,
};
pub use checksum::Checksum;
pub use cohort::{CohortConfig, CohortExchange, CohortTopicProtocol, LocalRepositoryMode};
pub use config::RegistryConfig;
pub use error::{Disposition, Result, TypeRegistryError};
pub use evolution::{EvolutionChecker, EvolutionReport};
pub use exchange::{
    decide, ExchangeDecision, ExchangeEvent, ExchangePolicy, ExchangeRule, LearnedTypes, NoAncestry, TypeAncestry,
};
pub use hierarchy::TypeHierarchy;
pub use patch::{PatchEngine, TypeDefPatch, TypeDefPatchAction};
pub use registry::{RegistrySettings, TypeDefOrigin, TypeDefVerification, TypeRegistry};
pub use typedef::{
    ClassificationDef, InstanceStatus, RelationshipDef, RelationshipEndDef, TypeDef, TypeDefAttribute,
    TypeDefCategory, TypeDefKind, TypeDefLink, TypeDefSummary,
};
pub use version::TypeVersion;
