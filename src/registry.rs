//! Type Registry
//!
//! The single authority for the type definitions held by one repository.
//! Reads proceed in parallel; every mutation of a type definition is
//! serialized per guid by committing under the map's entry lock and comparing
//! the stored version with the version the change was computed from.
//!
//! Two patches racing against the same `applyToVersion` therefore end with
//! exactly one stored result; the loser sees `VersionConflict` and must re-read.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::catalog::{AttributeTypeCatalog, AttributeTypeDef, AttributeTypeUpdate};
use crate::checksum::Checksum;
use crate::cohort::LocalRepositoryMode;
use crate::error::{Result, TypeRegistryError};
use crate::evolution::EvolutionChecker;
use crate::exchange::TypeAncestry;
use crate::hierarchy::TypeHierarchy;
use crate::patch::{PatchEngine, TypeDefPatch, TypeDefPatchAction};
use crate::typedef::{
    TypeDef, TypeDefCategory, TypeDefGallery, TypeDefKind, TypeDefLink, TypeDefSummary,
};

/// Explicit settings for one registry instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub server_name: String,
    /// Stamped as `origin` on types created locally
    pub metadata_collection_id: String,
    pub local_repository_mode: LocalRepositoryMode,
    /// Stamped as `createdBy` / `updatedBy` when the caller supplies nobody
    pub default_user: Option<String>,
    /// Fail link resolution on a guid/name mismatch instead of warning
    pub strict_link_resolution: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            server_name: "local".to_string(),
            metadata_collection_id: "local-metadata-collection".to_string(),
            local_repository_mode: LocalRepositoryMode::OpenMetadataNative,
            default_user: None,
            strict_link_resolution: false,
        }
    }
}

/// Where a registered type definition came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefOrigin {
    /// Created on this server; subject to the repository mode
    Local,
    /// Received from a cohort peer or an archive
    Cohort { metadata_collection_id: String },
}

/// A guid/name mismatch noticed by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConflict {
    pub guid: String,
    /// Name the registry holds for the guid
    pub expected_name: String,
    /// Name the caller used
    pub actual_name: String,
    /// Guid the registry holds for the caller's name, when it differs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_guid: Option<String>,
    pub detected_at: DateTime<Utc>,
}

/// Result of resolving a [`TypeDefLink`]
#[derive(Debug, Clone)]
pub struct LinkResolution {
    pub type_def: TypeDef,
    /// Present when the link's name disagreed with the stored name
    pub conflict: Option<IdentityConflict>,
}

/// How a peer's copy of a type compares with the local one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDefVerification {
    /// Same guid, version and content
    Verified,
    /// The guid is not known locally
    Unknown,
    /// Same guid held under another name
    IdentityMismatch { local_name: String, remote_name: String },
    VersionDiffers { local_version: i64, remote_version: i64 },
    /// Same version, different content
    ContentDiffers { local: Checksum, remote: Checksum },
}

impl TypeDefVerification {
    pub fn is_verified(&self) -> bool {
        *self == TypeDefVerification::Verified
    }
}

/// Registry of the attribute types and type definitions known to a repository
pub struct TypeRegistry {
    settings: RegistrySettings,
    type_defs: DashMap<String, TypeDef>,
    /// type name -> guid; the first registration of a name keeps it
    names: DashMap<String, String>,
    attribute_type_defs: DashMap<String, AttributeTypeDef>,
    attribute_names: DashMap<String, String>,
    conflicts: Mutex<Vec<IdentityConflict>>,
    engine: PatchEngine,
    checker: EvolutionChecker,
}

impl TypeRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            type_defs: DashMap::new(),
            names: DashMap::new(),
            attribute_type_defs: DashMap::new(),
            attribute_names: DashMap::new(),
            conflicts: Mutex::new(Vec::new()),
            engine: PatchEngine::new(),
            checker: EvolutionChecker::new(),
        }
    }

    /// A registry preloaded with the standard primitive attribute types
    pub fn with_standard_types(settings: RegistrySettings) -> Result<Self> {
        let registry = Self::new(settings);
        for primitive in AttributeTypeCatalog::new().standard_primitives() {
            registry.register_attribute_type_def(primitive)?;
        }
        Ok(registry)
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.type_defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.type_defs.is_empty()
    }

    // --- attribute types ---

    /// Register an attribute type, or accept a compatible newer copy of one
    pub fn register_attribute_type_def(&self, candidate: AttributeTypeDef) -> Result<AttributeTypeDef> {
        candidate.validate()?;

        let stored = match self.attribute_type_defs.entry(candidate.guid.clone()) {
            Entry::Occupied(mut entry) => match entry.get().classify_update(&candidate)? {
                AttributeTypeUpdate::Unchanged => entry.get().clone(),
                AttributeTypeUpdate::DescriptionOnly | AttributeTypeUpdate::NewVersion => {
                    info!(
                        name = %candidate.name,
                        guid = %candidate.guid,
                        version = candidate.version.version,
                        "updated attribute type"
                    );
                    entry.insert(candidate.clone());
                    candidate
                }
            },
            Entry::Vacant(entry) => {
                info!(name = %candidate.name, guid = %candidate.guid, "registered attribute type");
                entry.insert(candidate.clone());
                candidate
            }
        };

        let holder = self
            .attribute_names
            .entry(stored.name.clone())
            .or_insert_with(|| stored.guid.clone())
            .clone();
        if holder != stored.guid {
            self.record_conflict(&holder, &stored.name, &stored.name, Some(stored.guid.clone()));
        }
        Ok(stored)
    }

    pub fn attribute_type_by_guid(&self, guid: &str) -> Option<AttributeTypeDef> {
        self.attribute_type_defs.get(guid).map(|a| a.clone())
    }

    pub fn attribute_type_by_name(&self, name: &str) -> Option<AttributeTypeDef> {
        let guid = self.attribute_names.get(name).map(|g| g.clone())?;
        self.attribute_type_by_guid(&guid)
    }

    // --- type definitions ---

    /// Register a type definition that is new to this repository
    ///
    /// Registering the identical definition again is a no-op. A different
    /// definition under a known guid is refused: newer versions go through
    /// [`TypeRegistry::update_type_def`] or [`TypeRegistry::apply_patch`].
    pub fn register_type_def(&self, type_def: TypeDef, origin: TypeDefOrigin) -> Result<TypeDef> {
        let mode = self.settings.local_repository_mode;
        if origin == TypeDefOrigin::Local && !mode.may_originate_type_defs() {
            return Err(TypeRegistryError::NotPermitted {
                mode: mode.to_string(),
                operation: format!("originate type {}", type_def.name),
            });
        }

        type_def.validate()?;
        if let Some(existing) = self.get_by_guid(&type_def.guid) {
            return self.reconcile_existing(&existing, &type_def);
        }
        self.validate_links(&type_def)?;

        let mut stamped = type_def;
        if stamped.origin.is_none() {
            stamped.origin = Some(match &origin {
                TypeDefOrigin::Local => self.settings.metadata_collection_id.clone(),
                TypeDefOrigin::Cohort { metadata_collection_id } => metadata_collection_id.clone(),
            });
        }
        if stamped.created_by.is_none() {
            stamped.created_by = self.settings.default_user.clone();
        }
        if stamped.create_time.is_none() {
            stamped.create_time = Some(Utc::now());
        }

        match self.type_defs.entry(stamped.guid.clone()) {
            Entry::Occupied(entry) => {
                // Lost a race with an identical registration
                let existing = entry.get().clone();
                drop(entry);
                return self.reconcile_existing(&existing, &stamped);
            }
            Entry::Vacant(entry) => {
                entry.insert(stamped.clone());
            }
        }

        let holder = self
            .names
            .entry(stamped.name.clone())
            .or_insert_with(|| stamped.guid.clone())
            .clone();
        if holder != stamped.guid {
            self.record_conflict(&holder, &stamped.name, &stamped.name, Some(stamped.guid.clone()));
        }

        info!(
            name = %stamped.name,
            guid = %stamped.guid,
            category = %stamped.category(),
            version = stamped.version.version,
            "registered type"
        );
        Ok(stamped)
    }

    fn reconcile_existing(&self, existing: &TypeDef, candidate: &TypeDef) -> Result<TypeDef> {
        if existing.version == candidate.version && existing.fingerprint()? == candidate.fingerprint()? {
            return Ok(existing.clone());
        }
        Err(TypeRegistryError::AlreadyRegistered {
            guid: existing.guid.clone(),
            name: existing.name.clone(),
            version: existing.version.version,
        })
    }

    /// Accept a newer version of a known type supplied as a complete definition
    ///
    /// Only non-breaking evolutions are accepted; anything else is
    /// `InvalidTypeDefEvolution`, because a structural change must go through
    /// the patch process.
    pub fn update_type_def(&self, candidate: TypeDef) -> Result<TypeDef> {
        candidate.validate()?;
        let current = self
            .get_by_guid(&candidate.guid)
            .ok_or_else(|| TypeRegistryError::unresolved(&candidate.guid, &candidate.name))?;

        if !candidate.version.is_successor_of(&current.version) {
            if candidate.version == current.version && candidate.fingerprint()? == current.fingerprint()? {
                return Ok(current);
            }
            return Err(TypeRegistryError::invalid_evolution(
                &current.name,
                format!("version {} does not follow stored {}", candidate.version, current.version),
            ));
        }

        let report = self.checker.check(&current, &candidate)?;
        if !report.is_compatible {
            warn!(
                name = %current.name,
                guid = %current.guid,
                changes = %report.breaking_summary(),
                "rejected type update"
            );
            return Err(TypeRegistryError::invalid_evolution(&current.name, report.breaking_summary()));
        }
        self.validate_links(&candidate)?;
        self.check_added_attributes(&current, &candidate)?;

        self.commit(&current, candidate.clone())?;
        info!(
            name = %candidate.name,
            guid = %candidate.guid,
            version = candidate.version.version,
            "updated type"
        );
        Ok(candidate)
    }

    /// Apply a patch and store the resulting version
    pub fn apply_patch(&self, patch: &TypeDefPatch) -> Result<TypeDef> {
        let result = self.try_apply_patch(patch);
        match &result {
            Ok(next) => info!(
                patch = %patch.summary(),
                version = next.version.version,
                "applied patch"
            ),
            Err(e) => warn!(patch = %patch.summary(), error = %e, "patch rejected"),
        }
        result
    }

    fn try_apply_patch(&self, patch: &TypeDefPatch) -> Result<TypeDef> {
        let current = self
            .get_by_guid(&patch.type_def_guid)
            .ok_or_else(|| TypeRegistryError::unresolved(&patch.type_def_guid, &patch.type_name))?;

        if patch.action == TypeDefPatchAction::AddValidEntityDefs {
            for link in &patch.new_valid_entity_defs {
                self.require_category(&current.name, link, TypeDefCategory::EntityDef)?;
            }
        }

        let mut next = self.engine.apply(&current, patch)?;
        self.check_added_attributes(&current, &next)?;
        if next.updated_by.is_none() {
            next.updated_by = self.settings.default_user.clone();
        }
        self.commit(&current, next.clone())?;
        Ok(next)
    }

    /// Store `next` only if the stored version is still the one it was computed from
    fn commit(&self, base: &TypeDef, next: TypeDef) -> Result<()> {
        let mut stored = self
            .type_defs
            .get_mut(&base.guid)
            .ok_or_else(|| TypeRegistryError::unresolved(&base.guid, &base.name))?;
        if stored.version != base.version {
            return Err(TypeRegistryError::VersionConflict {
                guid: base.guid.clone(),
                type_name: base.name.clone(),
                apply_to_version: base.version.version,
                current_version: stored.version.version,
            });
        }
        *stored = next;
        Ok(())
    }

    /// Compare a peer's copy of a type with the local one
    pub fn verify_type_def(&self, remote: &TypeDef) -> Result<TypeDefVerification> {
        let Some(local) = self.get_by_guid(&remote.guid) else {
            return Ok(TypeDefVerification::Unknown);
        };
        if local.name != remote.name {
            self.record_conflict(&local.guid, &local.name, &remote.name, None);
            return Ok(TypeDefVerification::IdentityMismatch {
                local_name: local.name,
                remote_name: remote.name.clone(),
            });
        }
        if local.version != remote.version {
            return Ok(TypeDefVerification::VersionDiffers {
                local_version: local.version.version,
                remote_version: remote.version.version,
            });
        }
        let (local_sum, remote_sum) = (local.fingerprint()?, remote.fingerprint()?);
        if local_sum != remote_sum {
            warn!(name = %local.name, guid = %local.guid, "peer holds different content for the same version");
            return Ok(TypeDefVerification::ContentDiffers {
                local: local_sum,
                remote: remote_sum,
            });
        }
        Ok(TypeDefVerification::Verified)
    }

    // --- lookups ---

    pub fn get_by_guid(&self, guid: &str) -> Option<TypeDef> {
        self.type_defs.get(guid).map(|t| t.clone())
    }

    pub fn get_by_name(&self, name: &str) -> Option<TypeDef> {
        let guid = self.names.get(name).map(|g| g.clone())?;
        self.get_by_guid(&guid)
    }

    /// Resolve a link by guid; the name is only checked
    ///
    /// A name mismatch is recorded and logged, and the guid's definition is
    /// returned, unless strict resolution is configured. A link without a guid
    /// falls back to the name.
    pub fn resolve_link(&self, link: &TypeDefLink) -> Result<LinkResolution> {
        if link.guid.is_empty() {
            return self
                .get_by_name(&link.name)
                .map(|type_def| LinkResolution {
                    type_def,
                    conflict: None,
                })
                .ok_or_else(|| TypeRegistryError::unresolved(&link.guid, &link.name));
        }

        let type_def = self
            .get_by_guid(&link.guid)
            .ok_or_else(|| TypeRegistryError::unresolved(&link.guid, &link.name))?;
        if link.name.is_empty() || link.name == type_def.name {
            return Ok(LinkResolution {
                type_def,
                conflict: None,
            });
        }

        if self.settings.strict_link_resolution {
            return Err(TypeRegistryError::TypeDefIdentityConflict {
                guid: link.guid.clone(),
                expected_name: type_def.name.clone(),
                actual_name: link.name.clone(),
            });
        }
        let holder = self.names.get(&link.name).map(|g| g.clone()).filter(|g| *g != link.guid);
        let conflict = self.record_conflict(&link.guid, &type_def.name, &link.name, holder);
        Ok(LinkResolution {
            type_def,
            conflict: Some(conflict),
        })
    }

    /// Every attribute type and type definition, sorted by name
    pub fn gallery(&self) -> TypeDefGallery {
        let mut attribute_type_defs: Vec<AttributeTypeDef> =
            self.attribute_type_defs.iter().map(|a| a.value().clone()).collect();
        attribute_type_defs.sort_by(|a, b| a.name.cmp(&b.name));
        let mut type_defs: Vec<TypeDef> = self.type_defs.iter().map(|t| t.value().clone()).collect();
        type_defs.sort_by(|a, b| a.name.cmp(&b.name));
        TypeDefGallery {
            attribute_type_defs,
            type_defs,
        }
    }

    pub fn summaries(&self) -> Vec<TypeDefSummary> {
        let mut summaries: Vec<TypeDefSummary> = self.type_defs.iter().map(|t| t.summary()).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Supertype graph over the current contents
    pub fn hierarchy(&self) -> TypeHierarchy {
        let type_defs: Vec<TypeDef> = self.type_defs.iter().map(|t| t.value().clone()).collect();
        TypeHierarchy::build(&type_defs)
    }

    pub fn identity_conflicts(&self) -> Vec<IdentityConflict> {
        self.conflicts.lock().clone()
    }

    fn record_conflict(
        &self,
        guid: &str,
        expected_name: &str,
        actual_name: &str,
        conflicting_guid: Option<String>,
    ) -> IdentityConflict {
        let conflict = IdentityConflict {
            guid: guid.to_string(),
            expected_name: expected_name.to_string(),
            actual_name: actual_name.to_string(),
            conflicting_guid,
            detected_at: Utc::now(),
        };
        warn!(
            guid = %conflict.guid,
            expected = %conflict.expected_name,
            actual = %conflict.actual_name,
            other_guid = ?conflict.conflicting_guid,
            "type identity conflict"
        );
        self.conflicts.lock().push(conflict.clone());
        conflict
    }

    // --- cross-type checks ---

    fn require_category(&self, owner: &str, link: &TypeDefLink, category: TypeDefCategory) -> Result<TypeDef> {
        let resolved = self.resolve_link(link)?.type_def;
        if resolved.category() != category {
            return Err(TypeRegistryError::invalid(
                owner,
                format!("{} is a {}, expected a {}", link, resolved.category(), category),
            ));
        }
        Ok(resolved)
    }

    /// Checks that need other registered types
    fn validate_links(&self, type_def: &TypeDef) -> Result<()> {
        if let Some(super_type) = &type_def.super_type {
            self.require_category(&type_def.name, super_type, type_def.category())?;
        }

        match &type_def.kind {
            TypeDefKind::Entity => {}
            TypeDefKind::Relationship(relationship) => {
                for end in [&relationship.end_def1, &relationship.end_def2] {
                    self.require_category(&type_def.name, &end.entity_type, TypeDefCategory::EntityDef)?;
                }
            }
            TypeDefKind::Classification(classification) => {
                for link in &classification.valid_entity_defs {
                    self.require_category(&type_def.name, link, TypeDefCategory::EntityDef)?;
                }
            }
        }

        let declared: HashSet<&str> = type_def
            .properties_definition
            .iter()
            .map(|a| a.attribute_name.as_str())
            .collect();
        let mut seen = HashSet::new();
        seen.insert(type_def.guid.clone());
        let mut next = type_def.super_type.clone();
        while let Some(link) = next {
            if !seen.insert(link.guid.clone()) {
                return Err(TypeRegistryError::invalid(&type_def.name, "supertype chain is cyclic"));
            }
            let Some(ancestor) = self.get_by_guid(&link.guid) else {
                break;
            };
            if let Some(clash) = ancestor
                .properties_definition
                .iter()
                .find(|a| declared.contains(a.attribute_name.as_str()))
            {
                return Err(TypeRegistryError::invalid(
                    &type_def.name,
                    format!("attribute {} is already inherited from {}", clash.attribute_name, ancestor.name),
                ));
            }
            next = ancestor.super_type;
        }
        Ok(())
    }
}

impl TypeRegistry {
    /// Attribute names introduced by `next` must stay unique across the whole
    /// supertype chain, above and below the type
    fn check_added_attributes(&self, current: &TypeDef, next: &TypeDef) -> Result<()> {
        let added: HashSet<&str> = next
            .properties_definition
            .iter()
            .map(|a| a.attribute_name.as_str())
            .filter(|name| current.attribute(name).is_none())
            .collect();
        if added.is_empty() {
            return Ok(());
        }

        let ancestors = self.ancestors_of(&next.guid, &next.name);
        let descendants = self.hierarchy().descendants(&next.guid);
        for link in ancestors.iter().chain(descendants.iter()) {
            let Some(related) = self.get_by_guid(&link.guid) else {
                continue;
            };
            if let Some(clash) = related
                .properties_definition
                .iter()
                .find(|a| added.contains(a.attribute_name.as_str()))
            {
                return Err(TypeRegistryError::invalid(
                    &next.name,
                    format!("attribute {} is already declared by {}", clash.attribute_name, related.name),
                ));
            }
        }
        Ok(())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}

impl TypeAncestry for TypeRegistry {
    fn ancestors_of(&self, type_guid: &str, type_name: &str) -> Vec<TypeDefLink> {
        let by_guid = if type_guid.is_empty() { None } else { self.get_by_guid(type_guid) };
        // A peer's guid may be unknown here while the name is not
        let start = by_guid.or_else(|| self.get_by_name(type_name));
        let mut result = Vec::new();
        let mut next = start.and_then(|t| t.super_type);
        while let Some(link) = next {
            if result.len() >= self.type_defs.len() {
                break;
            }
            next = self.get_by_guid(&link.guid).and_then(|t| t.super_type);
            result.push(link);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeTypeCategory, EnumElementDef, PrimitiveDefCategory};
    use crate::cardinality::{ClassificationPropagationRule, RelationshipEndCardinality};
    use crate::typedef::{RelationshipEndDef, TypeDefAttribute};
    use crate::version::TypeVersion;

    fn string() -> AttributeTypeDef {
        AttributeTypeCatalog::new().primitive(PrimitiveDefCategory::String)
    }

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::with_standard_types(RegistrySettings::default()).unwrap();
        registry
            .register_type_def(TypeDef::entity("g-referenceable", "Referenceable")
                .with_attribute(TypeDefAttribute::new("qualifiedName", string())), TypeDefOrigin::Local)
            .unwrap();
        registry
            .register_type_def(
                TypeDef::entity("g-asset", "Asset")
                    .with_super_type(TypeDefLink::new("g-referenceable", "Referenceable"))
                    .with_attribute(TypeDefAttribute::new("name", string())),
                TypeDefOrigin::Local,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_register_stamps_audit_fields() {
        let registry = registry();
        let asset = registry.get_by_name("Asset").unwrap();
        assert_eq!(asset.origin.as_deref(), Some("local-metadata-collection"));
        assert!(asset.create_time.is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = registry();
        let again = TypeDef::entity("g-referenceable", "Referenceable")
            .with_attribute(TypeDefAttribute::new("qualifiedName", string()));
        assert!(registry.register_type_def(again, TypeDefOrigin::Local).is_ok());

        let different = TypeDef::entity("g-referenceable", "Referenceable");
        let err = registry.register_type_def(different, TypeDefOrigin::Local).unwrap_err();
        assert!(matches!(err, TypeRegistryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_mode_gates_local_origination() {
        let settings = RegistrySettings {
            local_repository_mode: LocalRepositoryMode::RepositoryProxy,
            ..RegistrySettings::default()
        };
        let registry = TypeRegistry::new(settings);
        let err = registry
            .register_type_def(TypeDef::entity("g-a", "A"), TypeDefOrigin::Local)
            .unwrap_err();
        assert!(matches!(err, TypeRegistryError::NotPermitted { .. }));

        let cohort = TypeDefOrigin::Cohort {
            metadata_collection_id: "peer".to_string(),
        };
        let stored = registry.register_type_def(TypeDef::entity("g-a", "A"), cohort).unwrap();
        assert_eq!(stored.origin.as_deref(), Some("peer"));
    }

    #[test]
    fn test_super_type_must_share_category() {
        let registry = registry();
        let bad = TypeDef::classification("g-c", "Confidentiality", vec![], false)
            .with_super_type(TypeDefLink::new("g-asset", "Asset"));
        let err = registry.register_type_def(bad, TypeDefOrigin::Local).unwrap_err();
        assert!(matches!(err, TypeRegistryError::InvalidTypeDef { .. }));
    }

    #[test]
    fn test_unknown_super_type_is_deferred() {
        let registry = registry();
        let orphan = TypeDef::entity("g-table", "Table").with_super_type(TypeDefLink::new("g-data-set", "DataSet"));
        let err = registry.register_type_def(orphan, TypeDefOrigin::Local).unwrap_err();
        assert!(matches!(err, TypeRegistryError::UnresolvedTypeLink { .. }));
    }

    #[test]
    fn test_inherited_attribute_clash() {
        let registry = registry();
        let clash = TypeDef::entity("g-data-set", "DataSet")
            .with_super_type(TypeDefLink::new("g-asset", "Asset"))
            .with_attribute(TypeDefAttribute::new("qualifiedName", string()));
        let err = registry.register_type_def(clash, TypeDefOrigin::Local).unwrap_err();
        assert!(err.to_string().contains("inherited from Referenceable"));
    }

    #[test]
    fn test_relationship_ends_must_be_entities() {
        let registry = registry();
        registry
            .register_type_def(
                TypeDef::classification("g-c", "Confidentiality", vec![], true),
                TypeDefOrigin::Local,
            )
            .unwrap();
        let end = |guid: &str, name: &str, attr: &str| {
            RelationshipEndDef::new(TypeDefLink::new(guid, name), attr, RelationshipEndCardinality::AnyNumber)
        };

        let good = TypeDef::relationship(
            "g-r",
            "AssetLink",
            end("g-asset", "Asset", "linkedFrom"),
            end("g-asset", "Asset", "linkedTo"),
            ClassificationPropagationRule::None,
        );
        assert!(registry.register_type_def(good, TypeDefOrigin::Local).is_ok());

        let bad = TypeDef::relationship(
            "g-r2",
            "Weird",
            end("g-asset", "Asset", "a"),
            end("g-c", "Confidentiality", "b"),
            ClassificationPropagationRule::None,
        );
        assert!(registry.register_type_def(bad, TypeDefOrigin::Local).is_err());
    }

    #[test]
    fn test_guid_wins_on_name_mismatch() {
        let registry = registry();
        let resolution = registry.resolve_link(&TypeDefLink::new("g-asset", "Process")).unwrap();
        assert_eq!(resolution.type_def.name, "Asset");
        let conflict = resolution.conflict.unwrap();
        assert_eq!(conflict.expected_name, "Asset");
        assert_eq!(conflict.actual_name, "Process");
        assert_eq!(registry.identity_conflicts().len(), 1);
    }

    #[test]
    fn test_strict_resolution_fails_on_mismatch() {
        let registry = TypeRegistry::new(RegistrySettings {
            strict_link_resolution: true,
            ..RegistrySettings::default()
        });
        registry
            .register_type_def(TypeDef::entity("g-asset", "Asset"), TypeDefOrigin::Local)
            .unwrap();
        let err = registry.resolve_link(&TypeDefLink::new("g-asset", "Process")).unwrap_err();
        assert!(matches!(err, TypeRegistryError::TypeDefIdentityConflict { .. }));
        assert!(registry.resolve_link(&TypeDefLink::new("", "Asset")).is_ok());
    }

    #[test]
    fn test_name_clash_keeps_first() {
        let registry = registry();
        let imposter = TypeDef::entity("g-other-asset", "Asset");
        registry
            .register_type_def(imposter, TypeDefOrigin::Cohort { metadata_collection_id: "peer".into() })
            .unwrap();
        assert_eq!(registry.get_by_name("Asset").unwrap().guid, "g-asset");
        assert!(registry.get_by_guid("g-other-asset").is_some());
        assert_eq!(registry.identity_conflicts()[0].conflicting_guid.as_deref(), Some("g-other-asset"));
    }

    #[test]
    fn test_update_type_def_accepts_compatible_version() {
        let registry = registry();
        let mut next = registry.get_by_name("Asset").unwrap();
        next.version = TypeVersion::new(2, "1.1");
        next.properties_definition.push(TypeDefAttribute::new("owner", string()));
        assert_eq!(registry.update_type_def(next).unwrap().version.version, 2);

        let mut breaking = registry.get_by_name("Asset").unwrap();
        breaking.version = TypeVersion::new(3, "2.0");
        breaking.properties_definition.clear();
        let err = registry.update_type_def(breaking).unwrap_err();
        assert!(matches!(err, TypeRegistryError::InvalidTypeDefEvolution { .. }));
    }

    #[test]
    fn test_update_type_def_refuses_category_change() {
        let registry = registry();
        let mut changed = TypeDef::classification("g-asset", "Asset", vec![], false);
        changed.super_type = None;
        changed.version = TypeVersion::new(2, "2.0");
        let err = registry.update_type_def(changed).unwrap_err();
        assert!(matches!(err, TypeRegistryError::InvalidTypeDefEvolution { .. }));
    }

    #[test]
    fn test_apply_patch_commits_version() {
        let registry = registry();
        let asset = registry.get_by_name("Asset").unwrap();
        let patch = TypeDefPatch::new(TypeDefPatchAction::AddAttributes, &asset, "1.1")
            .with_attributes(vec![TypeDefAttribute::new("owner", string())]);
        let next = registry.apply_patch(&patch).unwrap();
        assert_eq!(next.version.version, 2);
        assert_eq!(registry.get_by_guid("g-asset").unwrap().version.version, 2);

        let err = registry.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, TypeRegistryError::VersionConflict { .. }));
    }

    #[test]
    fn test_patch_cannot_shadow_inherited_attribute() {
        let registry = registry();
        let asset = registry.get_by_name("Asset").unwrap();
        let patch = TypeDefPatch::new(TypeDefPatchAction::AddAttributes, &asset, "1.1")
            .with_attributes(vec![TypeDefAttribute::new("qualifiedName", string())]);
        let err = registry.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, TypeRegistryError::InvalidTypeDef { .. }));

        let rename = TypeDefPatch::new(TypeDefPatchAction::RenameAttributes, &asset, "1.1")
            .with_rename("name", "qualifiedName");
        assert!(registry.apply_patch(&rename).is_err());
        assert_eq!(registry.get_by_guid("g-asset").unwrap().version.version, 1);
    }

    #[test]
    fn test_patch_cannot_duplicate_subtype_attribute() {
        let registry = registry();
        let referenceable = registry.get_by_name("Referenceable").unwrap();
        let patch = TypeDefPatch::new(TypeDefPatchAction::AddAttributes, &referenceable, "1.1")
            .with_attributes(vec![TypeDefAttribute::new("name", string())]);
        let err = registry.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, TypeRegistryError::InvalidTypeDef { .. }));
        assert_eq!(registry.get_by_guid("g-referenceable").unwrap().version.version, 1);

        let unrelated = TypeDefPatch::new(TypeDefPatchAction::AddAttributes, &referenceable, "1.1")
            .with_attributes(vec![TypeDefAttribute::new("displayName", string())]);
        assert_eq!(registry.apply_patch(&unrelated).unwrap().version.version, 2);
    }

    #[test]
    fn test_update_cannot_duplicate_subtype_attribute() {
        let registry = registry();
        let referenceable = registry.get_by_name("Referenceable").unwrap();
        let candidate = referenceable
            .clone()
            .with_version(TypeVersion::new(2, "1.1"))
            .with_attribute(TypeDefAttribute::new("name", string()));
        assert!(registry.update_type_def(candidate).is_err());
    }

    #[test]
    fn test_patch_unknown_type_is_unresolved() {
        let registry = registry();
        let patch = TypeDefPatch::for_version(TypeDefPatchAction::AddOptions, "g-nope", "Nope", 1, "1.1")
            .with_option("a", "b");
        let err = registry.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, TypeRegistryError::UnresolvedTypeLink { .. }));
    }

    #[test]
    fn test_verify_type_def() {
        let registry = registry();
        let local = registry.get_by_name("Asset").unwrap();

        let mut peer_copy = local.clone();
        peer_copy.origin = Some("peer".to_string());
        assert!(registry.verify_type_def(&peer_copy).unwrap().is_verified());

        let drifted = local.clone().with_option("anchor", "true");
        assert!(matches!(
            registry.verify_type_def(&drifted).unwrap(),
            TypeDefVerification::ContentDiffers { .. }
        ));

        let renamed = TypeDef { name: "Thing".to_string(), ..local };
        assert!(matches!(
            registry.verify_type_def(&renamed).unwrap(),
            TypeDefVerification::IdentityMismatch { .. }
        ));
        assert_eq!(
            registry.verify_type_def(&TypeDef::entity("g-x", "X")).unwrap(),
            TypeDefVerification::Unknown
        );
    }

    #[test]
    fn test_enum_attribute_type_evolution() {
        let registry = TypeRegistry::default();
        let v1 = AttributeTypeDef::new(
            "g-enum",
            "KeyPattern",
            AttributeTypeCategory::Enum {
                elements: vec![EnumElementDef::new(0, "LocalKey"), EnumElementDef::new(1, "GlobalKey")],
                default_value: Some(0),
            },
        );
        registry.register_attribute_type_def(v1.clone()).unwrap();

        let mut removed = v1.clone().with_version(TypeVersion::new(2, "2"));
        if let AttributeTypeCategory::Enum { elements, .. } = &mut removed.category {
            elements.pop();
        }
        assert!(registry.register_attribute_type_def(removed).is_err());

        let mut added = v1.with_version(TypeVersion::new(2, "2"));
        if let AttributeTypeCategory::Enum { elements, .. } = &mut added.category {
            elements.push(EnumElementDef::new(2, "NaturalKey"));
        }
        registry.register_attribute_type_def(added).unwrap();
        assert_eq!(registry.attribute_type_by_name("KeyPattern").unwrap().version.version, 2);
    }

    #[test]
    fn test_ancestry_and_hierarchy_agree() {
        let registry = registry();
        let from_registry = registry.ancestors_of("g-asset", "Asset");
        let from_graph = registry.hierarchy().ancestors("g-asset", "Asset");
        assert_eq!(from_registry, from_graph);
        assert_eq!(from_registry[0].name, "Referenceable");

        // A peer's guid for a type known here by name
        let from_registry = registry.ancestors_of("peer-asset-guid", "Asset");
        let from_graph = registry.hierarchy().ancestors("peer-asset-guid", "Asset");
        assert_eq!(from_registry, from_graph);
        assert_eq!(from_registry.len(), 1);
    }

    #[test]
    fn test_gallery_sorted_by_name() {
        let registry = registry();
        let gallery = registry.gallery();
        let names: Vec<&str> = gallery.type_defs.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Asset", "Referenceable"]);
        assert_eq!(gallery.attribute_type_defs.len(), 12);
        assert_eq!(registry.summaries().len(), 2);
    }
}
