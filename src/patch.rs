//! Patch engine
//!
//! Applies a [`TypeDefPatch`] to the current version of a type definition and
//! produces the next version. Only non-breaking evolutions are accepted: a
//! patch never deletes an attribute, changes an attribute's declared type or
//! narrows a cardinality, because instances created under the previous
//! version must stay valid.
//!
//! The engine is a pure function of the current definition and the patch;
//! optimistic concurrency against the stored version is enforced here and
//! committed atomically by the registry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{Result, TypeRegistryError};
use crate::evolution::{cardinality_change_allowed, EvolutionChecker};
use crate::typedef::{
    ExternalStandardMapping, InstanceStatus, TypeDef, TypeDefAttribute, TypeDefAttributeStatus,
    TypeDefCategory, TypeDefKind, TypeDefLink,
};
use crate::version::TypeVersion;

/// What a patch does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDefPatchAction {
    AddAttributes,
    /// Non-breaking edits to existing attributes
    UpdateAttributes,
    DeprecateAttributes,
    RenameAttributes,
    /// Never accepted; present so the request can be expressed and refused
    DeleteAttributes,
    AddOptions,
    UpdateOptions,
    DeleteOptions,
    AddExternalStandards,
    UpdateExternalStandards,
    DeleteExternalStandards,
    UpdateDescriptions,
    AddValidInstanceStatuses,
    /// ClassificationDef only
    AddValidEntityDefs,
}

impl TypeDefPatchAction {
    /// Whether the action may be applied to a type of this category
    pub fn permitted_for(&self, category: TypeDefCategory) -> bool {
        match self {
            TypeDefPatchAction::DeleteAttributes => false,
            TypeDefPatchAction::AddValidEntityDefs => category == TypeDefCategory::ClassificationDef,
            _ => category != TypeDefCategory::Unknown,
        }
    }
}

/// Renaming of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRename {
    pub attribute_name: String,
    pub new_attribute_name: String,
}

/// Replacement description for one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescription {
    pub attribute_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_guid: Option<String>,
}

/// A requested evolution of one type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefPatch {
    pub action: TypeDefPatchAction,
    #[serde(rename = "typeDefGUID")]
    pub type_def_guid: String,
    pub type_name: String,
    /// Must equal the stored version of the target
    pub apply_to_version: i64,
    /// Must be strictly greater than `apply_to_version`
    pub update_to_version: i64,
    #[serde(default)]
    pub new_version_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    /// AddAttributes / UpdateAttributes
    #[serde(default)]
    pub new_attributes: Vec<TypeDefAttribute>,
    /// DeprecateAttributes / DeleteAttributes
    #[serde(default)]
    pub attribute_names: Vec<String>,
    #[serde(default)]
    pub attribute_renames: Vec<AttributeRename>,
    /// AddOptions / UpdateOptions set these entries; DeleteOptions removes the keys
    #[serde(default)]
    pub new_options: BTreeMap<String, String>,
    #[serde(default)]
    pub new_external_standard_mappings: Vec<ExternalStandardMapping>,
    #[serde(default)]
    pub new_valid_instance_status_list: Vec<InstanceStatus>,
    #[serde(default)]
    pub new_valid_entity_defs: Vec<TypeDefLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_guid: Option<String>,
    #[serde(default)]
    pub attribute_descriptions: Vec<AttributeDescription>,
}

impl TypeDefPatch {
    /// A patch moving `target` from its current version to the next one
    pub fn new(action: TypeDefPatchAction, target: &TypeDef, new_version_name: impl Into<String>) -> Self {
        Self::for_version(action, &target.guid, &target.name, target.version.version, new_version_name)
    }

    /// A patch against a known guid and stored version
    pub fn for_version(
        action: TypeDefPatchAction,
        type_def_guid: impl Into<String>,
        type_name: impl Into<String>,
        apply_to_version: i64,
        new_version_name: impl Into<String>,
    ) -> Self {
        Self {
            action,
            type_def_guid: type_def_guid.into(),
            type_name: type_name.into(),
            apply_to_version,
            update_to_version: apply_to_version + 1,
            new_version_name: new_version_name.into(),
            updated_by: None,
            new_attributes: Vec::new(),
            attribute_names: Vec::new(),
            attribute_renames: Vec::new(),
            new_options: BTreeMap::new(),
            new_external_standard_mappings: Vec::new(),
            new_valid_instance_status_list: Vec::new(),
            new_valid_entity_defs: Vec::new(),
            description: None,
            description_guid: None,
            attribute_descriptions: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<TypeDefAttribute>) -> Self {
        self.new_attributes = attributes;
        self
    }

    pub fn with_attribute_names(mut self, names: Vec<String>) -> Self {
        self.attribute_names = names;
        self
    }

    pub fn with_rename(mut self, attribute_name: impl Into<String>, new_attribute_name: impl Into<String>) -> Self {
        self.attribute_renames.push(AttributeRename {
            attribute_name: attribute_name.into(),
            new_attribute_name: new_attribute_name.into(),
        });
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.new_options.insert(key.into(), value.into());
        self
    }

    pub fn with_external_standards(mut self, mappings: Vec<ExternalStandardMapping>) -> Self {
        self.new_external_standard_mappings = mappings;
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<InstanceStatus>) -> Self {
        self.new_valid_instance_status_list = statuses;
        self
    }

    pub fn with_valid_entity_defs(mut self, links: Vec<TypeDefLink>) -> Self {
        self.new_valid_entity_defs = links;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attribute_description(
        mut self,
        attribute_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.attribute_descriptions.push(AttributeDescription {
            attribute_name: attribute_name.into(),
            description: description.into(),
            description_guid: None,
        });
        self
    }

    pub fn updated_by(mut self, user: impl Into<String>) -> Self {
        self.updated_by = Some(user.into());
        self
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        format!(
            "{:?} on {} ({}) v{} -> v{}",
            self.action, self.type_name, self.type_def_guid, self.apply_to_version, self.update_to_version
        )
    }
}

/// Applies patches to type definitions
#[derive(Default)]
pub struct PatchEngine {
    checker: EvolutionChecker,
}

impl PatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next version of `current`, or explain why the patch is refused
    pub fn apply(&self, current: &TypeDef, patch: &TypeDefPatch) -> Result<TypeDef> {
        if patch.type_def_guid != current.guid {
            return Err(TypeRegistryError::invalid_patch(
                &current.name,
                format!("patch targets {} but was applied to {}", patch.type_def_guid, current.guid),
            ));
        }
        if patch.type_name != current.name {
            warn!(
                guid = %current.guid,
                patch_name = %patch.type_name,
                stored_name = %current.name,
                "patch names a different type; guid is authoritative"
            );
        }

        if patch.apply_to_version != current.version.version {
            return Err(TypeRegistryError::VersionConflict {
                guid: current.guid.clone(),
                type_name: current.name.clone(),
                apply_to_version: patch.apply_to_version,
                current_version: current.version.version,
            });
        }
        if patch.update_to_version <= patch.apply_to_version {
            return Err(TypeRegistryError::invalid_patch(
                &current.name,
                format!(
                    "updateToVersion {} must be greater than applyToVersion {}",
                    patch.update_to_version, patch.apply_to_version
                ),
            ));
        }

        if !patch.action.permitted_for(current.category()) {
            return Err(TypeRegistryError::unsupported(
                &current.name,
                format!("{:?} is not permitted on a {}", patch.action, current.category()),
            ));
        }

        let mut next = current.clone();
        self.merge(&mut next, patch)?;

        let report = self.checker.check(current, &next)?;
        if !report.is_compatible {
            return Err(TypeRegistryError::unsupported(&current.name, report.breaking_summary()));
        }

        next.version = TypeVersion::new(patch.update_to_version, patch.new_version_name.clone());
        next.updated_by = patch.updated_by.clone().or(next.updated_by);
        next.update_time = Some(Utc::now());
        next.validate()?;
        Ok(next)
    }

    fn merge(&self, next: &mut TypeDef, patch: &TypeDefPatch) -> Result<()> {
        let name = next.name.clone();
        match patch.action {
            TypeDefPatchAction::AddAttributes => {
                require_content(&name, patch.new_attributes.is_empty(), "no attributes to add")?;
                for attribute in &patch.new_attributes {
                    if next.attribute(&attribute.attribute_name).is_some() {
                        return Err(TypeRegistryError::invalid_patch(
                            &name,
                            format!("attribute {} already exists", attribute.attribute_name),
                        ));
                    }
                    next.properties_definition.push(attribute.clone());
                }
            }
            TypeDefPatchAction::UpdateAttributes => {
                require_content(&name, patch.new_attributes.is_empty(), "no attributes to update")?;
                for attribute in &patch.new_attributes {
                    let slot = attribute_slot(next, &attribute.attribute_name)?;
                    if !cardinality_change_allowed(slot.cardinality, attribute.cardinality) {
                        return Err(TypeRegistryError::unsupported(
                            &name,
                            format!(
                                "cardinality of {} cannot move from {:?} to {:?}",
                                attribute.attribute_name, slot.cardinality, attribute.cardinality
                            ),
                        ));
                    }
                    *slot = attribute.clone();
                }
            }
            TypeDefPatchAction::DeprecateAttributes => {
                require_content(&name, patch.attribute_names.is_empty(), "no attributes to deprecate")?;
                for attribute_name in &patch.attribute_names {
                    let slot = attribute_slot(next, attribute_name)?;
                    if slot.attribute_status == TypeDefAttributeStatus::Renamed {
                        return Err(TypeRegistryError::invalid_patch(
                            &name,
                            format!("attribute {} has been renamed", attribute_name),
                        ));
                    }
                    slot.attribute_status = TypeDefAttributeStatus::Deprecated;
                }
            }
            TypeDefPatchAction::RenameAttributes => {
                require_content(&name, patch.attribute_renames.is_empty(), "no attributes to rename")?;
                for rename in &patch.attribute_renames {
                    if next.attribute(&rename.new_attribute_name).is_some() {
                        return Err(TypeRegistryError::invalid_patch(
                            &name,
                            format!("attribute {} already exists", rename.new_attribute_name),
                        ));
                    }
                    let slot = attribute_slot(next, &rename.attribute_name)?;
                    if slot.attribute_status == TypeDefAttributeStatus::Renamed {
                        return Err(TypeRegistryError::invalid_patch(
                            &name,
                            format!("attribute {} has already been renamed", rename.attribute_name),
                        ));
                    }
                    let mut replacement = slot.clone();
                    slot.attribute_status = TypeDefAttributeStatus::Renamed;
                    slot.replaced_by_attribute = Some(rename.new_attribute_name.clone());

                    replacement.attribute_name = rename.new_attribute_name.clone();
                    replacement.attribute_status = TypeDefAttributeStatus::Active;
                    replacement.replaced_by_attribute = None;
                    next.properties_definition.push(replacement);
                }
            }
            TypeDefPatchAction::DeleteAttributes => {
                return Err(TypeRegistryError::unsupported(
                    &name,
                    "attributes cannot be deleted; deprecate or rename them instead",
                ));
            }
            TypeDefPatchAction::AddOptions => {
                require_content(&name, patch.new_options.is_empty(), "no options to add")?;
                for (key, value) in &patch.new_options {
                    if next.options.contains_key(key) {
                        return Err(TypeRegistryError::invalid_patch(&name, format!("option {} already set", key)));
                    }
                    next.options.insert(key.clone(), value.clone());
                }
            }
            TypeDefPatchAction::UpdateOptions => {
                require_content(&name, patch.new_options.is_empty(), "no options to update")?;
                for (key, value) in &patch.new_options {
                    match next.options.get_mut(key) {
                        Some(slot) => *slot = value.clone(),
                        None => {
                            return Err(TypeRegistryError::invalid_patch(&name, format!("option {} is not set", key)))
                        }
                    }
                }
            }
            TypeDefPatchAction::DeleteOptions => {
                require_content(&name, patch.new_options.is_empty(), "no options to delete")?;
                for key in patch.new_options.keys() {
                    if next.options.remove(key).is_none() {
                        return Err(TypeRegistryError::invalid_patch(&name, format!("option {} is not set", key)));
                    }
                }
            }
            TypeDefPatchAction::AddExternalStandards => {
                require_content(
                    &name,
                    patch.new_external_standard_mappings.is_empty(),
                    "no external standards to add",
                )?;
                for mapping in &patch.new_external_standard_mappings {
                    if next.external_standard_mappings.iter().any(|m| m.same_target(mapping)) {
                        return Err(TypeRegistryError::invalid_patch(
                            &name,
                            format!("mapping to {}:{} already exists", mapping.standard_name, mapping.standard_type_name),
                        ));
                    }
                    next.external_standard_mappings.push(mapping.clone());
                }
            }
            TypeDefPatchAction::UpdateExternalStandards => {
                require_content(
                    &name,
                    patch.new_external_standard_mappings.is_empty(),
                    "no external standards to update",
                )?;
                for mapping in &patch.new_external_standard_mappings {
                    let slot = next
                        .external_standard_mappings
                        .iter_mut()
                        .find(|m| m.same_target(mapping))
                        .ok_or_else(|| {
                            TypeRegistryError::invalid_patch(
                                &name,
                                format!("no mapping to {}:{}", mapping.standard_name, mapping.standard_type_name),
                            )
                        })?;
                    *slot = mapping.clone();
                }
            }
            TypeDefPatchAction::DeleteExternalStandards => {
                require_content(
                    &name,
                    patch.new_external_standard_mappings.is_empty(),
                    "no external standards to delete",
                )?;
                for mapping in &patch.new_external_standard_mappings {
                    let before = next.external_standard_mappings.len();
                    next.external_standard_mappings.retain(|m| !m.same_target(mapping));
                    if next.external_standard_mappings.len() == before {
                        return Err(TypeRegistryError::invalid_patch(
                            &name,
                            format!("no mapping to {}:{}", mapping.standard_name, mapping.standard_type_name),
                        ));
                    }
                }
            }
            TypeDefPatchAction::UpdateDescriptions => {
                require_content(
                    &name,
                    patch.description.is_none()
                        && patch.description_guid.is_none()
                        && patch.attribute_descriptions.is_empty(),
                    "no descriptions to update",
                )?;
                if patch.description.is_some() {
                    next.description = patch.description.clone();
                }
                if patch.description_guid.is_some() {
                    next.description_guid = patch.description_guid.clone();
                }
                for update in &patch.attribute_descriptions {
                    let slot = attribute_slot(next, &update.attribute_name)?;
                    slot.attribute_description = Some(update.description.clone());
                    if update.description_guid.is_some() {
                        slot.attribute_description_guid = update.description_guid.clone();
                    }
                }
            }
            TypeDefPatchAction::AddValidInstanceStatuses => {
                require_content(
                    &name,
                    patch.new_valid_instance_status_list.is_empty(),
                    "no instance statuses to add",
                )?;
                for status in &patch.new_valid_instance_status_list {
                    if !next.valid_instance_status_list.contains(status) {
                        next.valid_instance_status_list.push(*status);
                    }
                }
            }
            TypeDefPatchAction::AddValidEntityDefs => {
                require_content(&name, patch.new_valid_entity_defs.is_empty(), "no entity types to add")?;
                match &mut next.kind {
                    TypeDefKind::Classification(classification) => {
                        for link in &patch.new_valid_entity_defs {
                            if !classification.valid_entity_defs.iter().any(|l| l.guid == link.guid) {
                                classification.valid_entity_defs.push(link.clone());
                            }
                        }
                    }
                    _ => {
                        return Err(TypeRegistryError::unsupported(
                            &name,
                            "valid entity types can only be added to a classification",
                        ))
                    }
                }
            }
        }
        Ok(())
    }
}

fn require_content(type_name: &str, empty: bool, reason: &str) -> Result<()> {
    if empty {
        Err(TypeRegistryError::invalid_patch(type_name, reason))
    } else {
        Ok(())
    }
}

fn attribute_slot<'a>(type_def: &'a mut TypeDef, attribute_name: &str) -> Result<&'a mut TypeDefAttribute> {
    let type_name = type_def.name.clone();
    type_def
        .properties_definition
        .iter_mut()
        .find(|a| a.attribute_name == attribute_name)
        .ok_or_else(|| TypeRegistryError::invalid_patch(type_name, format!("no attribute named {}", attribute_name)))
}
