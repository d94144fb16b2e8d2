//! Type definition evolution checking
//!
//! Compares two versions of the same type definition and classifies every
//! difference as breaking or not. A change is breaking when an instance that
//! was valid under the old version could be invalid, or read differently,
//! under the new one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::cardinality::AttributeCardinality;
use crate::error::{Result, TypeRegistryError};
use crate::typedef::{
    ClassificationDef, RelationshipDef, RelationshipEndDef, TypeDef, TypeDefAttribute,
    TypeDefAttributeStatus, TypeDefKind,
};

/// Result of an evolution check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionReport {
    /// Whether the new version can replace the old one
    pub is_compatible: bool,
    /// Whether any change is breaking
    pub is_breaking: bool,
    /// List of changes detected
    pub changes: Vec<TypeDefChange>,
    /// Summary of the check
    pub summary: String,
}

impl EvolutionReport {
    pub fn compatible(changes: Vec<TypeDefChange>) -> Self {
        let summary = if changes.is_empty() {
            "No changes detected".to_string()
        } else {
            format!("{} compatible changes detected", changes.len())
        };
        Self {
            is_compatible: true,
            is_breaking: false,
            changes,
            summary,
        }
    }

    pub fn incompatible(changes: Vec<TypeDefChange>, reason: impl Into<String>) -> Self {
        Self {
            is_compatible: false,
            is_breaking: true,
            changes,
            summary: reason.into(),
        }
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &TypeDefChange> {
        self.changes.iter().filter(|c| c.is_breaking)
    }

    /// Breaking change descriptions joined for an error message
    pub fn breaking_summary(&self) -> String {
        self.breaking_changes()
            .map(|c| c.description.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn has_change(&self, change_type: ChangeType) -> bool {
        self.changes.iter().any(|c| c.change_type == change_type)
    }
}

/// A detected difference between two versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefChange {
    pub change_type: ChangeType,
    /// Path to the changed element (e.g., "properties.owner.cardinality")
    pub path: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub is_breaking: bool,
    pub description: String,
}

impl TypeDefChange {
    fn new(change_type: ChangeType, path: impl Into<String>, is_breaking: bool, description: impl Into<String>) -> Self {
        Self {
            change_type,
            path: path.into(),
            old_value: None,
            new_value: None,
            is_breaking,
            description: description.into(),
        }
    }

    fn values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }
}

/// Kind of difference between two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    TypeRenamed,
    CategoryChanged,
    SuperTypeChanged,
    AttributeAdded,
    AttributeRemoved,
    AttributeTypeChanged,
    CardinalityNarrowed,
    CardinalityWidened,
    ValueCountChanged,
    UniquenessChanged,
    AttributeStatusChanged,
    DefaultChanged,
    IndexingChanged,
    DocumentationChanged,
    ValidStatusAdded,
    ValidStatusRemoved,
    InitialStatusChanged,
    OptionsChanged,
    ExternalStandardsChanged,
    RelationshipEndChanged,
    PropagationChanged,
    ValidEntityAdded,
    ValidEntityRemoved,
}

/// Evolution checker for type definitions
#[derive(Debug, Clone, Copy)]
pub struct EvolutionChecker;

impl EvolutionChecker {
    pub fn new() -> Self {
        Self
    }

    /// Compare two versions of the same type
    pub fn check(&self, old: &TypeDef, new: &TypeDef) -> Result<EvolutionReport> {
        if old.guid != new.guid {
            return Err(TypeRegistryError::invalid_evolution(
                &old.name,
                format!("cannot compare with a different type ({})", new.guid),
            ));
        }

        let changes = self.detect_changes(old, new);
        let breaking_count = changes.iter().filter(|c| c.is_breaking).count();

        if breaking_count > 0 {
            Ok(EvolutionReport::incompatible(
                changes,
                format!("{} breaking changes detected", breaking_count),
            ))
        } else {
            Ok(EvolutionReport::compatible(changes))
        }
    }

    fn detect_changes(&self, old: &TypeDef, new: &TypeDef) -> Vec<TypeDefChange> {
        let mut changes = Vec::new();

        if old.name != new.name {
            changes.push(
                TypeDefChange::new(ChangeType::TypeRenamed, "name", true, format!("Type renamed to '{}'", new.name))
                    .values(Some(old.name.clone()), Some(new.name.clone())),
            );
        }

        if old.category() != new.category() {
            changes.push(
                TypeDefChange::new(
                    ChangeType::CategoryChanged,
                    "category",
                    true,
                    format!("Category changed from {} to {}", old.category(), new.category()),
                )
                .values(Some(old.category().to_string()), Some(new.category().to_string())),
            );
        }

        let old_super = old.super_type.as_ref().map(|l| l.guid.as_str());
        let new_super = new.super_type.as_ref().map(|l| l.guid.as_str());
        if old_super != new_super {
            changes.push(
                TypeDefChange::new(ChangeType::SuperTypeChanged, "superType", true, "Super type changed")
                    .values(
                        old.super_type.as_ref().map(|l| l.to_string()),
                        new.super_type.as_ref().map(|l| l.to_string()),
                    ),
            );
        }

        if old.description != new.description || old.description_guid != new.description_guid {
            changes.push(TypeDefChange::new(
                ChangeType::DocumentationChanged,
                "description",
                false,
                "Type description changed",
            ));
        }

        self.detect_attribute_changes(&old.properties_definition, &new.properties_definition, &mut changes);
        self.detect_status_changes(old, new, &mut changes);
        self.detect_option_changes(&old.options, &new.options, &mut changes);

        if old.external_standard_mappings != new.external_standard_mappings {
            changes.push(TypeDefChange::new(
                ChangeType::ExternalStandardsChanged,
                "externalStandardMappings",
                false,
                "External standard mappings changed",
            ));
        }

        match (&old.kind, &new.kind) {
            (TypeDefKind::Relationship(o), TypeDefKind::Relationship(n)) => {
                self.detect_relationship_changes(o, n, &mut changes)
            }
            (TypeDefKind::Classification(o), TypeDefKind::Classification(n)) => {
                self.detect_classification_changes(o, n, &mut changes)
            }
            _ => {}
        }

        changes
    }

    fn detect_attribute_changes(
        &self,
        old: &[TypeDefAttribute],
        new: &[TypeDefAttribute],
        changes: &mut Vec<TypeDefChange>,
    ) {
        let new_by_name: HashMap<_, _> = new.iter().map(|a| (a.attribute_name.as_str(), a)).collect();
        let old_by_name: HashMap<_, _> = old.iter().map(|a| (a.attribute_name.as_str(), a)).collect();

        for attribute in old {
            let name = attribute.attribute_name.as_str();
            match new_by_name.get(name) {
                None => changes.push(
                    TypeDefChange::new(
                        ChangeType::AttributeRemoved,
                        format!("properties.{}", name),
                        true,
                        format!("Attribute '{}' was removed", name),
                    )
                    .values(Some(attribute.attribute_type.name.clone()), None),
                ),
                Some(candidate) => self.detect_attribute_change(attribute, candidate, changes),
            }
        }

        for attribute in new {
            let name = attribute.attribute_name.as_str();
            if !old_by_name.contains_key(name) {
                let renamed_from = new.iter().find(|a| {
                    a.attribute_status == TypeDefAttributeStatus::Renamed
                        && a.replaced_by_attribute.as_deref() == Some(name)
                });
                if let Some(previous) = renamed_from {
                    changes.push(
                        TypeDefChange::new(
                            ChangeType::AttributeAdded,
                            format!("properties.{}", name),
                            false,
                            format!("Attribute '{}' was added as the new name of '{}'", name, previous.attribute_name),
                        )
                        .values(Some(previous.attribute_name.clone()), Some(name.to_string())),
                    );
                    continue;
                }

                // A new attribute that every instance must carry cannot be satisfied by existing instances
                let required = attribute.values_min_count > 0 || attribute.cardinality.bounds().0 > 0;
                changes.push(
                    TypeDefChange::new(
                        ChangeType::AttributeAdded,
                        format!("properties.{}", name),
                        required,
                        if required {
                            format!("Required attribute '{}' was added (breaking)", name)
                        } else {
                            format!("Optional attribute '{}' was added", name)
                        },
                    )
                    .values(None, Some(attribute.attribute_type.name.clone())),
                );
            }
        }
    }

    fn detect_attribute_change(
        &self,
        old: &TypeDefAttribute,
        new: &TypeDefAttribute,
        changes: &mut Vec<TypeDefChange>,
    ) {
        let name = &old.attribute_name;
        let path = format!("properties.{}", name);

        let type_kept = old.attribute_type.guid == new.attribute_type.guid
            && old.attribute_type.classify_update(&new.attribute_type).is_ok();
        if !type_kept {
            changes.push(
                TypeDefChange::new(
                    ChangeType::AttributeTypeChanged,
                    format!("{}.attributeType", path),
                    true,
                    format!("Attribute '{}' type changed", name),
                )
                .values(Some(old.attribute_type.name.clone()), Some(new.attribute_type.name.clone())),
            );
        }

        if old.cardinality != new.cardinality {
            let widened = new.cardinality.is_compatible_with(old.cardinality);
            changes.push(
                TypeDefChange::new(
                    if widened {
                        ChangeType::CardinalityWidened
                    } else {
                        ChangeType::CardinalityNarrowed
                    },
                    format!("{}.cardinality", path),
                    !widened,
                    format!(
                        "Attribute '{}' cardinality changed from {:?} to {:?}",
                        name, old.cardinality, new.cardinality
                    ),
                )
                .values(Some(format!("{:?}", old.cardinality)), Some(format!("{:?}", new.cardinality))),
            );
        }

        let min_raised = new.values_min_count > old.values_min_count;
        let max_lowered = match (old.values_max_count, new.values_max_count) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(o), Some(n)) => n < o,
        };
        if old.values_min_count != new.values_min_count || old.values_max_count != new.values_max_count {
            changes.push(TypeDefChange::new(
                ChangeType::ValueCountChanged,
                format!("{}.valuesCount", path),
                min_raised || max_lowered,
                format!("Attribute '{}' value count bounds changed", name),
            ));
        }

        if old.is_unique != new.is_unique {
            changes.push(TypeDefChange::new(
                ChangeType::UniquenessChanged,
                format!("{}.isUnique", path),
                new.is_unique,
                format!("Attribute '{}' uniqueness changed", name),
            ));
        }

        if old.attribute_status != new.attribute_status || old.replaced_by_attribute != new.replaced_by_attribute {
            // A rename is permanent; every other status move keeps old data readable
            let breaking = old.attribute_status == TypeDefAttributeStatus::Renamed;
            changes.push(
                TypeDefChange::new(
                    ChangeType::AttributeStatusChanged,
                    format!("{}.attributeStatus", path),
                    breaking,
                    format!("Attribute '{}' status changed to {:?}", name, new.attribute_status),
                )
                .values(Some(format!("{:?}", old.attribute_status)), Some(format!("{:?}", new.attribute_status))),
            );
        }

        if old.default_value != new.default_value {
            changes.push(
                TypeDefChange::new(
                    ChangeType::DefaultChanged,
                    format!("{}.defaultValue", path),
                    false,
                    format!("Attribute '{}' default value changed", name),
                )
                .values(old.default_value.clone(), new.default_value.clone()),
            );
        }

        if old.is_indexable != new.is_indexable {
            changes.push(TypeDefChange::new(
                ChangeType::IndexingChanged,
                format!("{}.isIndexable", path),
                false,
                format!("Attribute '{}' indexing changed", name),
            ));
        }

        if old.attribute_description != new.attribute_description
            || old.attribute_description_guid != new.attribute_description_guid
        {
            changes.push(TypeDefChange::new(
                ChangeType::DocumentationChanged,
                format!("{}.attributeDescription", path),
                false,
                format!("Attribute '{}' description changed", name),
            ));
        }
    }

    fn detect_status_changes(&self, old: &TypeDef, new: &TypeDef, changes: &mut Vec<TypeDefChange>) {
        for status in &old.valid_instance_status_list {
            if !new.valid_instance_status_list.contains(status) {
                changes.push(TypeDefChange::new(
                    ChangeType::ValidStatusRemoved,
                    "validInstanceStatusList",
                    true,
                    format!("Instance status {:?} is no longer valid", status),
                ));
            }
        }
        for status in &new.valid_instance_status_list {
            if !old.valid_instance_status_list.contains(status) {
                changes.push(TypeDefChange::new(
                    ChangeType::ValidStatusAdded,
                    "validInstanceStatusList",
                    false,
                    format!("Instance status {:?} is now valid", status),
                ));
            }
        }
        if old.initial_status != new.initial_status {
            changes.push(TypeDefChange::new(
                ChangeType::InitialStatusChanged,
                "initialStatus",
                false,
                format!("Initial status changed to {:?}", new.initial_status),
            ));
        }
    }

    fn detect_option_changes(
        &self,
        old: &BTreeMap<String, String>,
        new: &BTreeMap<String, String>,
        changes: &mut Vec<TypeDefChange>,
    ) {
        if old != new {
            let keys: BTreeSet<&str> = old
                .keys()
                .chain(new.keys())
                .filter(|k| old.get(*k) != new.get(*k))
                .map(String::as_str)
                .collect();
            let keys: Vec<&str> = keys.into_iter().collect();
            changes.push(TypeDefChange::new(
                ChangeType::OptionsChanged,
                "options",
                false,
                format!("Options changed: {}", keys.join(", ")),
            ));
        }
    }

    fn detect_relationship_changes(
        &self,
        old: &RelationshipDef,
        new: &RelationshipDef,
        changes: &mut Vec<TypeDefChange>,
    ) {
        self.detect_end_changes("endDef1", &old.end_def1, &new.end_def1, changes);
        self.detect_end_changes("endDef2", &old.end_def2, &new.end_def2, changes);

        if old.propagation_rule != new.propagation_rule {
            changes.push(
                TypeDefChange::new(
                    ChangeType::PropagationChanged,
                    "propagationRule",
                    true,
                    "Classification propagation rule changed",
                )
                .values(
                    Some(format!("{:?}", old.propagation_rule)),
                    Some(format!("{:?}", new.propagation_rule)),
                ),
            );
        }

        if old.multi_link != new.multi_link {
            changes.push(TypeDefChange::new(
                ChangeType::RelationshipEndChanged,
                "multiLink",
                old.multi_link,
                "Multi-link setting changed",
            ));
        }
    }

    fn detect_end_changes(
        &self,
        path: &str,
        old: &RelationshipEndDef,
        new: &RelationshipEndDef,
        changes: &mut Vec<TypeDefChange>,
    ) {
        if old.entity_type.guid != new.entity_type.guid || old.attribute_name != new.attribute_name {
            changes.push(
                TypeDefChange::new(
                    ChangeType::RelationshipEndChanged,
                    path,
                    true,
                    format!("Relationship end {} changed", path),
                )
                .values(
                    Some(format!("{}:{}", old.entity_type.name, old.attribute_name)),
                    Some(format!("{}:{}", new.entity_type.name, new.attribute_name)),
                ),
            );
        }
        if old.attribute_cardinality != new.attribute_cardinality {
            let widened = new.attribute_cardinality.is_compatible_with(old.attribute_cardinality);
            changes.push(TypeDefChange::new(
                if widened {
                    ChangeType::CardinalityWidened
                } else {
                    ChangeType::CardinalityNarrowed
                },
                format!("{}.attributeCardinality", path),
                !widened,
                format!("Relationship end {} cardinality changed", path),
            ));
        }
        if old.attribute_description != new.attribute_description {
            changes.push(TypeDefChange::new(
                ChangeType::DocumentationChanged,
                format!("{}.attributeDescription", path),
                false,
                format!("Relationship end {} description changed", path),
            ));
        }
    }

    fn detect_classification_changes(
        &self,
        old: &ClassificationDef,
        new: &ClassificationDef,
        changes: &mut Vec<TypeDefChange>,
    ) {
        // An empty list admits every entity type, so narrowing from it is a removal
        if !old.valid_entity_defs.is_empty() || !new.valid_entity_defs.is_empty() {
            if old.valid_entity_defs.is_empty() {
                changes.push(TypeDefChange::new(
                    ChangeType::ValidEntityRemoved,
                    "validEntityDefs",
                    true,
                    "Classification restricted to specific entity types",
                ));
            } else {
                for link in &old.valid_entity_defs {
                    if !new.valid_entity_defs.iter().any(|l| l.guid == link.guid) && !new.valid_entity_defs.is_empty() {
                        changes.push(TypeDefChange::new(
                            ChangeType::ValidEntityRemoved,
                            "validEntityDefs",
                            true,
                            format!("Entity type {} can no longer be classified", link.name),
                        ));
                    }
                }
                for link in &new.valid_entity_defs {
                    if !old.valid_entity_defs.iter().any(|l| l.guid == link.guid) {
                        changes.push(TypeDefChange::new(
                            ChangeType::ValidEntityAdded,
                            "validEntityDefs",
                            false,
                            format!("Entity type {} can now be classified", link.name),
                        ));
                    }
                }
                if new.valid_entity_defs.is_empty() {
                    changes.push(TypeDefChange::new(
                        ChangeType::ValidEntityAdded,
                        "validEntityDefs",
                        false,
                        "Classification opened to all entity types",
                    ));
                }
            }
        }

        if old.propagatable != new.propagatable {
            changes.push(TypeDefChange::new(
                ChangeType::PropagationChanged,
                "propagatable",
                true,
                format!("Classification propagatable changed to {}", new.propagatable),
            ));
        }
    }
}

impl Default for EvolutionChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Cardinality changes the patch engine accepts for an existing attribute
pub(crate) fn cardinality_change_allowed(old: AttributeCardinality, new: AttributeCardinality) -> bool {
    old == new || new.is_compatible_with(old)
}
