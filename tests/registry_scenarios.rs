//! End-to-end scenarios for the type registry
//!
//! Installs the core archive fixture and exercises patching, exchange
//! decisions and propagation against it.

use std::collections::HashSet;
use std::thread;

use open_metadata_types::{
    decide, propagation_target, AttributeCardinality, AttributeTypeCatalog, CohortConfig, CohortExchange,
    Disposition, ExchangeDecision, ExchangeEvent, ExchangePolicy, ExchangeRule, LocalRepositoryMode,
    PrimitiveDefCategory, RegistrySettings, RelationshipEnd, TypeArchive, TypeDef, TypeDefAttribute,
    TypeDefLink, TypeDefOrigin, TypeDefPatch, TypeDefPatchAction, TypeDefSummary, TypeHierarchy, TypeRegistry,
    TypeRegistryError,
};

const ASSET: &str = "a32316b8-dc8c-48c5-b12b-71c1b2a080bf";

fn core_archive() -> TypeArchive {
    serde_json::from_str(include_str!("fixtures/core_types.json")).unwrap()
}

fn loaded_registry() -> TypeRegistry {
    let registry = TypeRegistry::with_standard_types(RegistrySettings::default()).unwrap();
    let report = core_archive().install(&registry).unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);
    registry
}

fn string_attribute(name: &str) -> TypeDefAttribute {
    TypeDefAttribute::new(name, AttributeTypeCatalog::new().primitive(PrimitiveDefCategory::String))
}

// =============================================================================
// Archive
// =============================================================================

#[test]
fn test_core_archive_installs() {
    let registry = loaded_registry();
    assert_eq!(registry.len(), 6);

    let asset = registry.get_by_guid(ASSET).unwrap();
    assert_eq!(asset.version.version, 3);
    assert_eq!(asset.version.version_name, "1.2");
    assert!(asset.attribute("description").is_some());
    assert_eq!(asset.origin.as_deref(), Some("core-archive-collection"));

    let key_pattern = registry.attribute_type_by_name("KeyPattern").unwrap();
    assert_eq!(key_pattern.category.label(), "enum[3]");
}

#[test]
fn test_hierarchy_from_archive() {
    let registry = loaded_registry();
    let hierarchy = registry.hierarchy();
    assert!(!hierarchy.is_cyclic());
    let subtypes: Vec<String> = hierarchy.subtypes(ASSET).into_iter().map(|l| l.name).collect();
    assert_eq!(subtypes, vec!["DataSet", "Process"]);
}

// =============================================================================
// Exchange policy
// =============================================================================

#[test]
fn test_selected_types_accept_and_reject() {
    let registry = loaded_registry();
    let selected = vec![TypeDefSummary::named("Asset")];
    let rule = ExchangeRule::SelectedTypes;

    let asset = ExchangeEvent::instance(ASSET, "Asset");
    let process = registry.get_by_name("Process").unwrap();
    let referenceable = registry.get_by_name("Referenceable").unwrap();

    assert_eq!(decide(rule, &selected, &asset, &registry, &()), ExchangeDecision::Accept);
    // Process inherits from Asset, Referenceable does not
    assert_eq!(
        decide(rule, &selected, &ExchangeEvent::instance(&process.guid, "Process"), &registry, &()),
        ExchangeDecision::Accept
    );
    assert_eq!(
        decide(rule, &selected, &ExchangeEvent::instance(&referenceable.guid, "Referenceable"), &registry, &()),
        ExchangeDecision::Reject
    );
    assert_eq!(
        decide(rule, &selected, &ExchangeEvent::type_def(&referenceable.guid, "Referenceable"), &registry, &()),
        ExchangeDecision::Accept
    );
}

#[test]
fn test_unrelated_type_rejected_without_registry() {
    let selected = vec![TypeDefSummary::named("Asset")];
    let registry = TypeRegistry::default();
    let process = ExchangeEvent::instance("unknown-guid", "Process");
    assert_eq!(
        decide(ExchangeRule::SelectedTypes, &selected, &process, &registry, &()),
        ExchangeDecision::Reject
    );
    assert_eq!(
        decide(
            ExchangeRule::SelectedTypes,
            &selected,
            &ExchangeEvent::type_def("unknown-guid", "Process"),
            &registry,
            &()
        ),
        ExchangeDecision::Accept
    );
}

#[test]
fn test_cohort_exchange_with_learned_types() {
    let registry = loaded_registry();
    let cohort = CohortConfig::new("cocoCohort")
        .saving(ExchangePolicy::new(ExchangeRule::LearnedTypes))
        .sending(ExchangePolicy::selecting(
            ExchangeRule::DeselectedTypes,
            vec![TypeDefSummary::named("Referenceable")],
        ));
    let learned: HashSet<String> = ["DataSet".to_string()].into_iter().collect();
    let exchange = CohortExchange::new(LocalRepositoryMode::MetadataCache, &cohort, &registry, &learned);

    let data_set = registry.get_by_name("DataSet").unwrap();
    let event = ExchangeEvent::instance(&data_set.guid, "DataSet");
    assert!(exchange.should_save(&event).is_accept());
    // DataSet descends from the deselected Referenceable
    assert!(!exchange.should_send(&event).is_accept());
    assert!(!exchange.may_originate_type_defs());
}

#[test]
fn test_peer_guid_falls_back_to_name_for_ancestry() {
    let registry = loaded_registry();
    let hierarchy: TypeHierarchy = registry.hierarchy();
    let selected = vec![TypeDefSummary::named("Referenceable")];
    let event = ExchangeEvent::instance("peer-asset-guid", "Asset");

    let by_registry = decide(ExchangeRule::SelectedTypes, &selected, &event, &registry, &());
    let by_hierarchy = decide(ExchangeRule::SelectedTypes, &selected, &event, &hierarchy, &());
    assert_eq!(by_registry, ExchangeDecision::Accept);
    assert_eq!(by_registry, by_hierarchy);
}

// =============================================================================
// Patch engine through the registry
// =============================================================================

#[test]
fn test_add_attributes_then_replay_conflicts() {
    let registry = loaded_registry();
    let before = registry.get_by_guid(ASSET).unwrap();
    assert_eq!(before.version.version, 3);

    let patch = TypeDefPatch::new(TypeDefPatchAction::AddAttributes, &before, "1.3")
        .with_attributes(vec![string_attribute("zone")]);
    let after = registry.apply_patch(&patch).unwrap();
    assert_eq!(after.version.version, 4);
    assert_eq!(after.properties_definition.len(), before.properties_definition.len() + 1);

    let err = registry.apply_patch(&patch).unwrap_err();
    assert!(matches!(err, TypeRegistryError::VersionConflict { .. }));
    assert_eq!(err.disposition(), Disposition::Retryable);
    assert_eq!(registry.get_by_guid(ASSET).unwrap().version.version, 4);
}

#[test]
fn test_attribute_deletion_leaves_version_unchanged() {
    let registry = loaded_registry();
    let before = registry.get_by_guid(ASSET).unwrap();
    let patch = TypeDefPatch::new(TypeDefPatchAction::DeleteAttributes, &before, "2.0")
        .with_attribute_names(vec!["name".to_string()]);

    let err = registry.apply_patch(&patch).unwrap_err();
    assert!(matches!(err, TypeRegistryError::UnsupportedEvolution { .. }));
    assert_eq!(err.disposition(), Disposition::Permanent);
    assert_eq!(registry.get_by_guid(ASSET).unwrap(), before);
}

#[test]
fn test_mismatched_version_always_conflicts() {
    let registry = loaded_registry();
    let current = registry.get_by_guid(ASSET).unwrap();
    for apply_to in [0, 1, 2, 4, 10] {
        let patch = TypeDefPatch::for_version(TypeDefPatchAction::AddOptions, ASSET, "Asset", apply_to, "x")
            .with_option("k", "v");
        let err = registry.apply_patch(&patch).unwrap_err();
        assert!(
            matches!(err, TypeRegistryError::VersionConflict { current_version: 3, .. }),
            "applyToVersion {} gave {:?}",
            apply_to,
            err
        );
    }
    assert_eq!(registry.get_by_guid(ASSET).unwrap(), current);
}

#[test]
fn test_accepted_patches_keep_identity() {
    let registry = loaded_registry();
    let actions = [
        TypeDefPatchAction::UpdateDescriptions,
        TypeDefPatchAction::AddValidInstanceStatuses,
        TypeDefPatchAction::RenameAttributes,
        TypeDefPatchAction::DeprecateAttributes,
    ];
    for action in actions {
        let current = registry.get_by_guid(ASSET).unwrap();
        let patch = TypeDefPatch::new(action, &current, "next");
        let patch = match action {
            TypeDefPatchAction::UpdateDescriptions => patch.with_description("Anything worth governing"),
            TypeDefPatchAction::AddValidInstanceStatuses => {
                patch.with_statuses(vec![open_metadata_types::InstanceStatus::Draft])
            }
            TypeDefPatchAction::RenameAttributes => patch.with_rename("description", "summary"),
            _ => patch.with_attribute_names(vec!["name".to_string()]),
        };
        let next = registry.apply_patch(&patch).unwrap();
        assert!(next.version > current.version);
        assert_eq!(next.guid, current.guid);
        assert_eq!(next.name, current.name);
    }
    let asset = registry.get_by_guid(ASSET).unwrap();
    assert_eq!(asset.version.version, 7);
    assert_eq!(
        asset.attribute("description").unwrap().replaced_by_attribute.as_deref(),
        Some("summary")
    );
}

#[test]
fn test_concurrent_patches_have_one_winner() {
    let registry = loaded_registry();
    let base = registry.get_by_guid(ASSET).unwrap();
    let contenders = 8;

    let results: Vec<Result<TypeDef, TypeRegistryError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..contenders)
            .map(|i| {
                let registry = &registry;
                let patch = TypeDefPatch::new(TypeDefPatchAction::AddOptions, &base, "1.3")
                    .with_option(format!("option{}", i), "set");
                scope.spawn(move || registry.apply_patch(&patch))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(TypeRegistryError::VersionConflict { .. })));
    }
    let stored = registry.get_by_guid(ASSET).unwrap();
    assert_eq!(stored.version.version, 4);
    assert_eq!(stored.options.len(), base.options.len() + 1);
}

#[test]
fn test_concurrent_patches_with_retry_all_land() {
    let registry = loaded_registry();
    let contenders = 6;

    thread::scope(|scope| {
        for i in 0..contenders {
            let registry = &registry;
            scope.spawn(move || loop {
                let current = registry.get_by_guid(ASSET).unwrap();
                let patch = TypeDefPatch::new(TypeDefPatchAction::AddOptions, &current, "retry")
                    .with_option(format!("retry{}", i), "set");
                match registry.apply_patch(&patch) {
                    Ok(_) => break,
                    Err(e) if e.is_retryable() => continue,
                    Err(e) => panic!("unexpected rejection: {}", e),
                }
            });
        }
    });

    let stored = registry.get_by_guid(ASSET).unwrap();
    assert_eq!(stored.version.version, 3 + contenders);
    assert_eq!(stored.options.keys().filter(|k| k.starts_with("retry")).count(), contenders as usize);
}

// =============================================================================
// Registration and verification
// =============================================================================

#[test]
fn test_registration_is_idempotent_and_fingerprinted() {
    let registry = loaded_registry();
    let data_set = registry.get_by_name("DataSet").unwrap();

    let mut peer_copy = data_set.clone();
    peer_copy.origin = Some("peer-collection".to_string());
    peer_copy.create_time = None;
    let again = registry
        .register_type_def(
            peer_copy.clone(),
            TypeDefOrigin::Cohort {
                metadata_collection_id: "peer-collection".to_string(),
            },
        )
        .unwrap();
    assert_eq!(again, data_set);
    assert!(registry.verify_type_def(&peer_copy).unwrap().is_verified());
    assert_eq!(data_set.fingerprint().unwrap(), peer_copy.fingerprint().unwrap());
}

#[test]
fn test_identity_conflict_does_not_block() {
    let registry = loaded_registry();
    let link = TypeDefLink::new(ASSET, "Dataset");
    let resolution = registry.resolve_link(&link).unwrap();
    assert_eq!(resolution.type_def.name, "Asset");
    assert!(resolution.conflict.is_some());
    assert_eq!(registry.identity_conflicts().len(), 1);
}

#[test]
fn test_resolution_is_stable_until_patched() {
    let registry = loaded_registry();
    let link = TypeDefLink::new(ASSET, "Asset");

    let first = registry.resolve_link(&link).unwrap().type_def;
    let second = registry.resolve_link(&link).unwrap().type_def;
    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());

    let patch = TypeDefPatch::new(TypeDefPatchAction::AddOptions, &first, "1.3").with_option("zone", "landing");
    registry.apply_patch(&patch).unwrap();
    let third = registry.resolve_link(&link).unwrap().type_def;
    assert_ne!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&third).unwrap());
    assert_eq!(third.version.version, first.version.version + 1);
}

#[test]
fn test_new_type_needs_known_super_type() {
    let registry = loaded_registry();
    let table = TypeDef::entity("g-table", "Table")
        .with_super_type(TypeDefLink::new("g-tabular", "TabularSchemaType"));
    let err = registry.register_type_def(table, TypeDefOrigin::Local).unwrap_err();
    assert_eq!(err.disposition(), Disposition::Deferred);
}

// =============================================================================
// Propagation
// =============================================================================

#[test]
fn test_propagation_across_lineage() {
    let registry = loaded_registry();
    let confidentiality = registry.get_by_name("Confidentiality").unwrap();
    let lineage = registry.get_by_name("LineageMapping").unwrap();
    let classification = confidentiality.as_classification().unwrap();
    let relationship = lineage.as_relationship().unwrap();

    assert_eq!(
        propagation_target(classification, relationship, RelationshipEnd::End1),
        Some(RelationshipEnd::End2)
    );
    assert_eq!(
        propagation_target(classification, relationship, RelationshipEnd::End2),
        Some(RelationshipEnd::End1)
    );

    let mut blocked = relationship.clone();
    blocked.propagation_rule = open_metadata_types::ClassificationPropagationRule::None;
    assert_eq!(propagation_target(classification, &blocked, RelationshipEnd::End1), None);
}

#[test]
fn test_cardinality_widening_patch() {
    let registry = loaded_registry();
    let current = registry.get_by_guid(ASSET).unwrap();
    let widened = string_attribute("name").with_cardinality(AttributeCardinality::AnyNumberOrdered);
    let patch = TypeDefPatch::new(TypeDefPatchAction::UpdateAttributes, &current, "1.3").with_attributes(vec![widened]);
    let next = registry.apply_patch(&patch).unwrap();
    assert_eq!(next.attribute("name").unwrap().cardinality, AttributeCardinality::AnyNumberOrdered);

    let narrowed = string_attribute("name").with_cardinality(AttributeCardinality::OneOnly);
    let patch = TypeDefPatch::new(TypeDefPatchAction::UpdateAttributes, &next, "1.4").with_attributes(vec![narrowed]);
    assert!(matches!(
        registry.apply_patch(&patch),
        Err(TypeRegistryError::UnsupportedEvolution { .. })
    ));
}
