//! Type archives
//!
//! A type archive is a JSON document carrying attribute types, new type
//! definitions and patches published together. Archives are installed into a
//! registry in dependency order:
//!
//! 1. attribute types
//! 2. entity types, then relationship and classification types, each group
//!    supertype-first
//! 3. patches, grouped by target and ordered by `applyToVersion`
//!
//! A definition that fails to install is recorded in the [`ArchiveReport`] and
//! the rest of the archive is still installed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::AttributeTypeDef;
use crate::error::{Disposition, Result, TypeRegistryError};
use crate::hierarchy::TypeHierarchy;
use crate::patch::TypeDefPatch;
use crate::registry::{TypeDefOrigin, TypeRegistry};
use crate::typedef::{TypeDef, TypeDefCategory};

/// A published bundle of type definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeArchive {
    #[serde(rename = "archiveGUID")]
    pub archive_guid: String,
    pub archive_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_description: Option<String>,
    /// Metadata collection recorded as the origin of installed types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    #[serde(default)]
    pub attribute_type_defs: Vec<AttributeTypeDef>,
    #[serde(default)]
    pub new_type_defs: Vec<TypeDef>,
    #[serde(default)]
    pub type_def_patches: Vec<TypeDefPatch>,
}

/// One element of an archive that did not install
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFailure {
    pub name: String,
    pub error: String,
    pub retryable: bool,
}

/// Outcome of installing an archive
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveReport {
    pub archive_name: String,
    pub attribute_types_installed: usize,
    pub type_defs_installed: usize,
    pub patches_applied: usize,
    pub failures: Vec<ArchiveFailure>,
}

impl ArchiveReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, name: &str, error: TypeRegistryError) {
        warn!(archive = %self.archive_name, name, error = %error, "archive element not installed");
        self.failures.push(ArchiveFailure {
            name: name.to_string(),
            retryable: error.disposition() == Disposition::Retryable,
            error: error.to_string(),
        });
    }
}

fn category_rank(category: TypeDefCategory) -> u8 {
    match category {
        TypeDefCategory::EntityDef => 0,
        TypeDefCategory::RelationshipDef => 1,
        TypeDefCategory::ClassificationDef => 2,
        TypeDefCategory::Unknown => 3,
    }
}

impl TypeArchive {
    pub fn new(archive_guid: impl Into<String>, archive_name: impl Into<String>) -> Self {
        Self {
            archive_guid: archive_guid.into(),
            archive_name: archive_name.into(),
            ..Self::default()
        }
    }

    /// Load one archive file
    pub fn load_file(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let archive: TypeArchive = serde_json::from_reader(BufReader::new(file))?;
        Ok(archive)
    }

    /// Load every `*.json` archive under `dir`, in path order
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        paths.iter().map(|p| Self::load_file(p)).collect()
    }

    /// Load a file or a directory of archives
    pub fn load(path: &Path) -> Result<Vec<Self>> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Ok(vec![Self::load_file(path)?])
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// New type definitions in the order they can be registered
    pub fn install_order(&self) -> Result<Vec<&TypeDef>> {
        let hierarchy = TypeHierarchy::build(&self.new_type_defs);
        let mut ordered: Vec<&TypeDef> = hierarchy
            .install_order()?
            .iter()
            .filter_map(|link| self.new_type_defs.iter().find(|t| t.guid == link.guid))
            .collect();
        ordered.sort_by_key(|t| category_rank(t.category()));
        Ok(ordered)
    }

    /// Patches grouped by target, oldest first
    pub fn patch_order(&self) -> Vec<&TypeDefPatch> {
        let mut patches: Vec<&TypeDefPatch> = self.type_def_patches.iter().collect();
        patches.sort_by(|a, b| {
            (a.type_name.as_str(), a.type_def_guid.as_str(), a.apply_to_version).cmp(&(
                b.type_name.as_str(),
                b.type_def_guid.as_str(),
                b.apply_to_version,
            ))
        });
        patches
    }

    /// Install the archive into `registry`
    ///
    /// Fails outright only when the archive's own supertype links are cyclic.
    pub fn install(&self, registry: &TypeRegistry) -> Result<ArchiveReport> {
        let mut report = ArchiveReport {
            archive_name: self.archive_name.clone(),
            ..ArchiveReport::default()
        };
        let origin = TypeDefOrigin::Cohort {
            metadata_collection_id: self.origin_id.clone().unwrap_or_else(|| self.archive_guid.clone()),
        };

        for attribute_type in &self.attribute_type_defs {
            match registry.register_attribute_type_def(attribute_type.clone()) {
                Ok(_) => report.attribute_types_installed += 1,
                Err(e) => report.fail(&attribute_type.name, e),
            }
        }

        for type_def in self.install_order()? {
            match registry.register_type_def(type_def.clone(), origin.clone()) {
                Ok(_) => report.type_defs_installed += 1,
                Err(e) => report.fail(&type_def.name, e),
            }
        }

        for patch in self.patch_order() {
            match registry.apply_patch(patch) {
                Ok(_) => report.patches_applied += 1,
                Err(e) => report.fail(&patch.summary(), e),
            }
        }

        info!(
            archive = %self.archive_name,
            attribute_types = report.attribute_types_installed,
            type_defs = report.type_defs_installed,
            patches = report.patches_applied,
            failures = report.failures.len(),
            "installed type archive"
        );
        Ok(report)
    }
}
