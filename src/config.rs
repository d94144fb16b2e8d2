//! Configuration management for the type registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (typeregistry.toml)
//! - Environment variables (TYPEREGISTRY__*)
//!
//! ## Example config file (typeregistry.toml):
//! ```toml
//! archives = ["archives/core-types.json"]
//!
//! [server]
//! server_name = "cocoMDS1"
//! metadata_collection_id = "f5b1c2d4-cocoMDS1"
//! local_repository_mode = "OPEN_METADATA_NATIVE"
//! default_user = "garygeeke"
//!
//! [resolution]
//! strict_link_resolution = false
//!
//! [topics]
//! root = "openmetadata.repositoryservices.cohort."
//!
//! [[cohorts]]
//! name = "cocoCohort"
//! protocol = "DEDICATED_TOPICS"
//!
//! [cohorts.events_to_save]
//! rule = "SELECTED_TYPES"
//! selectedTypes = [{ name = "Asset" }]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cohort::{CohortConfig, CohortTopics, LocalRepositoryMode, DEFAULT_TOPIC_ROOT};
use crate::registry::RegistrySettings;

/// Main configuration for a type registry server
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// Server identity
    #[serde(default)]
    pub server: ServerConfig,

    /// Link resolution behaviour
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Topic naming
    #[serde(default)]
    pub topics: TopicConfig,

    /// Type archives installed at startup
    #[serde(default)]
    pub archives: Vec<PathBuf>,

    /// Cohorts the server belongs to
    #[serde(default)]
    pub cohorts: Vec<CohortConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Stamped as the origin of locally created types
    #[serde(default = "default_collection_id")]
    pub metadata_collection_id: String,

    #[serde(default = "default_repository_mode")]
    pub local_repository_mode: LocalRepositoryMode,

    /// User recorded on types and patches that name nobody
    #[serde(default)]
    pub default_user: Option<String>,
}

/// Resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolutionConfig {
    /// Treat a guid/name mismatch on a link as an error
    #[serde(default)]
    pub strict_link_resolution: bool,
}

/// Topic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Prefix for every cohort topic name
    #[serde(default = "default_topic_root")]
    pub root: String,
}

// Default value functions
fn default_server_name() -> String {
    "local".to_string()
}

fn default_collection_id() -> String {
    "local-metadata-collection".to_string()
}

fn default_repository_mode() -> LocalRepositoryMode {
    LocalRepositoryMode::OpenMetadataNative
}

fn default_topic_root() -> String {
    DEFAULT_TOPIC_ROOT.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            metadata_collection_id: default_collection_id(),
            local_repository_mode: default_repository_mode(),
            default_user: None,
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            root: default_topic_root(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["typeregistry.toml", ".typeregistry.toml", "config/typeregistry.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "openmetadata", "typeregistry") {
            let xdg_config = config_dir.config_dir().join("typeregistry.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // TYPEREGISTRY__SERVER__SERVER_NAME=cocoMDS1
        builder = builder.add_source(
            Environment::with_prefix("TYPEREGISTRY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: RegistryConfig = builder.build()?.try_deserialize()?;
        config.warn_on_suspicious_settings();
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Settings for [`crate::TypeRegistry::new`]
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            server_name: self.server.server_name.clone(),
            metadata_collection_id: self.server.metadata_collection_id.clone(),
            local_repository_mode: self.server.local_repository_mode,
            default_user: self.server.default_user.clone(),
            strict_link_resolution: self.resolution.strict_link_resolution,
        }
    }

    pub fn cohort(&self, name: &str) -> Option<&CohortConfig> {
        self.cohorts.iter().find(|c| c.name == name)
    }

    /// Topic names for every configured cohort
    pub fn cohort_topics(&self) -> Vec<(String, CohortTopics)> {
        self.cohorts
            .iter()
            .map(|c| (c.name.clone(), c.topics(&self.topics.root)))
            .collect()
    }

    /// Archive paths resolved against `base` when relative
    pub fn archive_paths(&self, base: &Path) -> Vec<PathBuf> {
        self.archives
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect()
    }

    fn warn_on_suspicious_settings(&self) {
        for cohort in &self.cohorts {
            for (direction, policy) in [("save", &cohort.events_to_save), ("send", &cohort.events_to_send)] {
                if policy.has_empty_selection() {
                    warn!(
                        cohort = %cohort.name,
                        direction,
                        rule = %policy.rule,
                        "exchange rule selects types but none are listed"
                    );
                }
            }
        }
        if !self.server.local_repository_mode.may_originate_type_defs() && !self.archives.is_empty() {
            warn!(
                mode = %self.server.local_repository_mode,
                "archives are configured but this repository mode only consumes types"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeRule;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.server.local_repository_mode, LocalRepositoryMode::OpenMetadataNative);
        assert_eq!(config.topics.root, DEFAULT_TOPIC_ROOT);
        assert!(config.cohorts.is_empty());
        assert_eq!(config.registry_settings(), RegistrySettings::default());
    }

    #[test]
    fn test_serialize_config() {
        let mut config = RegistryConfig::default();
        config.cohorts.push(CohortConfig::new("cocoCohort"));
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[[cohorts]]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        std::fs::write(
            &path,
            r#"
            archives = ["core.json"]

            [server]
            server_name = "cocoMDS1"
            local_repository_mode = "METADATA_CACHE"

            [resolution]
            strict_link_resolution = true

            [[cohorts]]
            name = "cocoCohort"

            [cohorts.events_to_send]
            rule = "JUST_TYPEDEFS"
            "#,
        )
        .unwrap();

        let config = RegistryConfig::load_from(Some(path.as_path())).unwrap();
        assert_eq!(config.server.server_name, "cocoMDS1");
        assert_eq!(config.server.metadata_collection_id, "local-metadata-collection");

        let settings = config.registry_settings();
        assert!(settings.strict_link_resolution);
        assert_eq!(settings.local_repository_mode, LocalRepositoryMode::MetadataCache);

        let cohort = config.cohort("cocoCohort").unwrap();
        assert_eq!(cohort.events_to_send.rule, ExchangeRule::JustTypeDefs);
        assert_eq!(
            config.archive_paths(dir.path()),
            vec![dir.path().join("core.json")]
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = RegistryConfig::default();
        config.server.default_user = Some("erinoverview".to_string());
        config.save(&path).unwrap();

        let reloaded = RegistryConfig::load_from(Some(path.as_path())).unwrap();
        assert_eq!(reloaded.server.default_user.as_deref(), Some("erinoverview"));
    }

    #[test]
    fn test_cohort_topics_use_configured_root() {
        let mut config = RegistryConfig::default();
        config.topics.root = "acme.".to_string();
        config.cohorts.push(CohortConfig::new("dev"));
        let topics = config.cohort_topics();
        assert_eq!(topics[0].1.single.as_deref(), Some("acme.dev.OMRSTopic"));
    }
}
