//! Cohort membership configuration
//!
//! Per-cohort settings read by the registry: which topics carry the cohort's
//! traffic, what kind of repository the local node runs, and the pair of
//! exchange policies applied to inbound (save) and outbound (send) events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::exchange::{ExchangeDecision, ExchangeEvent, ExchangePolicy, LearnedTypes, TypeAncestry};

/// Prefix shared by every cohort topic unless configured otherwise
pub const DEFAULT_TOPIC_ROOT: &str = "openmetadata.repositoryservices.cohort.";

/// Kind of repository running on the local server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalRepositoryMode {
    #[default]
    NoRepository,
    MetadataCache,
    RepositoryProxy,
    OpenMetadataNative,
    PluginRepository,
}

impl LocalRepositoryMode {
    pub const ALL: [LocalRepositoryMode; 5] = [
        LocalRepositoryMode::NoRepository,
        LocalRepositoryMode::MetadataCache,
        LocalRepositoryMode::RepositoryProxy,
        LocalRepositoryMode::OpenMetadataNative,
        LocalRepositoryMode::PluginRepository,
    ];

    /// Only native and plugin repositories may publish new types
    pub fn may_originate_type_defs(&self) -> bool {
        matches!(self, LocalRepositoryMode::OpenMetadataNative | LocalRepositoryMode::PluginRepository)
    }

    /// Whether instances received from peers are stored locally
    pub fn stores_cohort_instances(&self) -> bool {
        matches!(
            self,
            LocalRepositoryMode::MetadataCache
                | LocalRepositoryMode::OpenMetadataNative
                | LocalRepositoryMode::PluginRepository
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LocalRepositoryMode::NoRepository => "NO_REPOSITORY",
            LocalRepositoryMode::MetadataCache => "METADATA_CACHE",
            LocalRepositoryMode::RepositoryProxy => "REPOSITORY_PROXY",
            LocalRepositoryMode::OpenMetadataNative => "OPEN_METADATA_NATIVE",
            LocalRepositoryMode::PluginRepository => "PLUGIN_REPOSITORY",
        }
    }
}

impl fmt::Display for LocalRepositoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalRepositoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| format!("unknown repository mode: {}", s))
    }
}

/// How cohort traffic is laid out over topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CohortTopicProtocol {
    /// One topic carries registration, type and instance events
    #[default]
    SingleTopic,
    /// Separate topics per event family
    DedicatedTopics,
}

/// Topic names derived for one cohort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortTopics {
    pub single: Option<String>,
    pub registration: Option<String>,
    pub types: Option<String>,
    pub instances: Option<String>,
}

impl CohortTopics {
    pub fn all(&self) -> Vec<&str> {
        [&self.single, &self.registration, &self.types, &self.instances]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .collect()
    }
}

/// Settings for one cohort the server belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CohortConfig {
    pub name: String,
    #[serde(default)]
    pub protocol: CohortTopicProtocol,
    /// Inbound events persisted locally
    #[serde(default)]
    pub events_to_save: ExchangePolicy,
    /// Outbound events published to the cohort
    #[serde(default)]
    pub events_to_send: ExchangePolicy,
}

impl CohortConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: CohortTopicProtocol::default(),
            events_to_save: ExchangePolicy::default(),
            events_to_send: ExchangePolicy::default(),
        }
    }

    pub fn with_protocol(mut self, protocol: CohortTopicProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn saving(mut self, policy: ExchangePolicy) -> Self {
        self.events_to_save = policy;
        self
    }

    pub fn sending(mut self, policy: ExchangePolicy) -> Self {
        self.events_to_send = policy;
        self
    }

    /// Topic names under `root`
    pub fn topics(&self, root: &str) -> CohortTopics {
        let base = format!("{}{}.OMRSTopic", root, self.name);
        match self.protocol {
            CohortTopicProtocol::SingleTopic => CohortTopics {
                single: Some(base),
                registration: None,
                types: None,
                instances: None,
            },
            CohortTopicProtocol::DedicatedTopics => CohortTopics {
                single: None,
                registration: Some(format!("{}.registration", base)),
                types: Some(format!("{}.types", base)),
                instances: Some(format!("{}.instances", base)),
            },
        }
    }
}

/// The decisions one server makes for one cohort
pub struct CohortExchange<'a> {
    mode: LocalRepositoryMode,
    cohort: &'a CohortConfig,
    ancestry: &'a dyn TypeAncestry,
    learned: &'a dyn LearnedTypes,
}

impl<'a> CohortExchange<'a> {
    pub fn new(
        mode: LocalRepositoryMode,
        cohort: &'a CohortConfig,
        ancestry: &'a dyn TypeAncestry,
        learned: &'a dyn LearnedTypes,
    ) -> Self {
        Self {
            mode,
            cohort,
            ancestry,
            learned,
        }
    }

    pub fn cohort_name(&self) -> &str {
        &self.cohort.name
    }

    pub fn may_originate_type_defs(&self) -> bool {
        self.mode.may_originate_type_defs()
    }

    /// Whether an inbound event is persisted
    ///
    /// Instance events are never saved by a repository that does not store
    /// cohort instances, whatever the configured rule says.
    pub fn should_save(&self, event: &ExchangeEvent) -> ExchangeDecision {
        if !event.is_type_def_event && !self.mode.stores_cohort_instances() {
            return ExchangeDecision::Reject;
        }
        self.cohort.events_to_save.decide(event, self.ancestry, self.learned)
    }

    /// Whether an outbound event is published
    pub fn should_send(&self, event: &ExchangeEvent) -> ExchangeDecision {
        if self.mode == LocalRepositoryMode::NoRepository {
            return ExchangeDecision::Reject;
        }
        self.cohort.events_to_send.decide(event, self.ancestry, self.learned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeRule, NoAncestry};
    use crate::typedef::TypeDefSummary;

    #[test]
    fn test_origination_by_mode() {
        let originators: Vec<_> = LocalRepositoryMode::ALL
            .into_iter()
            .filter(|m| m.may_originate_type_defs())
            .collect();
        assert_eq!(
            originators,
            vec![LocalRepositoryMode::OpenMetadataNative, LocalRepositoryMode::PluginRepository]
        );
        assert!(LocalRepositoryMode::MetadataCache.stores_cohort_instances());
        assert!(!LocalRepositoryMode::RepositoryProxy.stores_cohort_instances());
    }

    #[test]
    fn test_single_topic_name() {
        let topics = CohortConfig::new("cocoCohort").topics(DEFAULT_TOPIC_ROOT);
        assert_eq!(
            topics.single.as_deref(),
            Some("openmetadata.repositoryservices.cohort.cocoCohort.OMRSTopic")
        );
        assert_eq!(topics.all().len(), 1);
    }

    #[test]
    fn test_dedicated_topic_names() {
        let topics = CohortConfig::new("dev")
            .with_protocol(CohortTopicProtocol::DedicatedTopics)
            .topics("acme.");
        assert_eq!(topics.registration.as_deref(), Some("acme.dev.OMRSTopic.registration"));
        assert_eq!(topics.types.as_deref(), Some("acme.dev.OMRSTopic.types"));
        assert_eq!(topics.instances.as_deref(), Some("acme.dev.OMRSTopic.instances"));
        assert!(topics.single.is_none());
    }

    #[test]
    fn test_save_and_send_use_their_own_policy() {
        let cohort = CohortConfig::new("dev")
            .saving(ExchangePolicy::selecting(
                ExchangeRule::SelectedTypes,
                vec![TypeDefSummary::named("Asset")],
            ))
            .sending(ExchangePolicy::new(ExchangeRule::JustTypeDefs));
        let exchange = CohortExchange::new(LocalRepositoryMode::OpenMetadataNative, &cohort, &NoAncestry, &());

        let asset = ExchangeEvent::instance("g-asset", "Asset");
        assert!(exchange.should_save(&asset).is_accept());
        assert!(!exchange.should_send(&asset).is_accept());
        assert!(exchange.should_send(&ExchangeEvent::type_def("g-asset", "Asset")).is_accept());
    }

    #[test]
    fn test_proxy_never_saves_instances() {
        let cohort = CohortConfig::new("dev");
        let exchange = CohortExchange::new(LocalRepositoryMode::RepositoryProxy, &cohort, &NoAncestry, &());
        assert!(!exchange.should_save(&ExchangeEvent::instance("g", "Asset")).is_accept());
        assert!(exchange.should_save(&ExchangeEvent::type_def("g", "Asset")).is_accept());
        assert!(!exchange.may_originate_type_defs());
    }

    #[test]
    fn test_cohort_config_from_toml() {
        let cohort: CohortConfig = toml::from_str(
            r#"
            name = "dev"
            protocol = "DEDICATED_TOPICS"

            [events_to_save]
            rule = "SELECTED_TYPES"
            selectedTypes = [{ name = "Asset" }]
            "#,
        )
        .unwrap();
        assert_eq!(cohort.protocol, CohortTopicProtocol::DedicatedTopics);
        assert_eq!(cohort.events_to_save.selected_types.len(), 1);
        assert_eq!(cohort.events_to_send.rule, ExchangeRule::All);
    }
}
