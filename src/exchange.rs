//! Exchange policy
//!
//! Decides whether a type or instance event crosses the repository boundary.
//! The decision is a pure function of the rule, the selected types, the event
//! and the two read-only collaborators it consults: the supertype chain of the
//! event's type and the set of types local consumers have asked for.
//!
//! Rules, first match wins:
//!
//! | Rule | TypeDef events | Instance events |
//! |---|---|---|
//! | RegistrationOnly | reject | reject |
//! | JustTypeDefs | accept | reject |
//! | SelectedTypes | accept | accept iff the type or an ancestor is selected |
//! | DeselectedTypes | accept | reject iff the type or an ancestor is selected |
//! | LearnedTypes | accept | accept iff the type was learned |
//! | All | accept | accept |

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::typedef::{TypeDefLink, TypeDefSummary};

/// Which events a repository saves or sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeRule {
    RegistrationOnly,
    #[serde(rename = "JUST_TYPEDEFS", alias = "JUST_TYPE_DEFS")]
    JustTypeDefs,
    SelectedTypes,
    DeselectedTypes,
    LearnedTypes,
    #[default]
    All,
}

impl ExchangeRule {
    pub const ALL: [ExchangeRule; 6] = [
        ExchangeRule::RegistrationOnly,
        ExchangeRule::JustTypeDefs,
        ExchangeRule::SelectedTypes,
        ExchangeRule::DeselectedTypes,
        ExchangeRule::LearnedTypes,
        ExchangeRule::All,
    ];

    /// Position in the partial order; the three filtering rules share a level
    pub fn level(&self) -> u8 {
        match self {
            ExchangeRule::RegistrationOnly => 0,
            ExchangeRule::JustTypeDefs => 1,
            ExchangeRule::SelectedTypes | ExchangeRule::DeselectedTypes | ExchangeRule::LearnedTypes => 2,
            ExchangeRule::All => 3,
        }
    }

    /// Whether the rule consults `selected_types`
    pub fn uses_selected_types(&self) -> bool {
        matches!(self, ExchangeRule::SelectedTypes | ExchangeRule::DeselectedTypes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeRule::RegistrationOnly => "REGISTRATION_ONLY",
            ExchangeRule::JustTypeDefs => "JUST_TYPEDEFS",
            ExchangeRule::SelectedTypes => "SELECTED_TYPES",
            ExchangeRule::DeselectedTypes => "DESELECTED_TYPES",
            ExchangeRule::LearnedTypes => "LEARNED_TYPES",
            ExchangeRule::All => "ALL",
        }
    }
}

impl fmt::Display for ExchangeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|rule| rule.as_str() == normalized || rule.as_str().replace("TYPEDEFS", "TYPE_DEFS") == normalized)
            .ok_or_else(|| format!("unknown exchange rule: {}", s))
    }
}

/// The identity of the type an event is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeEvent {
    #[serde(rename = "typeGUID", default)]
    pub type_guid: String,
    pub type_name: String,
    /// True for TypeDef events, false for instance events
    #[serde(default)]
    pub is_type_def_event: bool,
}

impl ExchangeEvent {
    pub fn type_def(type_guid: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_guid: type_guid.into(),
            type_name: type_name.into(),
            is_type_def_event: true,
        }
    }

    pub fn instance(type_guid: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_guid: type_guid.into(),
            type_name: type_name.into(),
            is_type_def_event: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeDecision {
    Accept,
    Reject,
}

impl ExchangeDecision {
    fn from_bool(accept: bool) -> Self {
        if accept {
            ExchangeDecision::Accept
        } else {
            ExchangeDecision::Reject
        }
    }

    pub fn is_accept(&self) -> bool {
        *self == ExchangeDecision::Accept
    }
}

impl fmt::Display for ExchangeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeDecision::Accept => f.write_str("ACCEPT"),
            ExchangeDecision::Reject => f.write_str("REJECT"),
        }
    }
}

/// Read-only view of supertype chains
pub trait TypeAncestry {
    /// Supertypes of the given type, nearest first; empty when the type is unknown
    fn ancestors_of(&self, type_guid: &str, type_name: &str) -> Vec<TypeDefLink>;
}

/// No supertype information: every type is a root
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAncestry;

impl TypeAncestry for NoAncestry {
    fn ancestors_of(&self, _type_guid: &str, _type_name: &str) -> Vec<TypeDefLink> {
        Vec::new()
    }
}

/// Types that a local consumer has asked for
pub trait LearnedTypes {
    fn is_learned(&self, type_guid: &str, type_name: &str) -> bool;
}

/// Holds guids, names or a mix of both
impl LearnedTypes for HashSet<String> {
    fn is_learned(&self, type_guid: &str, type_name: &str) -> bool {
        (!type_guid.is_empty() && self.contains(type_guid)) || self.contains(type_name)
    }
}

/// Nothing has been learned yet
impl LearnedTypes for () {
    fn is_learned(&self, _type_guid: &str, _type_name: &str) -> bool {
        false
    }
}

/// Whether `selected` names the event's type or one of its ancestors
fn matches_selection(selected: &[TypeDefSummary], event: &ExchangeEvent, ancestry: &dyn TypeAncestry) -> bool {
    if selected.iter().any(|s| s.identifies(&event.type_guid, &event.type_name)) {
        return true;
    }
    ancestry
        .ancestors_of(&event.type_guid, &event.type_name)
        .iter()
        .any(|ancestor| selected.iter().any(|s| s.identifies(&ancestor.guid, &ancestor.name)))
}

/// Decide one event
pub fn decide(
    rule: ExchangeRule,
    selected: &[TypeDefSummary],
    event: &ExchangeEvent,
    ancestry: &dyn TypeAncestry,
    learned: &dyn LearnedTypes,
) -> ExchangeDecision {
    let accept = match rule {
        ExchangeRule::RegistrationOnly => false,
        ExchangeRule::JustTypeDefs => event.is_type_def_event,
        ExchangeRule::SelectedTypes => event.is_type_def_event || matches_selection(selected, event, ancestry),
        ExchangeRule::DeselectedTypes => event.is_type_def_event || !matches_selection(selected, event, ancestry),
        ExchangeRule::LearnedTypes => {
            event.is_type_def_event || learned.is_learned(&event.type_guid, &event.type_name)
        }
        ExchangeRule::All => true,
    };
    let decision = ExchangeDecision::from_bool(accept);
    debug!(
        rule = %rule,
        type_name = %event.type_name,
        type_def_event = event.is_type_def_event,
        decision = %decision,
        "exchange decision"
    );
    decision
}

/// A rule together with its selected types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePolicy {
    pub rule: ExchangeRule,
    #[serde(default, alias = "selected_types", skip_serializing_if = "Vec::is_empty")]
    pub selected_types: Vec<TypeDefSummary>,
}

impl ExchangePolicy {
    pub fn new(rule: ExchangeRule) -> Self {
        Self {
            rule,
            selected_types: Vec::new(),
        }
    }

    pub fn selecting(rule: ExchangeRule, selected_types: Vec<TypeDefSummary>) -> Self {
        Self { rule, selected_types }
    }

    pub fn decide(
        &self,
        event: &ExchangeEvent,
        ancestry: &dyn TypeAncestry,
        learned: &dyn LearnedTypes,
    ) -> ExchangeDecision {
        decide(self.rule, &self.selected_types, event, ancestry, learned)
    }

    /// A selection rule with nothing selected is legal but probably a mistake
    pub fn has_empty_selection(&self) -> bool {
        self.rule.uses_selected_types() && self.selected_types.is_empty()
    }
}
