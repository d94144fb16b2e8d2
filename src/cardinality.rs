//! Cardinality and classification propagation rules
//!
//! Pure functions over the constraint enums. Nothing here holds state; callers
//! that traverse instance graphs own transitive propagation and cycle
//! termination.

use serde::{Deserialize, Serialize};

use crate::typedef::{ClassificationDef, RelationshipDef};

/// How many values an attribute may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeCardinality {
    #[default]
    Unknown,
    AtMostOne,
    OneOnly,
    AtLeastOneOrdered,
    AtLeastOneUnordered,
    AnyNumberOrdered,
    AnyNumberUnordered,
}

/// Ordering obligation a cardinality places on whoever stores the values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrdering {
    /// Insertion order must be kept
    Preserve,
    /// Storage may reorder values
    Any,
}

impl AttributeCardinality {
    /// Inclusive lower bound and optional upper bound on the value count
    pub fn bounds(&self) -> (usize, Option<usize>) {
        match self {
            AttributeCardinality::Unknown => (0, None),
            AttributeCardinality::AtMostOne => (0, Some(1)),
            AttributeCardinality::OneOnly => (1, Some(1)),
            AttributeCardinality::AtLeastOneOrdered | AttributeCardinality::AtLeastOneUnordered => (1, None),
            AttributeCardinality::AnyNumberOrdered | AttributeCardinality::AnyNumberUnordered => (0, None),
        }
    }

    /// Whether `count` values satisfy this cardinality
    pub fn admits(&self, count: usize) -> bool {
        let (min, max) = self.bounds();
        count >= min && max.map_or(true, |max| count <= max)
    }

    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            AttributeCardinality::AtLeastOneOrdered | AttributeCardinality::AnyNumberOrdered
        )
    }

    /// Declared as holding more than one value
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            AttributeCardinality::AtLeastOneOrdered
                | AttributeCardinality::AtLeastOneUnordered
                | AttributeCardinality::AnyNumberOrdered
                | AttributeCardinality::AnyNumberUnordered
        )
    }

    pub fn ordering(&self) -> ValueOrdering {
        if self.is_ordered() {
            ValueOrdering::Preserve
        } else {
            ValueOrdering::Any
        }
    }

    /// Whether every instance valid under `previous` stays valid under `self`
    ///
    /// The value-count range may only grow, and a multi-valued attribute keeps
    /// its ordering guarantee in either direction.
    pub fn is_compatible_with(&self, previous: AttributeCardinality) -> bool {
        let (old_min, old_max) = previous.bounds();
        let (new_min, new_max) = self.bounds();

        let range_kept = new_min <= old_min
            && match (old_max, new_max) {
                (_, None) => true,
                (None, Some(_)) => false,
                (Some(old), Some(new)) => new >= old,
            };

        let ordering_kept = !(previous.is_multi_valued() && self.is_multi_valued())
            || previous.is_ordered() == self.is_ordered();

        range_kept && ordering_kept
    }
}

/// Check a candidate value count against a declared cardinality
pub fn validate_attribute_value(cardinality: AttributeCardinality, candidate_count: usize) -> bool {
    cardinality.admits(candidate_count)
}

/// How many relationships of one type may attach at a single end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipEndCardinality {
    #[default]
    Unknown,
    AtMostOne,
    AnyNumber,
}

impl RelationshipEndCardinality {
    pub fn admits(&self, count: usize) -> bool {
        match self {
            RelationshipEndCardinality::AtMostOne => count <= 1,
            RelationshipEndCardinality::Unknown | RelationshipEndCardinality::AnyNumber => true,
        }
    }

    pub fn is_compatible_with(&self, previous: RelationshipEndCardinality) -> bool {
        match (previous, *self) {
            (p, n) if p == n => true,
            (RelationshipEndCardinality::AtMostOne, RelationshipEndCardinality::AnyNumber) => true,
            (RelationshipEndCardinality::Unknown, RelationshipEndCardinality::AnyNumber) => true,
            _ => false,
        }
    }
}

/// Whether a classification rides along a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationPropagationRule {
    #[default]
    None,
    OneToTwo,
    TwoToOne,
    Both,
}

/// One of the two ends of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipEnd {
    End1,
    End2,
}

impl RelationshipEnd {
    pub fn other(&self) -> RelationshipEnd {
        match self {
            RelationshipEnd::End1 => RelationshipEnd::End2,
            RelationshipEnd::End2 => RelationshipEnd::End1,
        }
    }
}

/// Direction of a single propagation hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropagationDirection {
    OneToTwo,
    TwoToOne,
}

impl PropagationDirection {
    /// Direction of travel for a classification attached at `from`
    pub fn from_end(from: RelationshipEnd) -> Self {
        match from {
            RelationshipEnd::End1 => PropagationDirection::OneToTwo,
            RelationshipEnd::End2 => PropagationDirection::TwoToOne,
        }
    }
}

/// Whether the rule lets a classification cross in the given direction
pub fn resolve_propagation(rule: ClassificationPropagationRule, direction: PropagationDirection) -> bool {
    match rule {
        ClassificationPropagationRule::None => false,
        ClassificationPropagationRule::OneToTwo => direction == PropagationDirection::OneToTwo,
        ClassificationPropagationRule::TwoToOne => direction == PropagationDirection::TwoToOne,
        ClassificationPropagationRule::Both => true,
    }
}

/// End a classification reaches in one hop, if any
///
/// Requires both a propagatable classification and a relationship rule that
/// permits the direction of travel.
pub fn propagation_target(
    classification: &ClassificationDef,
    relationship: &RelationshipDef,
    from: RelationshipEnd,
) -> Option<RelationshipEnd> {
    if !classification.propagatable {
        return None;
    }
    resolve_propagation(relationship.propagation_rule, PropagationDirection::from_end(from))
        .then(|| from.other())
}
