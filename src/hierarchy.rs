//! Type Hierarchy Graph
//!
//! Directed graph of `superType` links, built with petgraph. An edge runs from
//! a subtype to its supertype, so outgoing edges walk towards the root and
//! incoming edges enumerate direct subtypes.
//!
//! Single inheritance means every node has at most one outgoing edge; the
//! graph is still checked for cycles because definitions arriving from peers
//! or archives are not trusted.

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use crate::error::{Result, TypeRegistryError};
use crate::exchange::TypeAncestry;
use crate::typedef::{TypeDef, TypeDefLink};

/// Supertype graph over a set of type definitions
#[derive(Debug, Default)]
pub struct TypeHierarchy {
    graph: DiGraph<TypeDefLink, ()>,
    /// guid -> node
    node_indices: HashMap<String, NodeIndex>,
    /// name -> guid (first registration wins)
    by_name: HashMap<String, String>,
    /// Supertype links whose target is not part of the graph
    dangling: Vec<(TypeDefLink, TypeDefLink)>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a set of definitions
    pub fn build<'a>(type_defs: impl IntoIterator<Item = &'a TypeDef>) -> Self {
        let type_defs: Vec<&TypeDef> = type_defs.into_iter().collect();
        let mut hierarchy = Self::new();
        for type_def in &type_defs {
            hierarchy.add_node(type_def.link());
        }
        for type_def in &type_defs {
            if let Some(super_type) = &type_def.super_type {
                hierarchy.add_super_type(&type_def.link(), super_type);
            }
        }
        hierarchy
    }

    fn add_node(&mut self, link: TypeDefLink) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&link.guid) {
            return idx;
        }
        self.by_name.entry(link.name.clone()).or_insert_with(|| link.guid.clone());
        let guid = link.guid.clone();
        let idx = self.graph.add_node(link);
        self.node_indices.insert(guid, idx);
        idx
    }

    fn add_super_type(&mut self, sub_type: &TypeDefLink, super_type: &TypeDefLink) {
        match (
            self.node_indices.get(&sub_type.guid),
            self.node_indices.get(&super_type.guid),
        ) {
            (Some(&from), Some(&to)) => {
                self.graph.update_edge(from, to, ());
            }
            _ => self.dangling.push((sub_type.clone(), super_type.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.node_indices.contains_key(guid)
    }

    /// Look up a node by guid, falling back to name when the guid is empty
    fn node(&self, guid: &str, name: &str) -> Option<NodeIndex> {
        if !guid.is_empty() {
            if let Some(&idx) = self.node_indices.get(guid) {
                return Some(idx);
            }
        }
        self.by_name
            .get(name)
            .and_then(|guid| self.node_indices.get(guid))
            .copied()
    }

    /// Direct supertype
    pub fn super_type(&self, guid: &str) -> Option<&TypeDefLink> {
        let idx = *self.node_indices.get(guid)?;
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .and_then(|e| self.graph.node_weight(e.target()))
    }

    /// Supertypes from the direct parent up to the root
    pub fn ancestors(&self, guid: &str, name: &str) -> Vec<TypeDefLink> {
        let Some(mut idx) = self.node(guid, name) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        // Bounded by node count so a cycle cannot loop forever
        for _ in 0..self.graph.node_count() {
            let Some(edge) = self.graph.edges_directed(idx, Direction::Outgoing).next() else {
                break;
            };
            idx = edge.target();
            result.push(self.graph[idx].clone());
        }
        result
    }

    /// Direct subtypes
    pub fn subtypes(&self, guid: &str) -> Vec<TypeDefLink> {
        let Some(&idx) = self.node_indices.get(guid) else {
            return Vec::new();
        };
        let mut links: Vec<TypeDefLink> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| self.graph[e.source()].clone())
            .collect();
        links.sort_by(|a, b| a.name.cmp(&b.name));
        links
    }

    /// All subtypes, direct and indirect
    pub fn descendants(&self, guid: &str) -> Vec<TypeDefLink> {
        let Some(&start) = self.node_indices.get(guid) else {
            return Vec::new();
        };
        let mut seen = vec![start];
        let mut queue = vec![start];
        let mut result = Vec::new();
        while let Some(idx) = queue.pop() {
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                let child = edge.source();
                if !seen.contains(&child) {
                    seen.push(child);
                    queue.push(child);
                    result.push(self.graph[child].clone());
                }
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }

    /// Whether `guid` is `ancestor_guid` or inherits from it
    pub fn is_a(&self, guid: &str, ancestor_guid: &str) -> bool {
        guid == ancestor_guid || self.ancestors(guid, "").iter().any(|l| l.guid == ancestor_guid)
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Supertype links that point outside the graph
    pub fn dangling_links(&self) -> &[(TypeDefLink, TypeDefLink)] {
        &self.dangling
    }

    /// Order in which the types can be installed: every supertype before its subtypes
    pub fn install_order(&self) -> Result<Vec<TypeDefLink>> {
        let mut order = toposort(&self.graph, None).map_err(|cycle| {
            let link = &self.graph[cycle.node_id()];
            TypeRegistryError::invalid(&link.name, "supertype chain is cyclic")
        })?;
        // Edges point towards supertypes, so the topological order lists subtypes first
        order.reverse();
        Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
    }
}

impl TypeAncestry for TypeHierarchy {
    fn ancestors_of(&self, type_guid: &str, type_name: &str) -> Vec<TypeDefLink> {
        self.ancestors(type_guid, type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(guid: &str, name: &str, super_type: Option<(&str, &str)>) -> TypeDef {
        let def = TypeDef::entity(guid, name);
        match super_type {
            Some((g, n)) => def.with_super_type(TypeDefLink::new(g, n)),
            None => def,
        }
    }

    fn sample() -> Vec<TypeDef> {
        vec![
            entity("g-data-set", "DataSet", Some(("g-asset", "Asset"))),
            entity("g-referenceable", "Referenceable", None),
            entity("g-asset", "Asset", Some(("g-referenceable", "Referenceable"))),
            entity("g-table", "Table", Some(("g-data-set", "DataSet"))),
            entity("g-process", "Process", Some(("g-asset", "Asset"))),
        ]
    }

    #[test]
    fn test_ancestors_walk_to_root() {
        let hierarchy = TypeHierarchy::build(&sample());
        let names: Vec<String> = hierarchy
            .ancestors("g-table", "Table")
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["DataSet", "Asset", "Referenceable"]);
        assert!(hierarchy.ancestors("g-referenceable", "Referenceable").is_empty());
    }

    #[test]
    fn test_lookup_by_name_when_guid_unknown() {
        let hierarchy = TypeHierarchy::build(&sample());
        assert_eq!(hierarchy.ancestors("", "Process").len(), 2);
        assert!(hierarchy.ancestors("nope", "Nope").is_empty());
    }

    #[test]
    fn test_subtypes_and_descendants() {
        let hierarchy = TypeHierarchy::build(&sample());
        let direct: Vec<String> = hierarchy.subtypes("g-asset").into_iter().map(|l| l.name).collect();
        assert_eq!(direct, vec!["DataSet", "Process"]);
        assert_eq!(hierarchy.descendants("g-referenceable").len(), 4);
        assert!(hierarchy.is_a("g-table", "g-asset"));
        assert!(!hierarchy.is_a("g-process", "g-data-set"));
    }

    #[test]
    fn test_install_order_puts_supertypes_first() {
        let hierarchy = TypeHierarchy::build(&sample());
        let order: Vec<String> = hierarchy.install_order().unwrap().into_iter().map(|l| l.guid).collect();
        let pos = |g: &str| order.iter().position(|x| x == g).unwrap();
        assert!(pos("g-referenceable") < pos("g-asset"));
        assert!(pos("g-asset") < pos("g-data-set"));
        assert!(pos("g-data-set") < pos("g-table"));
    }

    #[test]
    fn test_cycle_detected() {
        let defs = vec![
            entity("g-a", "A", Some(("g-b", "B"))),
            entity("g-b", "B", Some(("g-a", "A"))),
        ];
        let hierarchy = TypeHierarchy::build(&defs);
        assert!(hierarchy.is_cyclic());
        assert!(hierarchy.install_order().is_err());
        assert!(hierarchy.ancestors("g-a", "A").len() <= 2);
    }

    #[test]
    fn test_dangling_super_type() {
        let defs = vec![entity("g-a", "A", Some(("g-missing", "Missing")))];
        let hierarchy = TypeHierarchy::build(&defs);
        assert_eq!(hierarchy.dangling_links().len(), 1);
        assert!(hierarchy.super_type("g-a").is_none());
    }
}
