use contractgraph_core::{
    Component, ComponentId, ComponentKind, ContractFacts, Edge, EdgeKind, Snapshot, Symbol,
    SymbolKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directed data-flow graph of one snapshot. Built once by the
/// [`GraphBuilder`](crate::GraphBuilder) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractGraph {
    snapshot: Snapshot,
    components: BTreeMap<ComponentId, Component>,
    edges: Vec<Edge>,
    /// Per-file facts the graph was built from.
    facts: BTreeMap<String, ContractFacts>,
}

impl ContractGraph {
    pub(crate) fn new(
        snapshot: Snapshot,
        components: BTreeMap<ComponentId, Component>,
        edges: Vec<Edge>,
        facts: BTreeMap<String, ContractFacts>,
    ) -> Self {
        Self {
            snapshot,
            components,
            edges,
            facts,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Edges in declaration order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, from: &str, to: &str, kind: EdgeKind) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.from == from && e.to == to && e.kind == kind)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.to == id)
    }

    pub fn facts_for(&self, path: &str) -> Option<&ContractFacts> {
        self.facts.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = (&String, &ContractFacts)> {
        self.facts.iter()
    }

    /// Every edge endpoint names a component of this graph.
    pub fn is_well_formed(&self) -> bool {
        self.edges
            .iter()
            .all(|e| self.components.contains_key(&e.from) && self.components.contains_key(&e.to))
    }

    /// Facts attributed to a component: for an export, its own declaration,
    /// everything scoped to it and the module-level facts of its file; for a
    /// file root, every fact of the file. Synthetic components have none.
    pub fn scoped_symbols(&self, component: &Component) -> Vec<&Symbol> {
        let Some(facts) = self.facts.get(&component.path) else {
            return Vec::new();
        };
        let all = facts.produces.iter().chain(facts.consumes.iter());
        match component.kind {
            ComponentKind::FileRoot => all.collect(),
            ComponentKind::Export => all
                .filter(|s| match s.kind {
                    SymbolKind::Export => s.name == component.display_name,
                    _ => s.scope.is_none() || s.scope.as_deref() == Some(&component.display_name),
                })
                .collect(),
            ComponentKind::Store | ComponentKind::External => Vec::new(),
        }
    }
}
