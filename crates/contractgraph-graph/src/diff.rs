// ABOUTME: Classifies identities and edges between the before and after contract graphs
// ABOUTME: Deleted endpoints sever edges first, then presence and payload narrowing decide

use crate::graph::ContractGraph;
use crate::identity::IdentityMap;
use contractgraph_core::{
    Component, ContractFacts, EdgeClassification, EdgeKind, EdgeStatus, IdentityId,
    NodeClassification, NodeStatus, PayloadShape,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

type EdgeKey = (IdentityId, IdentityId, EdgeKind);

/// Classifies every identity and every edge of a before/after pair.
pub struct GraphDiffer<'a> {
    before: &'a ContractGraph,
    after: &'a ContractGraph,
    identities: &'a IdentityMap,
}

/// File facts with import origins erased, so moving a file does not by itself
/// read as a contract change.
fn comparable_facts(facts: Option<&ContractFacts>) -> ContractFacts {
    let mut facts = facts.cloned().unwrap_or_default();
    for symbol in facts.produces.iter_mut().chain(facts.consumes.iter_mut()) {
        symbol.origin = None;
    }
    facts.normalize();
    facts
}

impl<'a> GraphDiffer<'a> {
    pub fn new(
        before: &'a ContractGraph,
        after: &'a ContractGraph,
        identities: &'a IdentityMap,
    ) -> Self {
        Self {
            before,
            after,
            identities,
        }
    }

    fn node_status(&self, before: Option<&Component>, after: Option<&Component>) -> NodeStatus {
        match (before, after) {
            (Some(_), None) => NodeStatus::Deleted,
            (None, _) => NodeStatus::Created,
            (Some(b), Some(a)) => {
                if b.is_synthetic() && a.is_synthetic() {
                    return NodeStatus::Unchanged;
                }
                let before_facts = comparable_facts(self.before.facts_for(&b.path));
                let after_facts = comparable_facts(self.after.facts_for(&a.path));
                if before_facts == after_facts {
                    NodeStatus::Unchanged
                } else {
                    NodeStatus::Modified
                }
            }
        }
    }

    pub fn classify_nodes(&self) -> Vec<NodeClassification> {
        self.identities
            .matches()
            .iter()
            .map(|m| {
                let before = m.before.as_deref().and_then(|id| self.before.component(id));
                let after = m.after.as_deref().and_then(|id| self.after.component(id));
                let display_name = after
                    .or(before)
                    .map(|c| c.display_name.clone())
                    .unwrap_or_else(|| m.identity.clone());
                NodeClassification {
                    identity: m.identity.clone(),
                    display_name,
                    before: m.before.clone(),
                    after: m.after.clone(),
                    match_score: m.score,
                    status: self.node_status(before, after),
                    affected: false,
                }
            })
            .collect()
    }

    fn keyed<'g>(
        graph: &'g ContractGraph,
        identity_of: impl Fn(&str) -> Option<&'a IdentityId>,
    ) -> Vec<(EdgeKey, &'g PayloadShape)> {
        graph
            .edges()
            .iter()
            .filter_map(|edge| {
                let from = identity_of(&edge.from)?.clone();
                let to = identity_of(&edge.to)?.clone();
                Some(((from, to, edge.kind), &edge.payload))
            })
            .collect()
    }

    /// Node classifications are needed for the Deleted-endpoint rule, which
    /// takes precedence over every other edge signal.
    pub fn classify_edges(&self, nodes: &[NodeClassification]) -> Vec<EdgeClassification> {
        let status: BTreeMap<&str, NodeStatus> = nodes
            .iter()
            .map(|n| (n.identity.as_str(), n.status))
            .collect();
        let deleted = |id: &str| status.get(id) == Some(&NodeStatus::Deleted);

        let identities = self.identities;
        let before_edges = Self::keyed(self.before, |id| identities.identity_of_before(id));
        let after_edges = Self::keyed(self.after, |id| identities.identity_of_after(id));
        let after_index: BTreeMap<&EdgeKey, &PayloadShape> =
            after_edges.iter().map(|(k, p)| (k, *p)).collect();

        let mut out = Vec::with_capacity(before_edges.len() + after_edges.len());
        for (key, before_payload) in &before_edges {
            let (from, to, kind) = key;
            let after_payload = after_index.get(key).copied();
            let edge_status = if deleted(from.as_str()) || deleted(to.as_str()) {
                EdgeStatus::Severed
            } else {
                match after_payload {
                    None => EdgeStatus::Severed,
                    Some(after) if before_payload.narrowing_to(after).is_narrowed() => {
                        EdgeStatus::Simplified
                    }
                    Some(_) => EdgeStatus::Unchanged,
                }
            };
            debug!("{} -> {} [{}]: {}", from, to, kind, edge_status);
            out.push(EdgeClassification {
                from: from.clone(),
                to: to.clone(),
                kind: *kind,
                status: edge_status,
                before_payload: Some((*before_payload).clone()),
                after_payload: after_payload.cloned(),
                declaration_index: out.len(),
            });
        }

        let before_keys: BTreeSet<&EdgeKey> = before_edges.iter().map(|(k, _)| k).collect();
        for (key, after_payload) in &after_edges {
            if before_keys.contains(key) {
                continue;
            }
            let (from, to, kind) = key;
            let edge_status = if deleted(from.as_str()) || deleted(to.as_str()) {
                EdgeStatus::Severed
            } else {
                EdgeStatus::New
            };
            out.push(EdgeClassification {
                from: from.clone(),
                to: to.clone(),
                kind: *kind,
                status: edge_status,
                before_payload: None,
                after_payload: Some((*after_payload).clone()),
                declaration_index: out.len(),
            });
        }
        out
    }

    pub fn diff(&self) -> (Vec<NodeClassification>, Vec<EdgeClassification>) {
        let nodes = self.classify_nodes();
        let edges = self.classify_edges(&nodes);
        let count = |s: NodeStatus| nodes.iter().filter(|n| n.status == s).count();
        info!(
            "Diff: {} created, {} modified, {} deleted, {} unchanged; {} edges classified",
            count(NodeStatus::Created),
            count(NodeStatus::Modified),
            count(NodeStatus::Deleted),
            count(NodeStatus::Unchanged),
            edges.len()
        );
        (nodes, edges)
    }
}
