use crate::{EdgeClassification, IdentityId, Warning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A Severed or Simplified edge annotated with its downstream consequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEdge {
    pub edge_id: String,
    pub edge: EdgeClassification,
    /// Distinct affected identities reachable downstream of the edge's destination.
    pub consequence_score: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlastRadiusReport {
    pub seed_identities: BTreeSet<IdentityId>,
    pub affected_identities: BTreeSet<IdentityId>,
    /// Ranked descending by consequence score, ties in declaration order.
    pub severed_edges: Vec<RankedEdge>,
    /// Edge ids of the top-K ranked edges.
    pub key_edges: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl BlastRadiusReport {
    pub fn key_edge_details(&self) -> impl Iterator<Item = &RankedEdge> {
        self.severed_edges.iter().take(self.key_edges.len())
    }

    pub fn is_affected(&self, identity: &str) -> bool {
        self.affected_identities.contains(identity)
    }
}

/// Fixed-template explanation of one ranked edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub edge_id: String,
    pub ranked_explanation: String,
}
