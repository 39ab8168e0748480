use crate::{ComponentId, EdgeKind, Narrowing, PayloadShape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable cross-snapshot handle for a component.
pub type IdentityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Created,
    Modified,
    Unchanged,
    Deleted,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Created => "created",
            NodeStatus::Modified => "modified",
            NodeStatus::Unchanged => "unchanged",
            NodeStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeStatus {
    Severed,
    Simplified,
    Unchanged,
    New,
}

impl fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeStatus::Severed => "severed",
            EdgeStatus::Simplified => "simplified",
            EdgeStatus::Unchanged => "unchanged",
            EdgeStatus::New => "new",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeClassification {
    pub identity: IdentityId,
    pub display_name: String,
    pub before: Option<ComponentId>,
    pub after: Option<ComponentId>,
    pub match_score: Option<f64>,
    pub status: NodeStatus,
    pub affected: bool,
}

impl NodeClassification {
    pub fn is_seed(&self) -> bool {
        self.status != NodeStatus::Unchanged
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeClassification {
    pub from: IdentityId,
    pub to: IdentityId,
    pub kind: EdgeKind,
    pub status: EdgeStatus,
    pub before_payload: Option<PayloadShape>,
    pub after_payload: Option<PayloadShape>,
    /// Before edges in before-graph order, then after-only edges in after-graph order.
    pub declaration_index: usize,
}

impl EdgeClassification {
    pub fn edge_id(&self) -> String {
        format!("{} -> {} [{}]", self.from, self.to, self.kind)
    }

    /// Severed and Simplified edges are the ones explained to reviewers.
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, EdgeStatus::Severed | EdgeStatus::Simplified)
    }

    pub fn narrowing(&self) -> Narrowing {
        match (&self.before_payload, &self.after_payload) {
            (Some(before), Some(after)) => before.narrowing_to(after),
            (Some(before), None) => before.narrowing_to(&PayloadShape::default()),
            _ => Narrowing::default(),
        }
    }
}
