use crate::propagation::Adjacency;
use contractgraph_core::{
    EdgeClassification, EdgeStatus, IdentityId, Narrative, NodeClassification, NodeStatus,
    RankedEdge,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ranking {
    /// Severed and Simplified edges, highest consequence first.
    pub ranked: Vec<RankedEdge>,
    pub key_edges: Vec<String>,
    /// One explanation per ranked edge, in ranked order.
    pub narratives: Vec<Narrative>,
}

pub struct NarrativeRanker {
    top_k: usize,
}

impl NarrativeRanker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn rank(
        &self,
        nodes: &[NodeClassification],
        edges: &[EdgeClassification],
        affected: &BTreeSet<IdentityId>,
    ) -> Ranking {
        let adjacency = Adjacency::new(edges);
        let status: BTreeMap<&str, NodeStatus> = nodes
            .iter()
            .map(|n| (n.identity.as_str(), n.status))
            .collect();

        let mut degraded: Vec<&EdgeClassification> =
            edges.iter().filter(|e| e.is_degraded()).collect();
        degraded.sort_by_key(|e| e.declaration_index);

        let mut ranked: Vec<RankedEdge> = degraded
            .into_iter()
            .map(|edge| {
                let consequence_score = adjacency
                    .reachable_from(edge.to.as_str())
                    .into_iter()
                    .filter(|id| affected.contains(*id))
                    .count();
                debug!("{} scores {}", edge.edge_id(), consequence_score);
                RankedEdge {
                    edge_id: edge.edge_id(),
                    edge: edge.clone(),
                    consequence_score,
                }
            })
            .collect();
        // stable: ties keep declaration order
        ranked.sort_by(|a, b| b.consequence_score.cmp(&a.consequence_score));

        let key_edges: Vec<String> = ranked
            .iter()
            .take(self.top_k)
            .map(|r| r.edge_id.clone())
            .collect();
        let narratives = ranked
            .iter()
            .map(|r| Narrative {
                edge_id: r.edge_id.clone(),
                ranked_explanation: explain(r, &status),
            })
            .collect();

        info!(
            "Ranking: {} degraded edges, {} key",
            ranked.len(),
            key_edges.len()
        );
        Ranking {
            ranked,
            key_edges,
            narratives,
        }
    }
}

fn joined(items: &[String]) -> String {
    items.join(", ")
}

fn lost_facts(edge: &EdgeClassification, status: &BTreeMap<&str, NodeStatus>) -> String {
    let mut parts = Vec::new();
    for endpoint in [&edge.from, &edge.to] {
        if status.get(endpoint.as_str()) == Some(&NodeStatus::Deleted) {
            parts.push(format!("`{}` no longer exists", endpoint));
        }
    }
    if parts.is_empty() {
        parts.push("the dependency is gone after the change".to_string());
    }
    if let Some(payload) = edge.before_payload.as_ref().filter(|p| !p.fields.is_empty()) {
        parts.push(format!("it carried {}", payload.describe_fields()));
    }
    parts.join("; ")
}

fn changed_facts(edge: &EdgeClassification) -> String {
    let narrowing = edge.narrowing();
    let mut parts = Vec::new();
    if !narrowing.dropped_fields.is_empty() {
        parts.push(format!("dropped {}", joined(&narrowing.dropped_fields)));
    }
    if !narrowing.now_optional.is_empty() {
        parts.push(format!("{} became optional", joined(&narrowing.now_optional)));
    }
    if !narrowing.removed_guards.is_empty() {
        parts.push(format!("no longer guarded by {}", joined(&narrowing.removed_guards)));
    }
    parts.join("; ")
}

fn explain(ranked: &RankedEdge, status: &BTreeMap<&str, NodeStatus>) -> String {
    let edge = &ranked.edge;
    let (verb, detail) = match edge.status {
        EdgeStatus::Severed => ("severed", lost_facts(edge, status)),
        _ => ("simplified", changed_facts(edge)),
    };
    format!(
        "`{}` → `{}` ({}) was {}: {}. {} affected component(s) downstream of `{}`.",
        edge.from, edge.to, edge.kind, verb, detail, ranked.consequence_score, edge.to
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractgraph_core::{EdgeKind, PayloadShape};

    fn edge(from: &str, to: &str, status: EdgeStatus, index: usize) -> EdgeClassification {
        EdgeClassification {
            from: from.to_string(),
            to: to.to_string(),
            kind: EdgeKind::Call,
            status,
            before_payload: Some(PayloadShape::default().with_field("#0", false)),
            after_payload: None,
            declaration_index: index,
        }
    }

    fn affected(ids: &[&str]) -> BTreeSet<IdentityId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranks_by_consequence_then_declaration_order() {
        let edges = vec![
            edge("a", "b", EdgeStatus::Severed, 0),
            edge("x", "c", EdgeStatus::Severed, 1),
            edge("c", "d", EdgeStatus::Unchanged, 2),
            edge("y", "e", EdgeStatus::Severed, 3),
        ];
        let ranking = NarrativeRanker::new(2).rank(
            &[],
            &edges,
            &affected(&["a", "b", "c", "d", "e", "x", "y"]),
        );
        let order: Vec<&str> = ranking.ranked.iter().map(|r| r.edge.to.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "e"]);
        assert_eq!(ranking.ranked[0].consequence_score, 2);
        assert_eq!(ranking.key_edges, vec!["x -> c [call]", "a -> b [call]"]);
        assert_eq!(ranking.narratives.len(), 3);
    }

    #[test]
    fn test_unaffected_nodes_do_not_count() {
        let edges = vec![
            edge("a", "b", EdgeStatus::Severed, 0),
            edge("b", "c", EdgeStatus::Unchanged, 1),
        ];
        let ranking = NarrativeRanker::new(3).rank(&[], &edges, &affected(&["a", "b"]));
        assert_eq!(ranking.ranked[0].consequence_score, 1);
    }

    #[test]
    fn test_severed_narrative_names_lost_facts() {
        let nodes = vec![NodeClassification {
            identity: "a".into(),
            display_name: "a".into(),
            before: Some("a".into()),
            after: None,
            match_score: None,
            status: NodeStatus::Deleted,
            affected: true,
        }];
        let edges = vec![edge("a", "b", EdgeStatus::Severed, 0)];
        let ranking = NarrativeRanker::new(3).rank(&nodes, &edges, &affected(&["a", "b"]));
        assert_eq!(
            ranking.narratives[0].ranked_explanation,
            "`a` → `b` (call) was severed: `a` no longer exists; it carried #0. \
             1 affected component(s) downstream of `b`."
        );
    }

    #[test]
    fn test_simplified_narrative_lists_changes() {
        let mut simplified = edge("a", "b", EdgeStatus::Simplified, 0);
        simplified.before_payload = Some(
            PayloadShape::default()
                .with_field("x", false)
                .with_field("y", false),
        );
        simplified.after_payload = Some(PayloadShape::default().with_field("x", true));
        let ranking = NarrativeRanker::new(3).rank(&[], &[simplified], &affected(&["b"]));
        assert_eq!(
            ranking.narratives[0].ranked_explanation,
            "`a` → `b` (call) was simplified: dropped y; x became optional. \
             1 affected component(s) downstream of `b`."
        );
    }
}
