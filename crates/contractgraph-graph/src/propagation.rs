use contractgraph_core::{
    ContractGraphError, EdgeClassification, IdentityId, NodeClassification, Result,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

/// Identity-level adjacency over every classified edge. Severed edges come
/// from the before graph, every other status exists in the after graph.
#[derive(Debug, Clone, Default)]
pub struct Adjacency<'a> {
    forward: BTreeMap<&'a str, Vec<&'a str>>,
    backward: BTreeMap<&'a str, Vec<&'a str>>,
}

impl<'a> Adjacency<'a> {
    pub fn new(edges: &'a [EdgeClassification]) -> Self {
        let mut adjacency = Self::default();
        for edge in edges {
            adjacency
                .forward
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
            adjacency
                .backward
                .entry(edge.to.as_str())
                .or_default()
                .push(edge.from.as_str());
        }
        adjacency
    }

    pub fn successors(&self, id: &str) -> &[&'a str] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, id: &str) -> &[&'a str] {
        self.backward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every identity reachable forward from `start`, `start` included.
    pub fn reachable_from(&self, start: &'a str) -> BTreeSet<&'a str> {
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            for next in self.successors(id) {
                if seen.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        seen
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    pub seeds: BTreeSet<IdentityId>,
    pub affected: BTreeSet<IdentityId>,
    /// Node visits spent across both traversal directions.
    pub visits: usize,
}

impl Propagation {
    /// Marks `affected` on every node; nodes outside the set are cleared.
    pub fn apply(&self, nodes: &mut [NodeClassification]) {
        for node in nodes {
            node.affected = self.affected.contains(&node.identity);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

pub struct BlastRadiusPropagator {
    max_node_visits: usize,
}

impl BlastRadiusPropagator {
    pub fn new(max_node_visits: usize) -> Self {
        Self { max_node_visits }
    }

    /// Breadth-first spread from every non-Unchanged identity, forward along
    /// data flow and backward against it. Each identity is visited at most
    /// once per direction.
    pub fn propagate(
        &self,
        nodes: &[NodeClassification],
        edges: &[EdgeClassification],
    ) -> Result<Propagation> {
        let adjacency = Adjacency::new(edges);
        let seeds: BTreeSet<&str> = nodes
            .iter()
            .filter(|n| n.is_seed())
            .map(|n| n.identity.as_str())
            .collect();

        let mut visits = 0usize;
        let forward = self.traverse(&adjacency, &seeds, Direction::Forward, &mut visits)?;
        let backward = self.traverse(&adjacency, &seeds, Direction::Backward, &mut visits)?;

        let affected: BTreeSet<IdentityId> = forward
            .union(&backward)
            .map(|id| id.to_string())
            .collect();
        info!(
            "Propagation: {} seeds, {} affected, {} visits",
            seeds.len(),
            affected.len(),
            visits
        );
        Ok(Propagation {
            seeds: seeds.into_iter().map(str::to_string).collect(),
            affected,
            visits,
        })
    }

    fn traverse<'a>(
        &self,
        adjacency: &Adjacency<'a>,
        seeds: &BTreeSet<&'a str>,
        direction: Direction,
        visits: &mut usize,
    ) -> Result<BTreeSet<&'a str>> {
        let mut visited: BTreeSet<&'a str> = seeds.clone();
        let mut queue: VecDeque<&'a str> = seeds.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            *visits += 1;
            if *visits > self.max_node_visits {
                return Err(ContractGraphError::GraphCycleOverflow {
                    budget: self.max_node_visits,
                    visited: *visits,
                });
            }
            let neighbours = match direction {
                Direction::Forward => adjacency.successors(id),
                Direction::Backward => adjacency.predecessors(id),
            };
            for neighbour in neighbours {
                if visited.insert(*neighbour) {
                    debug!("{} reached from {}", neighbour, id);
                    queue.push_back(*neighbour);
                }
            }
        }
        Ok(visited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractgraph_core::{EdgeKind, EdgeStatus, NodeStatus};

    fn node(id: &str, status: NodeStatus) -> NodeClassification {
        NodeClassification {
            identity: id.to_string(),
            display_name: id.to_string(),
            before: Some(id.to_string()),
            after: Some(id.to_string()),
            match_score: Some(1.0),
            status,
            affected: false,
        }
    }

    fn edge(from: &str, to: &str, status: EdgeStatus) -> EdgeClassification {
        EdgeClassification {
            from: from.to_string(),
            to: to.to_string(),
            kind: EdgeKind::Call,
            status,
            before_payload: None,
            after_payload: None,
            declaration_index: 0,
        }
    }

    #[test]
    fn test_spreads_both_directions_from_seeds() {
        let nodes = vec![
            node("a", NodeStatus::Unchanged),
            node("b", NodeStatus::Modified),
            node("c", NodeStatus::Unchanged),
            node("d", NodeStatus::Unchanged),
            node("lonely", NodeStatus::Unchanged),
        ];
        let edges = vec![
            edge("a", "b", EdgeStatus::Unchanged),
            edge("b", "c", EdgeStatus::Severed),
            edge("c", "d", EdgeStatus::New),
        ];
        let propagation = BlastRadiusPropagator::new(100)
            .propagate(&nodes, &edges)
            .unwrap();
        let affected: Vec<&str> = propagation.affected.iter().map(String::as_str).collect();
        assert_eq!(affected, vec!["a", "b", "c", "d"]);
        assert_eq!(propagation.seeds.len(), 1);
    }

    #[test]
    fn test_cycles_terminate() {
        let nodes = vec![node("a", NodeStatus::Deleted), node("b", NodeStatus::Unchanged)];
        let edges = vec![
            edge("a", "b", EdgeStatus::Severed),
            edge("b", "a", EdgeStatus::Severed),
        ];
        let propagation = BlastRadiusPropagator::new(100)
            .propagate(&nodes, &edges)
            .unwrap();
        assert_eq!(propagation.affected.len(), 2);
        assert_eq!(propagation.visits, 4);
    }

    #[test]
    fn test_budget_overflow_is_fatal() {
        let nodes: Vec<_> = (0..10)
            .map(|i| node(&format!("n{}", i), NodeStatus::Modified))
            .collect();
        let err = BlastRadiusPropagator::new(5)
            .propagate(&nodes, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            ContractGraphError::GraphCycleOverflow { budget: 5, .. }
        ));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut nodes = vec![node("a", NodeStatus::Created), node("b", NodeStatus::Unchanged)];
        let edges = vec![edge("a", "b", EdgeStatus::New)];
        let propagator = BlastRadiusPropagator::new(100);
        let first = propagator.propagate(&nodes, &edges).unwrap();
        first.apply(&mut nodes);
        let second = propagator.propagate(&nodes, &edges).unwrap();
        second.apply(&mut nodes);
        assert_eq!(first, second);
        assert!(nodes.iter().all(|n| n.affected));
    }

    #[test]
    fn test_reachable_from_includes_start() {
        let edges = vec![
            edge("a", "b", EdgeStatus::Unchanged),
            edge("b", "c", EdgeStatus::Unchanged),
        ];
        let adjacency = Adjacency::new(&edges);
        assert_eq!(adjacency.reachable_from("b").len(), 2);
        assert_eq!(adjacency.reachable_from("z").len(), 1);
    }
}
