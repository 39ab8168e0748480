// ABOUTME: End-to-end contract diff engine: ingest, extract, build, match, diff, propagate, rank
// ABOUTME: Owns stage ordering, warning accumulation and the serializable engine output

use crate::builder::GraphBuilder;
use crate::diff::GraphDiffer;
use crate::graph::ContractGraph;
use crate::identity::{IdentityMap, IdentityMatcher, IdentityOverride, WeightedJaccardScorer};
use crate::propagation::BlastRadiusPropagator;
use crate::ranking::NarrativeRanker;
use contractgraph_core::{
    BlastRadiusReport, ChangeIngestor, ChangeKind, ChangeSet, Component, ContextFile,
    ContractGraphError, Edge, EdgeClassification, EdgeKind, EngineConfig, IdentityId,
    MatchScorer, Narrative, NodeClassification, RawFileChange, Result, Snapshot, Warning,
};
use contractgraph_parser::{ContractExtractor, ExtractionPool};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineOutput {
    pub before: ContractGraph,
    pub after: ContractGraph,
    pub identities: IdentityMap,
    /// One classification per identity, ordered by identity.
    pub nodes: Vec<NodeClassification>,
    /// In declaration order.
    pub edges: Vec<EdgeClassification>,
    pub report: BlastRadiusReport,
    /// In ranked order.
    pub narratives: Vec<Narrative>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedNode<'a> {
    pub component: &'a Component,
    pub classification: Option<&'a NodeClassification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedEdge<'a> {
    pub edge: &'a Edge,
    pub classification: Option<&'a EdgeClassification>,
}

/// One snapshot's graph with node and edge classifications attached.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedGraph<'a> {
    pub snapshot: Snapshot,
    pub nodes: Vec<ClassifiedNode<'a>>,
    pub edges: Vec<ClassifiedEdge<'a>>,
}

impl EngineOutput {
    pub fn node(&self, identity: &str) -> Option<&NodeClassification> {
        self.nodes
            .binary_search_by(|n| n.identity.as_str().cmp(identity))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn edge(&self, from: &str, to: &str, kind: EdgeKind) -> Option<&EdgeClassification> {
        self.edges
            .iter()
            .find(|e| e.from == from && e.to == to && e.kind == kind)
    }

    fn identity_of(&self, snapshot: Snapshot, component: &str) -> Option<&IdentityId> {
        match snapshot {
            Snapshot::Before => self.identities.identity_of_before(component),
            Snapshot::After => self.identities.identity_of_after(component),
        }
    }

    pub fn classified_graph(&self, snapshot: Snapshot) -> ClassifiedGraph<'_> {
        let graph = match snapshot {
            Snapshot::Before => &self.before,
            Snapshot::After => &self.after,
        };
        let by_key: BTreeMap<(&str, &str, EdgeKind), &EdgeClassification> = self
            .edges
            .iter()
            .map(|e| ((e.from.as_str(), e.to.as_str(), e.kind), e))
            .collect();

        let nodes = graph
            .components()
            .map(|component| ClassifiedNode {
                component,
                classification: self.identity_of(snapshot, &component.id).and_then(|id| self.node(id)),
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|edge| {
                let from = self.identity_of(snapshot, &edge.from);
                let to = self.identity_of(snapshot, &edge.to);
                let classification = match (from, to) {
                    (Some(from), Some(to)) => {
                        by_key.get(&(from.as_str(), to.as_str(), edge.kind)).copied()
                    }
                    _ => None,
                };
                ClassifiedEdge {
                    edge,
                    classification,
                }
            })
            .collect();
        ClassifiedGraph {
            snapshot,
            nodes,
            edges,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Hex SHA-256 of the JSON rendering.
    pub fn digest(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json()?.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

pub struct ContractDiffEngine {
    config: EngineConfig,
    scorer: Arc<dyn MatchScorer>,
    overrides: Vec<IdentityOverride>,
}

impl ContractDiffEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ContractGraphError::Config(e.to_string()))?;
        let scorer = Arc::new(WeightedJaccardScorer::new(config.matching.name_weight));
        Ok(Self {
            config,
            scorer,
            overrides: Vec::new(),
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn MatchScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_overrides(mut self, overrides: Vec<IdentityOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(
        &self,
        records: Vec<RawFileChange>,
        context: Vec<ContextFile>,
    ) -> Result<EngineOutput> {
        let (changes, warnings) = {
            let _span = info_span!("ingest").entered();
            ChangeIngestor::ingest(records, context)?
        };
        self.run_with_warnings(&changes, warnings)
    }

    pub fn run_changeset(&self, changes: &ChangeSet) -> Result<EngineOutput> {
        if changes.is_empty() {
            return Err(ContractGraphError::NoChangesFound);
        }
        self.run_with_warnings(changes, Vec::new())
    }

    fn run_with_warnings(
        &self,
        changes: &ChangeSet,
        mut warnings: Vec<Warning>,
    ) -> Result<EngineOutput> {
        let started = Instant::now();

        let (before_facts, after_facts) = {
            let _span = info_span!("extract").entered();
            let extractor = ContractExtractor::new(&self.config.extraction)?;
            let pool = ExtractionPool::new(self.config.extraction.concurrency)?;
            let before =
                pool.extract_snapshot(&extractor, &changes.snapshot_files(Snapshot::Before));
            let after =
                pool.extract_snapshot(&extractor, &changes.snapshot_files(Snapshot::After));
            warnings.extend(before.warnings);
            warnings.extend(after.warnings);
            (before.files, after.files)
        };

        let (before, after) = {
            let _span = info_span!("build").entered();
            let (before, before_warnings) =
                GraphBuilder::new(Snapshot::Before, &before_facts).build();
            let (after, after_warnings) =
                GraphBuilder::new(Snapshot::After, &after_facts).build();
            warnings.extend(before_warnings);
            warnings.extend(after_warnings);
            (before, after)
        };

        let identities = {
            let _span = info_span!("match").entered();
            let renamed_files: BTreeMap<String, String> = changes
                .changes()
                .iter()
                .filter(|change| change.change_kind == ChangeKind::Renamed)
                .filter_map(|change| Some((change.old_path.clone()?, change.path.clone())))
                .collect();
            let (identities, match_warnings) =
                IdentityMatcher::new(self.scorer.clone(), self.config.matching.clone())
                    .with_overrides(self.overrides.clone())
                    .with_renamed_files(renamed_files)
                    .match_graphs(&before, &after)?;
            warnings.extend(match_warnings);
            identities
        };

        let (mut nodes, edges) = {
            let _span = info_span!("diff").entered();
            GraphDiffer::new(&before, &after, &identities).diff()
        };

        let propagation = {
            let _span = info_span!("propagate").entered();
            let propagation = BlastRadiusPropagator::new(self.config.propagation.max_node_visits)
                .propagate(&nodes, &edges)?;
            propagation.apply(&mut nodes);
            propagation
        };

        let ranking = {
            let _span = info_span!("rank").entered();
            NarrativeRanker::new(self.config.ranking.top_k).rank(
                &nodes,
                &edges,
                &propagation.affected,
            )
        };

        let report = BlastRadiusReport {
            seed_identities: propagation.seeds,
            affected_identities: propagation.affected,
            severed_edges: ranking.ranked,
            key_edges: ranking.key_edges,
            warnings,
        };
        info!(
            "Contract diff finished in {:?}: {} identities, {} affected, {} degraded edges, {} warnings",
            started.elapsed(),
            nodes.len(),
            report.affected_identities.len(),
            report.severed_edges.len(),
            report.warnings.len()
        );

        Ok(EngineOutput {
            before,
            after,
            identities,
            nodes,
            edges,
            report,
            narratives: ranking.narratives,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.matching.min_margin = 2.0;
        assert!(matches!(
            ContractDiffEngine::new(config),
            Err(ContractGraphError::Config(_))
        ));
    }

    #[test]
    fn test_empty_changeset_is_rejected() {
        let engine = ContractDiffEngine::new(EngineConfig::default()).unwrap();
        let err = engine.run(Vec::new(), Vec::new()).unwrap_err();
        assert!(err.is_ingest_error());
    }
}
