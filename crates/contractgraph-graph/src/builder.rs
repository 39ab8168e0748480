use crate::graph::ContractGraph;
use contractgraph_core::{
    strip_extension, Component, ComponentId, ContractFacts, Edge, EdgeKind, PayloadShape,
    Snapshot, Symbol, SymbolKind, Warning, WarningCode,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// An export a consumer may bind to.
#[derive(Debug, Clone)]
struct Producer<'a> {
    id: ComponentId,
    path: &'a str,
    symbol: &'a Symbol,
}

/// Turns the per-file facts of one snapshot into a [`ContractGraph`].
pub struct GraphBuilder<'a> {
    snapshot: Snapshot,
    files: &'a BTreeMap<String, ContractFacts>,
    components: BTreeMap<ComponentId, Component>,
    file_components: BTreeMap<&'a str, Vec<ComponentId>>,
    producers: Vec<Producer<'a>>,
    edges: Vec<Edge>,
    edge_index: BTreeMap<(ComponentId, ComponentId, EdgeKind), usize>,
    warnings: Vec<Warning>,
    reported: BTreeSet<(String, String, Option<String>)>,
}

/// True when a module path (extension stripped) is what `origin` refers to.
/// Root-relative origins (`@/x`, `crate::x`) match as a path suffix.
fn origin_matches(path: &str, origin: &str) -> bool {
    let module = strip_extension(path);
    [
        origin.to_string(),
        format!("{}/index", origin),
        format!("{}/mod", origin),
    ]
    .iter()
    .any(|target| module == target || module.ends_with(&format!("/{}", target)))
}

impl<'a> GraphBuilder<'a> {
    pub fn new(snapshot: Snapshot, files: &'a BTreeMap<String, ContractFacts>) -> Self {
        Self {
            snapshot,
            files,
            components: BTreeMap::new(),
            file_components: BTreeMap::new(),
            producers: Vec::new(),
            edges: Vec::new(),
            edge_index: BTreeMap::new(),
            warnings: Vec::new(),
            reported: BTreeSet::new(),
        }
    }

    pub fn build(mut self) -> (ContractGraph, Vec<Warning>) {
        self.create_components();
        for (path, facts) in self.files {
            for symbol in facts.produces.iter().chain(facts.consumes.iter()) {
                self.connect(path, symbol);
            }
        }
        info!(
            "Built {} graph: {} components, {} edges, {} unresolved",
            self.snapshot,
            self.components.len(),
            self.edges.len(),
            self.warnings.len()
        );
        let graph = ContractGraph::new(
            self.snapshot,
            self.components,
            self.edges,
            self.files.clone(),
        );
        (graph, self.warnings)
    }

    fn create_components(&mut self) {
        for (path, facts) in self.files {
            let mut ids = Vec::new();
            for symbol in facts.exports() {
                let component = Component::export(path, &symbol.name, self.snapshot);
                if !ids.contains(&component.id) {
                    ids.push(component.id.clone());
                }
                self.producers.push(Producer {
                    id: component.id.clone(),
                    path,
                    symbol,
                });
                self.components.entry(component.id.clone()).or_insert(component);
            }
            if ids.is_empty() {
                let component = Component::file_root(path, self.snapshot);
                ids.push(component.id.clone());
                self.components.insert(component.id.clone(), component);
            }
            self.file_components.insert(path, ids);
        }
    }

    /// Components a fact of `path` is attributed to.
    fn attributed(&self, path: &str, scope: Option<&str>) -> Vec<ComponentId> {
        if let Some(scope) = scope {
            let id = format!("{}#{}", path, scope);
            if self.components.contains_key(&id) {
                return vec![id];
            }
        }
        self.file_components.get(path).cloned().unwrap_or_default()
    }

    fn synthetic(&mut self, component: Component) -> ComponentId {
        let id = component.id.clone();
        self.components.entry(id.clone()).or_insert(component);
        id
    }

    fn add_edge(
        &mut self,
        from: ComponentId,
        to: ComponentId,
        kind: EdgeKind,
        symbol: &Symbol,
        payload: PayloadShape,
    ) {
        if from == to {
            return;
        }
        let key = (from.clone(), to.clone(), kind);
        match self.edge_index.get(&key) {
            Some(&idx) => {
                let edge = &mut self.edges[idx];
                edge.payload.merge(&payload);
                edge.confidence = edge.confidence.min(symbol.confidence);
            }
            None => {
                debug!("Edge {} -> {} [{}]", from, to, kind);
                let mut edge = Edge::new(from, to, kind);
                edge.payload = payload;
                edge.confidence = symbol.confidence;
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
    }

    fn connect(&mut self, path: &str, symbol: &Symbol) {
        let owners = self.attributed(path, symbol.scope.as_deref());
        match symbol.kind {
            SymbolKind::Export => {}
            SymbolKind::StateWrite => {
                let store = self.synthetic(Component::store(&symbol.name, self.snapshot));
                for owner in owners {
                    let payload = symbol.payload.clone();
                    self.add_edge(owner, store.clone(), EdgeKind::StateWrite, symbol, payload);
                }
            }
            SymbolKind::StateRead => {
                let store = self.synthetic(Component::store(&symbol.name, self.snapshot));
                for owner in owners {
                    let payload = symbol.payload.clone();
                    self.add_edge(store.clone(), owner, EdgeKind::StateRead, symbol, payload);
                }
            }
            SymbolKind::ExternalCall => {
                let external = self.synthetic(Component::external(&symbol.name, self.snapshot));
                for owner in owners {
                    let payload = symbol.payload.clone();
                    self.add_edge(owner, external.clone(), EdgeKind::Call, symbol, payload);
                }
            }
            SymbolKind::Import => {
                let Some(producers) = self.resolve(path, symbol) else {
                    return;
                };
                for (producer, declared) in producers {
                    let payload = match &declared {
                        Some(declared) => symbol.payload.constrain_by(declared),
                        None => symbol.payload.clone(),
                    };
                    for owner in &owners {
                        let payload = payload.clone();
                        self.add_edge(producer.clone(), owner.clone(), symbol.via, symbol, payload);
                    }
                }
            }
        }
    }

    /// Producers an import binds to, with their declared payload.
    fn resolve(
        &mut self,
        importer: &str,
        symbol: &Symbol,
    ) -> Option<Vec<(ComponentId, Option<PayloadShape>)>> {
        let origin = symbol.origin.as_deref().filter(|o| !o.is_empty());
        let wildcard = symbol.name == "*";
        let mut candidates: Vec<&Producer<'a>> = self
            .producers
            .iter()
            .filter(|p| p.path != importer)
            .filter(|p| {
                if wildcard {
                    true
                } else if symbol.default {
                    p.symbol.default
                } else {
                    p.symbol.name == symbol.name
                }
            })
            .filter(|p| origin.map(|o| origin_matches(p.path, o)).unwrap_or(!wildcard))
            .collect();
        candidates.dedup_by(|a, b| a.id == b.id);

        let resolved = match (wildcard, candidates.len()) {
            (_, 0) => None,
            (true, _) => Some(candidates.iter().map(|p| (p.id.clone(), None)).collect()),
            (false, 1) => {
                let producer = candidates[0];
                Some(vec![(producer.id.clone(), Some(producer.symbol.payload.clone()))])
            }
            (false, _) => {
                let paths: BTreeSet<&str> = candidates.iter().map(|p| p.path).collect();
                let message = format!(
                    "`{}` is ambiguous between {} producers ({})",
                    symbol.name,
                    candidates.len(),
                    paths.into_iter().collect::<Vec<_>>().join(", ")
                );
                self.unresolved(importer, symbol, message);
                return None;
            }
        };
        if resolved.is_none() {
            let target = match origin {
                Some(origin) => format!("`{}` from `{}`", symbol.name, origin),
                None => format!("`{}`", symbol.name),
            };
            self.unresolved(
                importer,
                symbol,
                format!("{} has no producer in the {} snapshot", target, self.snapshot),
            );
        }
        resolved
    }

    fn unresolved(&mut self, importer: &str, symbol: &Symbol, message: String) {
        let key = (importer.to_string(), symbol.name.clone(), symbol.origin.clone());
        if self.reported.insert(key) {
            self.warnings.push(Warning::new(
                WarningCode::UnresolvedConsumption,
                Some(importer),
                message,
            ));
        }
    }
}
