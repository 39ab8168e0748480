// ABOUTME: Cross-snapshot identity matching of components, rename and move aware
// ABOUTME: Overrides, exact ids, same-file leftovers, then a pluggable similarity scorer with threshold and margin

use crate::graph::ContractGraph;
use contractgraph_core::{
    Component, ComponentId, ComponentKind, ComponentProfile, ContractGraphError, IdentityId,
    MatchScorer, MatchingConfig, Result, SymbolKind, Warning, WarningCode,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

const PRODUCE_WEIGHT: f64 = 2.0;
const CONSUME_WEIGHT: f64 = 1.0;
const INVARIANT_WEIGHT: f64 = 0.5;
const SCORE_EPSILON: f64 = 1e-9;

/// Caller-supplied resolution of an ambiguous rename/move. `after = None`
/// keeps the before component unmatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOverride {
    pub before: ComponentId,
    pub after: Option<ComponentId>,
}

impl IdentityOverride {
    pub fn link(before: &str, after: &str) -> Self {
        Self {
            before: before.to_string(),
            after: Some(after.to_string()),
        }
    }

    pub fn unmatched(before: &str) -> Self {
        Self {
            before: before.to_string(),
            after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMatch {
    pub identity: IdentityId,
    pub before: Option<ComponentId>,
    pub after: Option<ComponentId>,
    pub score: Option<f64>,
}

/// Mapping between before and after components, one entry per identity,
/// ordered by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityMap {
    matches: Vec<IdentityMatch>,
    by_before: BTreeMap<ComponentId, IdentityId>,
    by_after: BTreeMap<ComponentId, IdentityId>,
}

impl IdentityMap {
    fn from_matches(mut matches: Vec<IdentityMatch>) -> Self {
        matches.sort_by(|a, b| a.identity.cmp(&b.identity));
        let mut map = Self::default();
        for m in &matches {
            if let Some(before) = &m.before {
                map.by_before.insert(before.clone(), m.identity.clone());
            }
            if let Some(after) = &m.after {
                map.by_after.insert(after.clone(), m.identity.clone());
            }
        }
        map.matches = matches;
        map
    }

    pub fn matches(&self) -> &[IdentityMatch] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&IdentityMatch> {
        self.matches
            .binary_search_by(|m| m.identity.as_str().cmp(identity))
            .ok()
            .map(|idx| &self.matches[idx])
    }

    pub fn identity_of_before(&self, component: &str) -> Option<&IdentityId> {
        self.by_before.get(component)
    }

    pub fn identity_of_after(&self, component: &str) -> Option<&IdentityId> {
        self.by_after.get(component)
    }

    /// Pairs present in both snapshots.
    pub fn matched(&self) -> impl Iterator<Item = &IdentityMatch> {
        self.matches
            .iter()
            .filter(|m| m.before.is_some() && m.after.is_some())
    }
}

/// Default scorer: display-name equality blended with a weighted Jaccard
/// similarity of the components' fact tokens.
#[derive(Debug, Clone)]
pub struct WeightedJaccardScorer {
    name_weight: f64,
}

impl WeightedJaccardScorer {
    pub fn new(name_weight: f64) -> Self {
        Self {
            name_weight: name_weight.clamp(0.0, 1.0),
        }
    }
}

impl Default for WeightedJaccardScorer {
    fn default() -> Self {
        Self::new(MatchingConfig::default().name_weight)
    }
}

/// Weighted Jaccard of two token sets; two empty sets share nothing.
pub fn weighted_jaccard(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    let (mut min_sum, mut max_sum) = (0.0, 0.0);
    for key in keys {
        let wa = a.get(key).copied().unwrap_or(0.0);
        let wb = b.get(key).copied().unwrap_or(0.0);
        min_sum += wa.min(wb);
        max_sum += wa.max(wb);
    }
    if max_sum == 0.0 {
        0.0
    } else {
        min_sum / max_sum
    }
}

impl MatchScorer for WeightedJaccardScorer {
    fn score(&self, before: &ComponentProfile, after: &ComponentProfile) -> f64 {
        let names = if before.display_name() == after.display_name() {
            1.0
        } else {
            0.0
        };
        let score = self.name_weight * names
            + (1.0 - self.name_weight) * weighted_jaccard(&before.tokens, &after.tokens);
        score.clamp(0.0, 1.0)
    }

    fn name(&self) -> &str {
        "weighted-jaccard"
    }
}

/// Fact tokens of a component. Paths never enter a token, so a moved file
/// keeps its profile.
pub fn profile(graph: &ContractGraph, component: &Component) -> ComponentProfile {
    let mut profile = ComponentProfile::new(component.clone());
    for symbol in graph.scoped_symbols(component) {
        let (prefix, weight) = if symbol.kind.is_produced() {
            ("p", PRODUCE_WEIGHT)
        } else {
            ("c", CONSUME_WEIGHT)
        };
        profile.add_token(format!("{}:{:?}:{}", prefix, symbol.kind, symbol.name), weight);
        if symbol.kind == SymbolKind::Export {
            for field in symbol.payload.fields.keys() {
                profile.add_token(format!("p:field:{}", field), CONSUME_WEIGHT);
            }
        }
    }
    if let Some(facts) = graph.facts_for(&component.path) {
        if !component.is_synthetic() {
            for guard in &facts.invariants {
                profile.add_token(format!("i:{}", guard.expression), INVARIANT_WEIGHT);
            }
        }
    }
    profile
}

#[derive(Debug, Clone)]
struct Proposal {
    before: ComponentId,
    after: ComponentId,
    score: f64,
}

pub struct IdentityMatcher {
    scorer: Arc<dyn MatchScorer>,
    config: MatchingConfig,
    overrides: Vec<IdentityOverride>,
    /// Renamed files, old path -> new path.
    renamed_files: BTreeMap<String, String>,
}

fn is_code(component: &Component) -> bool {
    matches!(component.kind, ComponentKind::Export | ComponentKind::FileRoot)
}

impl IdentityMatcher {
    pub fn new(scorer: Arc<dyn MatchScorer>, config: MatchingConfig) -> Self {
        Self {
            scorer,
            config,
            overrides: Vec::new(),
            renamed_files: BTreeMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: Vec<IdentityOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_renamed_files(mut self, renamed_files: BTreeMap<String, String>) -> Self {
        self.renamed_files = renamed_files;
        self
    }

    /// Unclaimed code components grouped by file path.
    fn leftovers<'g>(
        graph: &'g ContractGraph,
        claimed: &BTreeSet<ComponentId>,
    ) -> BTreeMap<&'g str, Vec<&'g Component>> {
        let mut by_path: BTreeMap<&str, Vec<&Component>> = BTreeMap::new();
        for component in graph.components() {
            if is_code(component) && !claimed.contains(&component.id) {
                by_path.entry(component.path.as_str()).or_default().push(component);
            }
        }
        by_path
    }

    pub fn match_graphs(
        &self,
        before: &ContractGraph,
        after: &ContractGraph,
    ) -> Result<(IdentityMap, Vec<Warning>)> {
        let mut warnings = Vec::new();
        let mut pairs: Vec<IdentityMatch> = Vec::new();
        let mut claimed_before: BTreeSet<ComponentId> = BTreeSet::new();
        let mut claimed_after: BTreeSet<ComponentId> = BTreeSet::new();
        let mut forced_unmatched: BTreeSet<ComponentId> = BTreeSet::new();

        // Phase 0: overrides
        for o in &self.overrides {
            if !before.contains(&o.before) {
                return Err(ContractGraphError::InvalidOverride(format!(
                    "'{}' is not a component of the before snapshot",
                    o.before
                )));
            }
            if !claimed_before.insert(o.before.clone()) {
                return Err(ContractGraphError::InvalidOverride(format!(
                    "'{}' is overridden more than once",
                    o.before
                )));
            }
            match &o.after {
                Some(a) => {
                    if !after.contains(a) {
                        return Err(ContractGraphError::InvalidOverride(format!(
                            "'{}' is not a component of the after snapshot",
                            a
                        )));
                    }
                    if !claimed_after.insert(a.clone()) {
                        return Err(ContractGraphError::InvalidOverride(format!(
                            "'{}' is claimed by more than one override",
                            a
                        )));
                    }
                    pairs.push(IdentityMatch {
                        identity: a.clone(),
                        before: Some(o.before.clone()),
                        after: Some(a.clone()),
                        score: Some(1.0),
                    });
                }
                None => {
                    forced_unmatched.insert(o.before.clone());
                }
            }
        }

        // Phase 1: identical ids
        for component in before.components() {
            if claimed_before.contains(&component.id) || claimed_after.contains(&component.id) {
                continue;
            }
            if after.contains(&component.id) {
                claimed_before.insert(component.id.clone());
                claimed_after.insert(component.id.clone());
                pairs.push(IdentityMatch {
                    identity: component.id.clone(),
                    before: Some(component.id.clone()),
                    after: Some(component.id.clone()),
                    score: Some(1.0),
                });
            }
        }

        // Phase 2: a file present in both snapshots (same path or renamed)
        // with exactly one leftover component on each side keeps its identity,
        // e.g. `a.ts#foo` losing its export becomes the file root `a.ts`
        let before_leftovers = Self::leftovers(before, &claimed_before);
        let after_leftovers = Self::leftovers(after, &claimed_after);
        for (path, before_side) in &before_leftovers {
            let target = self
                .renamed_files
                .get(*path)
                .map(String::as_str)
                .unwrap_or(*path);
            let Some(after_side) = after_leftovers.get(target) else {
                continue;
            };
            let ([b], [a]) = (before_side.as_slice(), after_side.as_slice()) else {
                continue;
            };
            let score = self.scorer.score(&profile(before, b), &profile(after, a));
            debug!("Linked {} -> {} within {} ({:.3})", b.id, a.id, target, score);
            claimed_before.insert(b.id.clone());
            claimed_after.insert(a.id.clone());
            pairs.push(IdentityMatch {
                identity: a.id.clone(),
                before: Some(b.id.clone()),
                after: Some(a.id.clone()),
                score: Some(score),
            });
        }

        // Phase 3: scored candidates among the remaining code components
        let after_profiles: Vec<ComponentProfile> = after
            .components()
            .filter(|c| is_code(c) && !claimed_after.contains(&c.id))
            .map(|c| profile(after, c))
            .collect();
        let mut proposals: Vec<Proposal> = Vec::new();
        for component in before.components() {
            if !is_code(component) || claimed_before.contains(&component.id) {
                continue;
            }
            let before_profile = profile(before, component);
            let mut scored: Vec<(f64, &ComponentId)> = after_profiles
                .iter()
                .map(|p| (self.scorer.score(&before_profile, p), &p.component.id))
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

            let Some(&(best, best_id)) = scored.first() else {
                continue;
            };
            if best <= self.config.acceptance_threshold {
                continue;
            }
            if let Some(&(runner_up, _)) = scored.get(1) {
                if best - runner_up + SCORE_EPSILON < self.config.min_margin {
                    if runner_up > self.config.acceptance_threshold {
                        let candidates = scored
                            .iter()
                            .take_while(|(s, _)| {
                                *s > self.config.acceptance_threshold
                                    && best - *s + SCORE_EPSILON < self.config.min_margin
                            })
                            .map(|(_, id)| (*id).clone())
                            .collect();
                        return Err(ContractGraphError::IdentityMatchConflict {
                            before: component.id.clone(),
                            candidates,
                        });
                    }
                    debug!(
                        "{} left unmatched: best {:.3} within margin of runner-up {:.3}",
                        component.id, best, runner_up
                    );
                    continue;
                }
            }
            proposals.push(Proposal {
                before: component.id.clone(),
                after: best_id.clone(),
                score: best,
            });
        }

        proposals.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.before.cmp(&b.before))
        });
        for proposal in proposals {
            if claimed_after.contains(&proposal.after) {
                warnings.push(Warning::new(
                    WarningCode::IdentityCandidateClaimed,
                    None,
                    format!(
                        "'{}' matched '{}' ({:.3}) but it was already claimed; left unmatched",
                        proposal.before, proposal.after, proposal.score
                    ),
                ));
                continue;
            }
            debug!(
                "Matched {} -> {} with {} score {:.3}",
                proposal.before,
                proposal.after,
                self.scorer.name(),
                proposal.score
            );
            claimed_before.insert(proposal.before.clone());
            claimed_after.insert(proposal.after.clone());
            pairs.push(IdentityMatch {
                identity: proposal.after.clone(),
                before: Some(proposal.before),
                after: Some(proposal.after),
                score: Some(proposal.score),
            });
        }

        for component in after.components() {
            if !claimed_after.contains(&component.id) {
                pairs.push(IdentityMatch {
                    identity: component.id.clone(),
                    before: None,
                    after: Some(component.id.clone()),
                    score: None,
                });
            }
        }
        let taken: BTreeSet<IdentityId> = pairs.iter().map(|m| m.identity.clone()).collect();
        for component in before.components() {
            if claimed_before.contains(&component.id) && !forced_unmatched.contains(&component.id) {
                continue;
            }
            let identity = if taken.contains(&component.id) {
                format!("{}@before", component.id)
            } else {
                component.id.clone()
            };
            pairs.push(IdentityMatch {
                identity,
                before: Some(component.id.clone()),
                after: None,
                score: None,
            });
        }

        let map = IdentityMap::from_matches(pairs);
        info!(
            "Identity matching: {} identities, {} matched, {} warnings",
            map.len(),
            map.matched().count(),
            warnings.len()
        );
        Ok((map, warnings))
    }
}
