use crate::{Component, ComponentKind};
use std::collections::BTreeMap;

/// What a scorer sees of one component: its identity plus weighted fact tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentProfile {
    pub component: Component,
    /// Token -> weight. Tokens encode the kind and name of the component's
    /// produced/consumed facts and invariants, never its path.
    pub tokens: BTreeMap<String, f64>,
}

impl ComponentProfile {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            tokens: BTreeMap::new(),
        }
    }

    /// Keeps the heavier weight when a token is added twice.
    pub fn add_token(&mut self, token: impl Into<String>, weight: f64) {
        let entry = self.tokens.entry(token.into()).or_insert(weight);
        if weight > *entry {
            *entry = weight;
        }
    }

    pub fn display_name(&self) -> &str {
        &self.component.display_name
    }

    pub fn kind(&self) -> ComponentKind {
        self.component.kind
    }
}

/// Pluggable cross-snapshot similarity used by identity matching.
pub trait MatchScorer: Send + Sync {
    /// Similarity in `0.0..=1.0`.
    fn score(&self, before: &ComponentProfile, after: &ComponentProfile) -> f64;

    fn name(&self) -> &str;
}
