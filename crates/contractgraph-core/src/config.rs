use std::path::Path;

use anyhow::{Context, Result};
use config as cfg;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Prefix for environment overrides, e.g. `CONTRACTGRAPH__MATCHING__MIN_MARGIN=0.2`.
pub const ENV_PREFIX: &str = "CONTRACTGRAPH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Upper bound on worker threads used for per-file extraction.
    pub concurrency: usize,
    /// Identifiers treated as the shared store (`store.cart`, `state.user`, ...).
    pub store_identifiers: Vec<String>,
    /// Receivers whose `.get/.post/...` calls are external calls.
    pub http_clients: Vec<String>,
    /// Import specifiers starting with one of these resolve inside the code base.
    pub local_import_prefixes: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
            store_identifiers: vec!["store".into(), "state".into()],
            http_clients: vec!["axios".into(), "http".into(), "client".into(), "api".into()],
            local_import_prefixes: vec![
                ".".into(),
                "/".into(),
                "@/".into(),
                "~/".into(),
                "crate::".into(),
                "super::".into(),
                "self::".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MatchingConfig {
    pub acceptance_threshold: f64,
    pub min_margin: f64,
    /// Share of the default score given to display-name equality.
    pub name_weight: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.5,
            min_margin: 0.1,
            name_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PropagationConfig {
    pub max_node_visits: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_node_visits: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RankingConfig {
    pub top_k: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub matching: MatchingConfig,
    pub propagation: PropagationConfig,
    pub ranking: RankingConfig,
}

impl EngineConfig {
    /// Layers defaults, an optional TOML/JSON/YAML file and `CONTRACTGRAPH__*`
    /// environment variables, then validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = cfg::Config::try_from(&EngineConfig::default())
            .context("serializing default configuration")?;
        let mut builder = cfg::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(cfg::File::from(path).required(true));
        }
        let settings: EngineConfig = builder
            .add_source(cfg::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        settings.validate()?;
        info!(
            concurrency = settings.extraction.concurrency,
            threshold = settings.matching.acceptance_threshold,
            margin = settings.matching.min_margin,
            "Loaded engine configuration"
        );
        Ok(settings)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: EngineConfig =
            toml::from_str(source).context("parsing TOML configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// JSON Schema of the configuration file, for editors and config linting.
    pub fn json_schema() -> Result<serde_json::Value> {
        let schema = schema_for!(EngineConfig);
        serde_json::to_value(schema).context("serializing configuration schema")
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.extraction.concurrency > 0,
            "extraction.concurrency must be > 0"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.matching.acceptance_threshold),
            "matching.acceptance_threshold must be within 0..=1"
        );
        anyhow::ensure!(
            (0.0..1.0).contains(&self.matching.min_margin),
            "matching.min_margin must be within 0..1"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.matching.name_weight),
            "matching.name_weight must be within 0..=1"
        );
        anyhow::ensure!(
            self.propagation.max_node_visits > 0,
            "propagation.max_node_visits must be > 0"
        );
        anyhow::ensure!(
            self.extraction
                .store_identifiers
                .iter()
                .all(|s| !s.trim().is_empty()),
            "extraction.store_identifiers cannot contain empty names"
        );
        Ok(())
    }
}
