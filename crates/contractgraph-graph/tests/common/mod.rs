use contractgraph_core::EngineConfig;
use contractgraph_graph::ContractDiffEngine;
use tracing_subscriber::EnvFilter;

/// Routes engine logs to the test writer; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn engine() -> ContractDiffEngine {
    init_tracing();
    let mut config = EngineConfig::default();
    config.extraction.concurrency = 2;
    ContractDiffEngine::new(config).unwrap()
}
