// ABOUTME: Bounded worker pool running per-file extraction in parallel
// ABOUTME: Results are keyed by path so the output never depends on scheduling order

use crate::extractor::ContractExtractor;
use contractgraph_core::{ContractFacts, ContractGraphError, Result, SnapshotFile, Warning};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Facts of every file in one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFacts {
    pub files: BTreeMap<String, ContractFacts>,
    pub warnings: Vec<Warning>,
}

impl SnapshotFacts {
    pub fn get(&self, path: &str) -> Option<&ContractFacts> {
        self.files.get(path)
    }
}

pub struct ExtractionPool {
    pool: rayon::ThreadPool,
    concurrency: usize,
}

impl ExtractionPool {
    pub fn new(concurrency: usize) -> Result<Self> {
        let concurrency = concurrency.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|idx| format!("contract-extract-{}", idx))
            .build()
            .map_err(|e| ContractGraphError::WorkerPool(e.to_string()))?;
        Ok(Self { pool, concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Extracts every file present in a snapshot. Warnings come back ordered by
    /// path, then in the order the extractor raised them.
    pub fn extract_snapshot(
        &self,
        extractor: &ContractExtractor,
        files: &[SnapshotFile<'_>],
    ) -> SnapshotFacts {
        let start = Instant::now();
        let mut extracted: Vec<(String, ContractFacts, Vec<Warning>)> = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let extraction = extractor.extract(file.path, Some(file.content));
                    (file.path.to_string(), extraction.facts, extraction.warnings)
                })
                .collect()
        });
        extracted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = SnapshotFacts::default();
        for (path, facts, warnings) in extracted {
            out.warnings.extend(warnings);
            out.files.insert(path, facts);
        }
        info!(
            "Extracted {} files on {} workers in {:.2?}",
            out.files.len(),
            self.concurrency,
            start.elapsed()
        );
        out
    }
}
