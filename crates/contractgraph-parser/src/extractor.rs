// ABOUTME: Per-file contract extraction entry point
// ABOUTME: Parses a file with its Tree-sitter grammar, runs the dialect collector and normalizes the facts

use crate::language::{create_parser, Dialect};
use crate::languages::extractor_utils::{syntax_error_count, FactSink, SharedPatterns};
use crate::languages::{DialectCollector, RustCollector, ScriptCollector};
use contractgraph_core::{
    Confidence, ContractFacts, ExtractionConfig, Guard, Result, Warning, WarningCode,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Facts of one file together with everything worth reporting about them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub facts: ContractFacts,
    pub warnings: Vec<Warning>,
}

/// Compiled, reusable extractor. Pure with respect to its inputs: the same
/// path and content always produce the same facts.
#[derive(Debug, Clone)]
pub struct ContractExtractor {
    shared: SharedPatterns,
}

impl ContractExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            shared: SharedPatterns::compile(config)?,
        })
    }

    /// Extracts the contract facts of `path`. A file absent from the snapshot
    /// (`content == None`) has no facts.
    pub fn extract(&self, path: &str, content: Option<&str>) -> Extraction {
        let Some(content) = content else {
            return Extraction::default();
        };
        let Some(dialect) = Dialect::from_path(path) else {
            let facts = ContractFacts {
                confidence: Confidence::Low,
                ..ContractFacts::default()
            };
            return Extraction {
                facts,
                warnings: vec![Warning::new(
                    WarningCode::UnsupportedLanguage,
                    Some(path),
                    "no extractor for this file type; treated as an opaque file",
                )],
            };
        };

        trace!("Extracting {} as {}", path, dialect);
        let sink = self.collect(path, content, dialect);

        let mut facts = ContractFacts {
            produces: sink.produces,
            consumes: sink.consumes,
            invariants: sink
                .invariants
                .iter()
                .map(|expression| Guard::new(expression))
                .filter(|guard| !guard.expression.is_empty())
                .collect(),
            confidence: Confidence::High,
        };
        facts.normalize();
        if sink.incomplete {
            facts.confidence = Confidence::Low;
        }
        debug!(
            "Extracted {} produced, {} consumed, {} invariants from {}",
            facts.produces.len(),
            facts.consumes.len(),
            facts.invariants.len(),
            path
        );
        Extraction {
            facts,
            warnings: sink.warnings,
        }
    }

    fn collect<'s>(&'s self, path: &'s str, content: &'s str, dialect: Dialect) -> FactSink<'s> {
        let tree = create_parser(path).and_then(|mut parser| parser.parse(content, None));
        let Some(tree) = tree else {
            let mut sink = FactSink::new(path);
            sink.incomplete = true;
            sink.ambiguous("the parser gave up on this file");
            return sink;
        };
        let root = tree.root_node();
        let mut sink = match dialect {
            Dialect::Script => ScriptCollector::new(path, content, root, &self.shared).collect(),
            Dialect::Rust => RustCollector::new(path, content, root, &self.shared).collect(),
        };
        if root.has_error() {
            sink.syntax_errors(syntax_error_count(&root));
        }
        sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractgraph_core::SymbolKind;

    fn extractor() -> ContractExtractor {
        ContractExtractor::new(&ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn absent_content_has_no_facts() {
        let extraction = extractor().extract("src/a.ts", None);
        assert!(extraction.facts.is_empty());
        assert_eq!(extraction.facts.confidence, Confidence::High);
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn unsupported_files_are_opaque_and_low_confidence() {
        let extraction = extractor().extract("styles/app.css", Some("body { color: red }"));
        assert!(extraction.facts.is_empty());
        assert_eq!(extraction.facts.confidence, Confidence::Low);
        assert_eq!(extraction.warnings[0].code, WarningCode::UnsupportedLanguage);
    }

    #[test]
    fn extraction_is_deterministic() {
        let src = "import { a, b } from './x';\nexport function f(p) { if (p) { a(p); } return b; }";
        let first = extractor().extract("src/f.ts", Some(src));
        let second = extractor().extract("src/f.ts", Some(src));
        assert_eq!(first, second);
        assert_eq!(
            first
                .facts
                .produces
                .iter()
                .filter(|s| s.kind == SymbolKind::Export)
                .count(),
            1
        );
        assert!(first.facts.invariants.iter().any(|g| g.expression == "p"));
    }
}
