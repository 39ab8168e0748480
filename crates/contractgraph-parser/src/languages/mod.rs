// ABOUTME: Dialect collector modules and shared extraction infrastructure
// ABOUTME: Every collector walks one syntax tree into produced/consumed symbols and invariants

pub mod extractor_utils;
pub mod rust;
pub mod script;

use crate::language::Dialect;
use extractor_utils::FactSink;

/// A dialect-specific fact collector over one parsed file.
///
/// Collectors index exported declarations before walking the tree, so every
/// consumed symbol can be attributed to its enclosing exported declaration.
pub trait DialectCollector<'s> {
    fn dialect(&self) -> Dialect;

    /// Consumes the collector, returning the gathered facts.
    fn collect(self) -> FactSink<'s>;
}

pub use extractor_utils::Context;
pub use rust::RustCollector;
pub use script::ScriptCollector;
