pub mod extractor;
pub mod language;
pub mod languages;
pub mod pool;

pub use extractor::*;
pub use language::*;
pub use languages::{Context, DialectCollector, RustCollector, ScriptCollector};
pub use pool::*;
