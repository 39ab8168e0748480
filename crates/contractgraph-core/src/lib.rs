pub mod changeset;
pub mod classification;
pub mod config;
pub mod error;
pub mod report;
pub mod traits;
pub mod types;
pub mod warning;

pub use changeset::*;
pub use classification::*;
pub use config::{EngineConfig, ExtractionConfig, MatchingConfig, PropagationConfig, RankingConfig};
pub use error::*;
pub use report::*;
pub use traits::*;
pub use types::*;
pub use warning::*;
