use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractGraphError {
    #[error("No changes found: the change set is empty")]
    NoChangesFound,

    #[error("Ingest error for '{path}': {reason}")]
    Ingest { path: String, reason: String },

    #[error("Identity match conflict: '{before}' competes evenly for {candidates:?}")]
    IdentityMatchConflict {
        before: String,
        candidates: Vec<String>,
    },

    #[error("Invalid identity override: {0}")]
    InvalidOverride(String),

    #[error("Graph traversal budget of {budget} node visits exceeded ({visited} visited)")]
    GraphCycleOverflow { budget: usize, visited: usize },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ContractGraphError {
    pub fn ingest(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Ingest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the fatal errors raised before any graph work starts.
    pub fn is_ingest_error(&self) -> bool {
        matches!(self, Self::NoChangesFound | Self::Ingest { .. })
    }
}

pub type Result<T> = std::result::Result<T, ContractGraphError>;
