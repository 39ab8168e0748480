use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningCode {
    /// Two records for the same path disagreed on the change kind.
    ConflictingChangeKind,
    /// A context file shadowed a changed path and was dropped.
    ContextCollision,
    /// A construct could not be classified unambiguously; the fact is kept with low confidence.
    ExtractionAmbiguous,
    UnsupportedLanguage,
    /// A consumed symbol has no producer in the same snapshot; no edge was drawn.
    UnresolvedConsumption,
    /// An accepted identity candidate had already been claimed by a stronger match.
    IdentityCandidateClaimed,
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningCode::ConflictingChangeKind => "conflicting-change-kind",
            WarningCode::ContextCollision => "context-collision",
            WarningCode::ExtractionAmbiguous => "extraction-ambiguous",
            WarningCode::UnsupportedLanguage => "unsupported-language",
            WarningCode::UnresolvedConsumption => "unresolved-consumption",
            WarningCode::IdentityCandidateClaimed => "identity-candidate-claimed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Warning {
    pub code: WarningCode,
    pub path: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(code: WarningCode, path: Option<&str>, message: impl Into<String>) -> Self {
        let warning = Self {
            code,
            path: path.map(str::to_string),
            message: message.into(),
        };
        tracing::warn!(code = %warning.code, path = ?warning.path, "{}", warning.message);
        warning
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.code, path, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}
