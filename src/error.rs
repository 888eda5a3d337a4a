use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConstructError>;

/// Failures reported by the assembly, fusion and parsing stages.
///
/// Positions are 1-based, matching the flat-file coordinates a caller sees.
#[derive(Debug, Error)]
pub enum ConstructError {
    #[error("position {index} in '{record_id}' is outside the valid range {lower}..={upper}")]
    OutOfBounds {
        record_id: String,
        index: usize,
        lower: usize,
        upper: usize,
    },

    #[error("sequence '{record_id}' is empty")]
    EmptySequence { record_id: String },

    #[error("fusion needs at least two parts, got {count}")]
    EmptyFusionList { count: usize },

    #[error("malformed record '{record_id}': {reason}")]
    MalformedRecord { record_id: String, reason: String },

    #[error("invalid nucleotide '{letter}' at position {position} in '{record_id}'")]
    InvalidNucleotide {
        record_id: String,
        position: usize,
        letter: char,
    },

    #[error("record '{record_id}' could not be resolved")]
    UnresolvedRecord { record_id: String },

    #[error("no insertion site given and none could be derived for '{record_id}'")]
    NoInsertionSite { record_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConstructError {
    pub(crate) fn malformed(record_id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            record_id: record_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn empty(record_id: &str) -> Self {
        Self::EmptySequence {
            record_id: record_id.to_string(),
        }
    }
}
