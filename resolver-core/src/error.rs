//! Error types for the entity resolution core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the entity resolution core (spec §7)
#[derive(Debug, Error)]
pub enum CoreError {
    /// Blank/oversize name, control characters, unknown type
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// Referenced entity/review item missing
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempt to operate on a MERGED entity, double-decide a review, or re-commit a batch
    #[error("invalid state: {0}")]
    StateInvalid(String),

    /// Lock timeout; caller may retry
    #[error("lock acquisition failed: {0}")]
    LockAcquisitionFailed(String),

    /// A merge step failed and compensations ran
    #[error("merge failed at step '{step}': {reason}")]
    MergeFailed { step: String, reason: String },

    /// Batch refused or aborted due to memory ceiling
    #[error("batch memory exceeded: {0}")]
    BatchMemoryExceeded(String),

    /// Batch refused due to size ceiling
    #[error("batch too large: {0}")]
    BatchTooLarge(String),

    /// Wraps a store exception after its own retry budget is exhausted
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// LLM enrichment skipped; resolution proceeds without the LLM signal
    #[error("llm unavailable: {0}")]
    LlmUnavailable(String),

    /// Configuration failed validation (weights, threshold ordering, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}
