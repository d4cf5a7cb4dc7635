//! Error types for the guided-experience engine.
//!
//! Busy-contention (an advance/back/jump arriving mid-transition) is not an
//! error here: those calls report it through their outcome enums.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown transition effect: {0}")]
    UnknownEffect(String),

    #[error("Invalid semantic id in attachment table: {0}")]
    InvalidSemanticId(String),
}

/// Errors raised while building or driving a step sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("A guided sequence needs at least one step")]
    Empty,

    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Step index {index} out of range (sequence has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Cannot jump to step {index}: it has not been visited yet")]
    JumpNotAllowed { index: usize },

    #[error("Step {index} is not the final step")]
    NotAtFinalStep { index: usize },

    #[error("Session already ended")]
    Ended,
}

/// Gamification ledger errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Unknown achievement: {0}")]
    UnknownAchievement(String),
}

/// Client-local storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Profile store errors. Always non-fatal to a guided session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("Profile store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
