//! Error types for learning-store operations.

use thiserror::Error;

/// Result type for learning-store operations.
pub type Result<T> = std::result::Result<T, LearningError>;

/// Errors that can occur while reading or writing the learning store.
///
/// These are never raised by [`crate::learning::LearningStore::record_attempt`]
/// itself — persistence failures there are logged and swallowed, per the
/// learning store's best-effort persistence contract. They surface from
/// explicit loads and from [`crate::learning::LearningStore::flush`].
#[derive(Error, Debug)]
pub enum LearningError {
    /// I/O error reading or writing the store file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
