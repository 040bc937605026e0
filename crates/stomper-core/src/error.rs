//! Top-level error type for stomper-core.
//!
//! Mirrors the error taxonomy of the orchestration design: configuration
//! errors and dependency-unavailable errors are fatal to a session;
//! branch-level and persistence errors are not and are instead folded into
//! a `FileTask`'s result.

use crate::learning::LearningError;
use crate::orchestrator::OrchestratorError;
use crate::workspace::{BoundaryError, FileOperationError};
use crate::worktree::WorktreeError;
use thiserror::Error;

/// Core error type for stomper operations.
#[derive(Error, Debug)]
pub enum StomperError {
    /// Configuration could not be resolved into a valid `SessionConfig`.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required external dependency (version control, AI assistant,
    /// diagnostics tool) is unavailable.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Session setup or collection failed outside of any single file's
    /// branch (e.g. file discovery).
    #[error("orchestration error: {0}")]
    Orchestration(#[from] OrchestratorError),

    /// Worktree creation, diffing, or destruction failed.
    #[error("worktree error: {0}")]
    Worktree(#[from] WorktreeError),

    /// A file operation (patch apply, backup, restore) failed.
    #[error("file operation error: {0}")]
    FileOperation(#[from] FileOperationError),

    /// A path escaped the project root boundary.
    #[error("boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// The learning store could not be read or written.
    #[error("learning store error: {0}")]
    Learning(#[from] LearningError),

    /// I/O error not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was cancelled before completion.
    #[error("session cancelled")]
    Cancelled,
}

/// Result type alias for stomper-core operations.
pub type Result<T> = std::result::Result<T, StomperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = StomperError::Config("max_parallel_files must be >= 1".to_string());
        assert!(format!("{err}").contains("configuration error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StomperError = io_err.into();
        assert!(matches!(err, StomperError::Io(_)));
    }

    #[test]
    fn test_cancelled_display() {
        let err = StomperError::Cancelled;
        assert_eq!(format!("{err}"), "session cancelled");
    }
}
