//! Error types for worktree operations.

use std::io;
use thiserror::Error;

/// Result type for worktree operations.
pub type Result<T> = std::result::Result<T, WorktreeError>;

/// Errors that can occur while managing git worktrees.
#[derive(Debug, Error)]
pub enum WorktreeError {
    /// `git` is not installed or not on `PATH`.
    #[error("git executable not found: {0}")]
    GitNotAvailable(String),

    /// The project root is not a git repository.
    #[error("not a git repository: {0}")]
    RepositoryNotFound(String),

    /// A `git worktree add` invocation failed.
    #[error("failed to create worktree: {0}")]
    CreateFailed(String),

    /// A `git worktree remove` invocation failed.
    #[error("failed to remove worktree: {0}")]
    RemoveFailed(String),

    /// `git diff` failed or produced unparseable output.
    #[error("failed to diff worktree: {0}")]
    DiffFailed(String),

    /// `git apply` rejected the patch.
    #[error("failed to apply patch: {0}")]
    ApplyFailed(String),

    /// `git status --porcelain` failed or produced unparseable output.
    #[error("failed to read worktree status: {0}")]
    StatusFailed(String),

    /// The referenced worktree handle is unknown to this manager.
    #[error("unknown worktree: {0}")]
    UnknownWorktree(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// UTF-8 conversion error reading subprocess output.
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
