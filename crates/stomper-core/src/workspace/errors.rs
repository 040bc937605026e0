//! Unified error handling for file operations.
//!
//! This module provides a comprehensive error taxonomy for all file operations.

use crate::workspace::boundary::BoundaryError;
use thiserror::Error;

/// Unified error type for all file operations.
#[derive(Debug, Error)]
pub enum FileOperationError {
    /// Path not found.
    #[error("path not found: {path} (operation: {operation})")]
    PathNotFound {
        path: String,
        operation: String,
    },

    /// Permission denied.
    #[error("permission denied: {path} (operation: {operation}, required: {required_permission})")]
    PermissionDenied {
        path: String,
        operation: String,
        required_permission: String,
    },

    /// File or directory already exists.
    #[error("path already exists: {path} (operation: {operation})")]
    AlreadyExists {
        path: String,
        operation: String,
    },

    /// Workspace boundary violation.
    #[error("workspace boundary violation: {path} (workspace root: {workspace_root}, reason: {reason})")]
    WorkspaceBoundaryViolation {
        path: String,
        workspace_root: String,
        reason: String,
    },

    /// Patch conflict detected.
    #[error("patch conflict in {file} at line {line_number}: expected context '{expected}', found '{actual}'")]
    PatchConflict {
        file: String,
        line_number: usize,
        expected: String,
        actual: String,
    },

    /// Invalid input provided.
    #[error("invalid input for {operation}: field '{field}' - {reason}")]
    InvalidInput {
        operation: String,
        field: String,
        reason: String,
    },

    /// I/O error occurred.
    #[error("I/O error on {path} during {operation}: {source}")]
    IoError {
        path: String,
        operation: String,
        source: std::io::Error,
    },

    /// Transaction failed.
    #[error("transaction failed: {reason} (operations attempted: {operations_attempted}, failed at: {failed_at})")]
    TransactionFailed {
        operations_attempted: usize,
        failed_at: String,
        reason: String,
    },
}

impl From<BoundaryError> for FileOperationError {
    fn from(err: BoundaryError) -> Self {
        match err {
            BoundaryError::OutsideBoundary { path, root } => {
                FileOperationError::WorkspaceBoundaryViolation {
                    path,
                    workspace_root: root,
                    reason: "Path resolves outside workspace root".to_string(),
                }
            }
            BoundaryError::PathTraversal(path) => {
                FileOperationError::WorkspaceBoundaryViolation {
                    path: path.clone(),
                    workspace_root: "unknown".to_string(),
                    reason: format!("Path traversal detected: {}", path),
                }
            }
            BoundaryError::AbsolutePath(path) => {
                FileOperationError::WorkspaceBoundaryViolation {
                    path: path.clone(),
                    workspace_root: "unknown".to_string(),
                    reason: format!("Absolute path not allowed: {}", path),
                }
            }
            BoundaryError::SymlinkEscape { path, resolved } => {
                FileOperationError::WorkspaceBoundaryViolation {
                    path,
                    workspace_root: "unknown".to_string(),
                    reason: format!("Symlink escape attempt: resolves to {}", resolved),
                }
            }
            BoundaryError::Io(e) => {
                FileOperationError::IoError {
                    path: "unknown".to_string(),
                    operation: "boundary validation".to_string(),
                    source: e,
                }
            }
            BoundaryError::CanonicalizationFailed(path) => {
                FileOperationError::IoError {
                    path,
                    operation: "canonicalization".to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Failed to canonicalize path",
                    ),
                }
            }
        }
    }
}

impl From<std::io::Error> for FileOperationError {
    fn from(err: std::io::Error) -> Self {
        FileOperationError::IoError {
            path: "unknown".to_string(),
            operation: "file operation".to_string(),
            source: err,
        }
    }
}

/// Result type for file operations.
pub type FileOperationResult<T> = std::result::Result<T, FileOperationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_error_conversion() {
        let boundary_err = BoundaryError::PathTraversal("../outside".to_string());
        let file_err: FileOperationError = boundary_err.into();
        assert!(matches!(file_err, FileOperationError::WorkspaceBoundaryViolation { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let file_err: FileOperationError = io_err.into();
        assert!(matches!(file_err, FileOperationError::IoError { .. }));
    }
}
