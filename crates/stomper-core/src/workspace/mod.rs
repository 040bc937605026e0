//! Safe, boundary-checked file mutation primitives shared by the fix applier
//! and the worktree manager.
//!
//! Everything here operates on a single filesystem root (either the main
//! project tree or a worktree) and never reasons about version control —
//! that lives in [`crate::worktree`].

pub mod boundary;
pub mod errors;
pub mod file_ops;
pub mod transaction;

pub use boundary::{BoundaryError, BoundaryValidator};
pub use errors::{FileOperationError, FileOperationResult};
pub use file_ops::FileOperations;
pub use transaction::{FileOperation, FileTransaction};
