//! Atomically integrates a worktree's changes into the main working tree,
//! with snapshot-based rollback (§4.5).

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::{ApplyResult, Defect, FixApplicationResult, RollbackReason, WorktreeHandle};
use crate::validator::Validator;
use crate::workspace::FileTransaction;
use crate::worktree::WorktreeManager;

/// Applies worktree diffs to the main tree and validates the result,
/// rolling back on any regression.
pub struct FixApplier<'a> {
    worktrees: &'a WorktreeManager,
    project_root: PathBuf,
}

impl<'a> FixApplier<'a> {
    pub fn new(worktrees: &'a WorktreeManager, project_root: impl Into<PathBuf>) -> Self {
        Self {
            worktrees,
            project_root: project_root.into(),
        }
    }

    /// Pulls `source_handle`'s net diff against its base and applies it to
    /// the main tree.
    pub fn apply(&self, source_handle: &WorktreeHandle) -> ApplyResult {
        let diff = match self.worktrees.diff(source_handle, &source_handle.base_revision) {
            Ok(diff) => diff,
            Err(err) => {
                return ApplyResult {
                    success: false,
                    files_applied: Vec::new(),
                    files_failed: Vec::new(),
                    error_message: Some(err.to_string()),
                };
            }
        };

        if diff.trim().is_empty() {
            return ApplyResult {
                success: true,
                files_applied: Vec::new(),
                files_failed: Vec::new(),
                error_message: None,
            };
        }

        let changed_files = changed_files_from_diff(&diff);

        match self.worktrees.apply_patch(&self.project_root, &diff) {
            Ok(()) => ApplyResult {
                success: true,
                files_applied: changed_files,
                files_failed: Vec::new(),
                error_message: None,
            },
            Err(err) => ApplyResult {
                success: false,
                files_applied: Vec::new(),
                files_failed: changed_files,
                error_message: Some(err.to_string()),
            },
        }
    }

    /// Snapshots the current on-disk content of `files` (relative to the
    /// project root) before a mutating operation, so [`Self::restore`] can
    /// undo it later. Returns `None` when there is nothing to back up.
    pub fn backup(&self, files: &[PathBuf]) -> Option<FileTransaction> {
        if files.is_empty() {
            return None;
        }
        let mut transaction = match FileTransaction::new(&self.project_root) {
            Ok(t) => t,
            Err(err) => {
                warn!(%err, "failed to start a backup transaction");
                return None;
            }
        };
        for file in files {
            // The content argument only matters if this transaction is ever
            // committed, which it never is here; `write_file` captures the
            // pre-existing content into its own backup slot as a side effect,
            // which is all `restore` needs.
            if let Err(err) = transaction.write_file(file, "") {
                warn!(%err, file = %file.display(), "failed to snapshot file before apply");
            }
        }
        Some(transaction)
    }

    /// Restores and consumes a snapshot, undoing any changes made since it
    /// was taken.
    pub fn restore(&self, mut snapshot: FileTransaction) -> bool {
        snapshot.rollback().is_ok()
    }

    /// The composite operation the orchestrator calls from inside the
    /// integration critical section: apply, validate, and roll back on any
    /// regression.
    pub fn apply_and_validate(
        &self,
        source_handle: &WorktreeHandle,
        validator: &Validator,
        original_defects: &[Defect],
    ) -> FixApplicationResult {
        let changed_files = match self.worktrees.diff(source_handle, &source_handle.base_revision) {
            Ok(diff) => changed_files_from_diff(&diff),
            Err(_) => Vec::new(),
        };

        let snapshot = self.backup(&changed_files);

        let apply_result = self.apply(source_handle);
        if !apply_result.success {
            if let Some(snapshot) = snapshot {
                self.restore(snapshot);
            }
            return FixApplicationResult {
                success: false,
                rolled_back: true,
                rollback_reason: Some(RollbackReason::ApplyFailed),
                validation: None,
            };
        }

        let file_refs: Vec<&Path> = apply_result.files_applied.iter().map(PathBuf::as_path).collect();
        let validation = validator.validate(&self.project_root, &file_refs, original_defects);

        let rollback_reason = if validation.new_errors_introduced > 0 {
            Some(RollbackReason::NewErrorsIntroduced)
        } else if !validation.passed {
            Some(RollbackReason::ValidationFailed)
        } else {
            None
        };

        if let Some(reason) = rollback_reason {
            if let Some(snapshot) = snapshot {
                self.restore(snapshot);
            } else {
                warn!("no snapshot available to roll back a failed apply");
            }
            return FixApplicationResult {
                success: false,
                rolled_back: true,
                rollback_reason: Some(reason),
                validation: Some(validation),
            };
        }

        // Snapshot is simply dropped; its backing transaction cleans up on drop.
        FixApplicationResult {
            success: true,
            rolled_back: false,
            rollback_reason: None,
            validation: Some(validation),
        }
    }
}

/// Extracts the set of changed paths from a unified diff's `+++ b/<path>`
/// headers.
fn changed_files_from_diff(diff: &str) -> Vec<PathBuf> {
    diff.lines()
        .filter_map(|line| line.strip_prefix("+++ b/"))
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_changed_files_from_unified_diff_headers() {
        let diff = "diff --git a/src/a.py b/src/a.py\n--- a/src/a.py\n+++ b/src/a.py\n@@ -1 +1 @@\n-x\n+y\n";
        assert_eq!(changed_files_from_diff(diff), vec![PathBuf::from("src/a.py")]);
    }

    #[test]
    fn empty_diff_yields_no_changed_files() {
        assert!(changed_files_from_diff("").is_empty());
    }
}
