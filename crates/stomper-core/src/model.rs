//! Core data model shared by every component of the orchestration engine:
//! defects, the per-file unit of work, and the vocabulary used to describe
//! how a fix attempt went.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Severity of a reported defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single finding reported by a diagnostics tool, normalised to a common
/// shape regardless of which tool produced it.
///
/// Identity for set operations (matching a defect across two runs) is the
/// tuple `(tool, code, file, line)` — see [`Defect::identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    /// Identifier of the originating analyser, e.g. `"ruff"` or `"mypy"`.
    pub tool: String,
    /// Path relative to the project root.
    pub file: PathBuf,
    /// 1-based line number.
    pub line: u32,
    /// 0-based column number.
    pub column: u32,
    /// Tool-specific defect identifier, e.g. `"E501"`.
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub auto_fixable: bool,
}

impl Defect {
    /// The `(tool, code, file, line)` tuple used to match defects across
    /// a before/after diagnostics run.
    pub fn identity(&self) -> (&str, &str, &PathBuf, u32) {
        (&self.tool, &self.code, &self.file, self.line)
    }

    /// True when `self` and `other` refer to the same finding, per
    /// the validator's `match` predicate.
    pub fn matches(&self, other: &Defect) -> bool {
        self.tool == other.tool
            && self.code == other.code
            && self.file == other.file
            && self.line == other.line
    }
}

/// Ordered by increasing cost and context richness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStrategy {
    Minimal,
    Normal,
    Detailed,
    Verbose,
}

impl PromptStrategy {
    /// Canonical escalation order used by fallback selection.
    pub const CANONICAL_ORDER: [PromptStrategy; 4] = [
        PromptStrategy::Minimal,
        PromptStrategy::Normal,
        PromptStrategy::Detailed,
        PromptStrategy::Verbose,
    ];
}

/// Outcome of a single fix attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOutcome {
    Success,
    Failure,
    Partial,
    Skipped,
}

/// Status of a `FileTask` as it moves through the per-file state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Retrying,
    Skipped,
}

/// One unit of parallel work: a single file and the defects found in it at
/// collection time. Owned exclusively by the branch that processes it.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub file: PathBuf,
    /// Initial snapshot of defects, captured at collection time.
    pub defects: Vec<Defect>,
    /// Defects resolved so far, populated during processing.
    pub fixed: Vec<Defect>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: FileTaskStatus,
}

impl FileTask {
    pub fn new(file: PathBuf, defects: Vec<Defect>, max_attempts: u32) -> Self {
        Self {
            file,
            defects,
            fixed: Vec::new(),
            attempt: 0,
            max_attempts,
            status: FileTaskStatus::Pending,
        }
    }
}

/// A unique, filesystem-backed isolated checkout used by exactly one
/// `FileTask` for the duration of its processing.
#[derive(Debug, Clone)]
pub struct WorktreeHandle {
    /// Unique per file and session.
    pub id: String,
    /// Filesystem root of the isolated checkout.
    pub path: PathBuf,
    /// The commit the worktree was created from.
    pub base_revision: String,
}

/// Result of re-running diagnostics over a set of just-modified files and
/// comparing them against the defect set that existed before modification.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub passed: bool,
    pub errors_fixed: usize,
    pub errors_remaining: usize,
    pub new_errors_introduced: usize,
    pub new_errors: Vec<Defect>,
    pub summary: String,
}

/// Result of [`crate::fix_applier::FixApplier::apply`].
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    pub success: bool,
    pub files_applied: Vec<PathBuf>,
    pub files_failed: Vec<PathBuf>,
    pub error_message: Option<String>,
}

/// Why `apply_and_validate` rolled back its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackReason {
    ValidationFailed,
    NewErrorsIntroduced,
    ApplyFailed,
}

/// Composite result of `FixApplier::apply_and_validate`, the operation the
/// orchestrator actually calls from inside the integration critical section.
#[derive(Debug, Clone)]
pub struct FixApplicationResult {
    pub success: bool,
    pub rolled_back: bool,
    pub rollback_reason: Option<RollbackReason>,
    pub validation: Option<ValidationResult>,
}

/// Final, user-visible outcome of one orchestration session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub successful_fixes: Vec<PathBuf>,
    pub failed_fixes: Vec<PathBuf>,
    pub total_errors_fixed: usize,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defect(tool: &str, code: &str, file: &str, line: u32) -> Defect {
        Defect {
            tool: tool.to_string(),
            file: PathBuf::from(file),
            line,
            column: 0,
            code: code.to_string(),
            message: "example".to_string(),
            severity: Severity::Warning,
            auto_fixable: true,
        }
    }

    #[test]
    fn defects_match_on_identity_tuple_only() {
        let a = defect("ruff", "F401", "src/t.py", 1);
        let mut b = defect("ruff", "F401", "src/t.py", 1);
        b.message = "different message".to_string();
        assert!(a.matches(&b));
    }

    #[test]
    fn defects_differing_in_line_do_not_match() {
        let a = defect("ruff", "F401", "src/t.py", 1);
        let b = defect("ruff", "F401", "src/t.py", 2);
        assert!(!a.matches(&b));
    }

    #[test]
    fn canonical_order_is_minimal_first() {
        assert_eq!(PromptStrategy::CANONICAL_ORDER[0], PromptStrategy::Minimal);
        assert_eq!(PromptStrategy::CANONICAL_ORDER[3], PromptStrategy::Verbose);
    }

    #[test]
    fn new_file_task_starts_pending_at_attempt_zero() {
        let task = FileTask::new(PathBuf::from("src/t.py"), vec![defect("ruff", "F401", "src/t.py", 1)], 3);
        assert_eq!(task.attempt, 0);
        assert_eq!(task.status, FileTaskStatus::Pending);
        assert!(task.fixed.is_empty());
    }
}
