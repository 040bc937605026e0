//! Drives a fix session from defect collection to final cleanup: fan out
//! one branch per file, retry with escalating prompt strategies, integrate
//! under a single lock, and aggregate (§4.6).

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::assistant::AssistantRunner;
use crate::config::{SessionConfig, TestValidation};
use crate::diagnostics::ToolRegistry;
use crate::discovery;
use crate::error::StomperError;
use crate::fix_applier::FixApplier;
use crate::learning::LearningStore;
use crate::lock::IntegrationLock;
use crate::model::{Defect, FileTask, FixOutcome, SessionStatus, SessionSummary};
use crate::prompt::PromptBuilder;
use crate::validator::Validator;
use crate::worktree::WorktreeManager;

/// Top-level error from running an orchestration session. Configuration
/// and dependency-unavailable errors are fatal; everything else is folded
/// into a per-file result instead of aborting the session.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("required dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("file discovery failed: {0}")]
    Discovery(#[from] discovery::DiscoveryError),
}

/// Outcome of one per-file branch.
struct BranchResult {
    file: PathBuf,
    success: bool,
    errors_fixed: usize,
}

/// Coordinates every component of the fix-orchestration engine for a
/// single session.
pub struct Orchestrator {
    config: SessionConfig,
    registry: Arc<ToolRegistry>,
    learning: Arc<LearningStore>,
    worktrees: Arc<WorktreeManager>,
    assistant: Arc<dyn AssistantRunner>,
    integration_lock: IntegrationLock,
    cancellation: CancellationToken,
}

impl Orchestrator {
    /// # Errors
    /// Returns [`StomperError::DependencyUnavailable`] if the project root
    /// is not a git repository.
    pub fn new(
        config: SessionConfig,
        registry: Arc<ToolRegistry>,
        learning: Arc<LearningStore>,
        assistant: Arc<dyn AssistantRunner>,
    ) -> crate::error::Result<Self> {
        let worktrees = WorktreeManager::new(&config.project_root)
            .map_err(|e| OrchestratorError::DependencyUnavailable(e.to_string()))
            .map_err(StomperError::from)?;

        Ok(Self {
            config,
            registry,
            learning,
            worktrees: Arc::new(worktrees),
            assistant,
            integration_lock: IntegrationLock::new(),
            cancellation: CancellationToken::new(),
        })
    }

    /// Signals every in-flight branch to wind down at its next suspension
    /// point instead of starting a new retry iteration.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Runs the full session: collect, fan out, integrate, aggregate,
    /// cleanup.
    pub async fn run(&self) -> crate::error::Result<SessionSummary> {
        let span = info_span!("session", project_root = %self.config.project_root.display());
        self.run_inner().instrument(span).await.map_err(StomperError::from)
    }

    async fn run_inner(&self) -> Result<SessionSummary, OrchestratorError> {
        let tasks = self.collect_defects()?;

        if self.config.dry_run {
            info!(files = tasks.len(), "dry run: collected defects, performing no further work");
            return Ok(SessionSummary {
                successful_fixes: Vec::new(),
                failed_fixes: Vec::new(),
                total_errors_fixed: 0,
                status: SessionStatus::Completed,
            });
        }

        if tasks.is_empty() {
            info!("no candidate defects found");
            return Ok(SessionSummary::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_files as usize));
        let mut handles = Vec::with_capacity(tasks.len());
        let mut aborted_early = false;

        for task in tasks {
            if self.cancellation.is_cancelled() || (!self.config.continue_on_error && aborted_early) {
                aborted_early = true;
                break;
            }

            let semaphore = Arc::clone(&semaphore);
            let registry = Arc::clone(&self.registry);
            let learning = Arc::clone(&self.learning);
            let worktrees = Arc::clone(&self.worktrees);
            let assistant = Arc::clone(&self.assistant);
            let integration_lock = self.integration_lock.clone();
            let cancellation = self.cancellation.clone();
            let config = self.config.clone();
            let continue_on_error = self.config.continue_on_error;

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                let file = task.file.clone();
                let span = info_span!("branch", file = %file.display());
                let result = process_file_task(
                    task,
                    &config,
                    &registry,
                    &learning,
                    &worktrees,
                    assistant.as_ref(),
                    &integration_lock,
                    &cancellation,
                )
                .instrument(span)
                .await;
                (file, result, continue_on_error)
            });
            handles.push(handle);
        }

        let mut successful_fixes = Vec::new();
        let mut failed_fixes = Vec::new();
        let mut total_errors_fixed = 0usize;
        let mut any_failure = aborted_early;

        for handle in handles {
            match handle.await {
                Ok((file, result, _continue_on_error)) => {
                    if result.success {
                        successful_fixes.push(file);
                        total_errors_fixed += result.errors_fixed;
                    } else {
                        any_failure = true;
                        failed_fixes.push(file);
                    }
                }
                Err(err) => {
                    warn!(%err, "a branch task panicked");
                    any_failure = true;
                }
            }
        }

        self.cleanup_orphaned_worktrees();

        let status = if any_failure && !self.config.continue_on_error {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        };

        Ok(SessionSummary {
            successful_fixes,
            failed_fixes,
            total_errors_fixed,
            status,
        })
    }

    fn collect_defects(&self) -> Result<Vec<FileTask>, OrchestratorError> {
        let files = discovery::discover(
            &self.config.project_root,
            &self.config.selection,
            &self.config.include,
            &self.config.exclude,
            self.config.max_files,
        )?;

        let mut tasks = Vec::new();
        let mut total_defects = 0usize;

        for file in files {
            if total_defects >= self.config.max_errors_per_iteration {
                break;
            }
            let target = self.config.project_root.join(&file);
            let mut defects = self
                .registry
                .run_enabled(&self.config.quality_tools, &target, &self.config.project_root);
            // Adapters echo back whatever path string they were invoked
            // with; normalise to the project-root-relative form `file`
            // already is so `Defect::matches` stays stable across the
            // retry loop's own re-normalisation of post-fix defects.
            defects.iter_mut().for_each(|d| d.file = file.clone());

            if let Some(filter) = &self.config.error_type {
                defects.retain(|d| &d.code == filter);
            }
            defects.retain(|d| !self.config.ignore.contains(&d.code));

            if defects.is_empty() {
                continue;
            }
            total_defects += defects.len();
            tasks.push(FileTask::new(file, defects, self.config.max_retries));
        }

        Ok(tasks)
    }

    /// Destroys any worktree directory left behind under `.stomper/worktrees`
    /// that isn't tracked by git anymore, e.g. from a previous crashed run.
    fn cleanup_orphaned_worktrees(&self) {
        let worktrees_root = self.config.project_root.join(".stomper").join("worktrees");
        let Ok(entries) = std::fs::read_dir(&worktrees_root) else {
            return;
        };
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            let handle = crate::model::WorktreeHandle {
                id: id.clone(),
                path: entry.path(),
                base_revision: "HEAD".to_string(),
            };
            warn!(worktree = %id, "destroying orphaned worktree from a previous session");
            self.worktrees.destroy(&handle);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_file_task(
    mut task: FileTask,
    config: &SessionConfig,
    registry: &Arc<ToolRegistry>,
    learning: &LearningStore,
    worktrees: &WorktreeManager,
    assistant: &dyn AssistantRunner,
    integration_lock: &IntegrationLock,
    cancellation: &CancellationToken,
) -> BranchResult {
    let worktree_id = format!("{}-{}", sanitize_id(&task.file), uuid::Uuid::new_v4());
    let handle = match worktrees.create(&worktree_id, "HEAD") {
        Ok(h) => h,
        Err(err) => {
            warn!(%err, "failed to create worktree, marking file as failed");
            return BranchResult { file: task.file, success: false, errors_fixed: 0 };
        }
    };

    let original_defects = task.defects.clone();
    let prompt_builder = PromptBuilder::new();
    let validator = Validator::new(Arc::clone(registry), config.quality_tools.clone());

    let mut success = false;
    let mut remaining: Vec<Defect> = original_defects.clone();
    let timeout = Duration::from_secs(config.assistant_timeout_secs);

    for attempt in 0..task.max_attempts {
        if cancellation.is_cancelled() {
            break;
        }

        let strategy = learning.adaptive_strategy(&remaining[0], attempt).await;
        let worktree_path = handle.path.clone();
        let prompt = prompt_builder.build(&remaining, &worktree_path, &strategy);

        let run_result = assistant.run(&prompt, &worktree_path, timeout).await;
        let Ok(run_result) = run_result else {
            learning
                .record_attempt(&remaining[0], FixOutcome::Failure, strategy.verbosity, Some(task.file.clone()))
                .await;
            task.attempt = attempt + 1;
            continue;
        };
        if !run_result.modified {
            learning
                .record_attempt(&remaining[0], FixOutcome::Skipped, strategy.verbosity, Some(task.file.clone()))
                .await;
            task.attempt = attempt + 1;
            continue;
        }

        let target = worktree_path.join(&task.file);
        let mut new_defects = registry.run_enabled(&config.quality_tools, &target, &worktree_path);
        new_defects.iter_mut().for_each(|d| d.file = task.file.clone());

        let classified = classify_attempt(&remaining, &new_defects, &original_defects);
        learning
            .record_attempt(&remaining[0], classified.outcome, strategy.verbosity, Some(task.file.clone()))
            .await;

        task.fixed.extend(classified.fixed);
        remaining = classified.remaining;

        if remaining.is_empty() {
            success = true;
            break;
        }
        task.attempt = attempt + 1;
    }

    if !success {
        worktrees.destroy(&handle);
        return BranchResult { file: task.file, success: false, errors_fixed: 0 };
    }

    if config.run_tests && matches!(config.test_validation, TestValidation::Full | TestValidation::Quick) {
        if !run_tests_in_worktree(&handle.path) {
            worktrees.destroy(&handle);
            return BranchResult { file: task.file, success: false, errors_fixed: 0 };
        }
    }

    let applier = FixApplier::new(worktrees, &config.project_root);
    let errors_fixed = task.fixed.len();

    let integration_result = {
        let _guard = integration_lock.acquire().await;
        let result = applier.apply_and_validate(&handle, &validator, &original_defects);
        if result.success {
            commit_resolved_defects(&config.project_root, &task.file, &original_defects);
        }
        result
    };

    worktrees.destroy(&handle);

    BranchResult {
        file: task.file,
        success: integration_result.success,
        errors_fixed: if integration_result.success { errors_fixed } else { 0 },
    }
}

/// Result of comparing one retry attempt's post-fix diagnostics against the
/// defects that were outstanding going into it (§4.4/§4.6).
struct AttemptOutcome {
    /// Defects from `remaining` that are still present after the attempt.
    remaining: Vec<Defect>,
    /// Defects from `remaining` that no longer appear — these feed
    /// `FileTask::fixed`.
    fixed: Vec<Defect>,
    outcome: FixOutcome,
}

/// Classifies one retry attempt: which of the still-outstanding `remaining`
/// defects survived into `new_defects`, and whether progress was made
/// without introducing a regression relative to `original_defects`.
fn classify_attempt(remaining: &[Defect], new_defects: &[Defect], original_defects: &[Defect]) -> AttemptOutcome {
    let still_remaining: Vec<Defect> =
        remaining.iter().filter(|d| new_defects.iter().any(|e| d.matches(e))).cloned().collect();
    let fixed: Vec<Defect> =
        remaining.iter().filter(|d| !still_remaining.iter().any(|r| r.matches(d))).cloned().collect();
    let introduced = new_defects.iter().filter(|e| !original_defects.iter().any(|d| d.matches(e))).count();

    let outcome = if still_remaining.len() < remaining.len() && introduced == 0 {
        FixOutcome::Success
    } else {
        FixOutcome::Failure
    };

    AttemptOutcome { remaining: still_remaining, fixed, outcome }
}

fn sanitize_id(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Runs the project's test suite inside a worktree; `false` signals a test
/// failure, which the caller treats like any other branch failure.
fn run_tests_in_worktree(worktree_path: &Path) -> bool {
    StdCommand::new("pytest")
        .current_dir(worktree_path)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(true) // no test runner available: do not block on tests we cannot run
}

/// Builds the commit message for a file whose outstanding defects were all
/// resolved: `fix(quality): resolve N issues in <basename>`, one `- CODE`
/// line per resolved defect, and a trailing `Fixed by:` trailer.
fn build_commit_message(file: &Path, defects: &[Defect]) -> String {
    let file_name = file.file_name().map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
    let codes: Vec<&str> = defects.iter().map(|d| d.code.as_str()).collect();
    let body = codes.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n");
    format!(
        "fix(quality): resolve {} issues in {}\n\n{}\n\nFixed by: stomper v{}",
        defects.len(),
        file_name,
        body,
        env!("CARGO_PKG_VERSION")
    )
}

fn commit_resolved_defects(project_root: &Path, file: &Path, defects: &[Defect]) {
    let message = build_commit_message(file, defects);

    let add = StdCommand::new("git").args(["add", "--"]).arg(file).current_dir(project_root).output();
    if let Err(err) = add {
        warn!(%err, "failed to stage resolved file");
        return;
    }
    if let Err(err) = StdCommand::new("git")
        .args(["commit", "-m", &message])
        .current_dir(project_root)
        .output()
    {
        warn!(%err, "failed to commit resolved file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    fn defect(code: &str, file: &str, line: u32) -> Defect {
        Defect {
            tool: "ruff".to_string(),
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
    fn sanitize_id_replaces_path_separators() {
        assert_eq!(sanitize_id(Path::new("src/a/b.py")), "src-a-b-py");
    }

    #[test]
    fn commit_message_uses_plural_issues_and_the_file_basename() {
        let defects = vec![defect("F401", "src/t.py", 1)];
        let message = build_commit_message(Path::new("src/t.py"), &defects);
        assert!(message.starts_with("fix(quality): resolve 1 issues in t.py\n"));
        assert!(message.contains("- F401"));
        assert!(message.contains(&format!("Fixed by: stomper v{}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn commit_message_pluralizes_issues_regardless_of_count() {
        let defects = vec![defect("F401", "src/t.py", 1), defect("E501", "src/t.py", 2)];
        let message = build_commit_message(Path::new("src/t.py"), &defects);
        assert!(message.starts_with("fix(quality): resolve 2 issues in t.py\n"));
    }

    #[test]
    fn classify_attempt_moves_resolved_defects_from_remaining_to_fixed() {
        let remaining = vec![defect("F401", "src/t.py", 1), defect("E501", "src/t.py", 2)];
        // F401 is gone after the fix; E501 is still reported.
        let new_defects = vec![defect("E501", "src/t.py", 2)];
        let original = remaining.clone();

        let result = classify_attempt(&remaining, &new_defects, &original);

        assert_eq!(result.outcome, FixOutcome::Success);
        assert_eq!(result.remaining, vec![defect("E501", "src/t.py", 2)]);
        assert_eq!(result.fixed, vec![defect("F401", "src/t.py", 1)]);
    }

    #[test]
    fn classify_attempt_treats_a_new_regression_as_failure_even_with_progress() {
        let remaining = vec![defect("F401", "src/t.py", 1)];
        let new_defects = vec![defect("E999", "src/t.py", 5)];
        let original = remaining.clone();

        let result = classify_attempt(&remaining, &new_defects, &original);

        assert_eq!(result.outcome, FixOutcome::Failure);
        assert!(result.remaining.is_empty());
        assert!(result.fixed.iter().any(|d| d.code == "F401"));
    }
}
