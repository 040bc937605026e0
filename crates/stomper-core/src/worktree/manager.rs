//! Git worktree-backed isolation: one throwaway checkout per `FileTask`,
//! created from the session's base revision and destroyed once the branch
//! finishes, win or lose.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use super::error::{Result, WorktreeError};
use crate::model::WorktreeHandle;

/// Working-tree status of a worktree, as reported by `git status --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    pub modified: Vec<PathBuf>,
    pub added: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub untracked: Vec<PathBuf>,
}

impl WorktreeStatus {
    /// True when the worktree has no pending changes of any kind.
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty()
            && self.added.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
    }

    fn parse(porcelain: &str) -> Self {
        let mut status = Self::default();
        for line in porcelain.lines() {
            if line.len() < 4 {
                continue;
            }
            let code = &line[0..2];
            let path = PathBuf::from(line[3..].trim());
            match code {
                "??" => status.untracked.push(path),
                " D" | "D " | "DD" => status.deleted.push(path),
                "A " | "AM" | "AD" => status.added.push(path),
                _ => status.modified.push(path),
            }
        }
        status
    }
}

/// Creates and tears down git worktrees rooted under a project's
/// `.stomper/worktrees` directory.
pub struct WorktreeManager {
    project_root: PathBuf,
    worktrees_root: PathBuf,
}

impl WorktreeManager {
    /// # Errors
    /// Returns an error when `project_root` is not a git repository.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self> {
        let project_root = project_root.as_ref().to_path_buf();
        if !project_root.join(".git").exists() {
            return Err(WorktreeError::RepositoryNotFound(
                project_root.display().to_string(),
            ));
        }
        let worktrees_root = project_root.join(".stomper").join("worktrees");
        std::fs::create_dir_all(&worktrees_root)?;
        Ok(Self {
            project_root,
            worktrees_root,
        })
    }

    fn run_git(&self, args: &[&str], cwd: &Path) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| WorktreeError::GitNotAvailable(e.to_string()))
    }

    /// Creates a new worktree named `id`, branched off `base_revision`.
    ///
    /// # Errors
    /// Returns an error when `git worktree add` fails, e.g. because
    /// `base_revision` does not resolve or `id` is already checked out.
    pub fn create(&self, id: &str, base_revision: &str) -> Result<WorktreeHandle> {
        let path = self.worktrees_root.join(id);
        let branch = format!("stomper/{id}");
        let output = self.run_git(
            &[
                "worktree",
                "add",
                "-b",
                &branch,
                path.to_str().unwrap_or_default(),
                base_revision,
            ],
            &self.project_root,
        )?;
        if !output.status.success() {
            return Err(WorktreeError::CreateFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        debug!(worktree = id, base_revision, "created worktree");
        Ok(WorktreeHandle {
            id: id.to_string(),
            path,
            base_revision: base_revision.to_string(),
        })
    }

    /// Reads the current working-tree status of `handle`.
    ///
    /// # Errors
    /// Returns an error when `git status --porcelain` fails.
    pub fn status(&self, handle: &WorktreeHandle) -> Result<WorktreeStatus> {
        let output = self.run_git(&["status", "--porcelain"], &handle.path)?;
        if !output.status.success() {
            return Err(WorktreeError::StatusFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(WorktreeStatus::parse(&String::from_utf8(output.stdout)?))
    }

    /// Returns the unified diff between `handle`'s current state and `base`.
    ///
    /// # Errors
    /// Returns an error when `git diff` fails.
    pub fn diff(&self, handle: &WorktreeHandle, base: &str) -> Result<String> {
        let output = self.run_git(&["diff", base], &handle.path)?;
        if !output.status.success() {
            return Err(WorktreeError::DiffFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(String::from_utf8(output.stdout)?)
    }

    /// Applies a unified diff produced by one worktree onto `target_repo`
    /// (typically the main project root, inside the integration critical
    /// section).
    ///
    /// # Errors
    /// Returns an error when `git apply` rejects the patch.
    pub fn apply_patch(&self, target_repo: &Path, patch: &str) -> Result<()> {
        use std::io::Write as _;
        let mut child = Command::new("git")
            .args(["apply", "--whitespace=nowarn", "-"])
            .current_dir(target_repo)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| WorktreeError::GitNotAvailable(e.to_string()))?;
        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(patch.as_bytes())?;
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(WorktreeError::ApplyFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }

    /// Removes a worktree and its branch. Idempotent: a worktree that is
    /// already gone is not an error. Failures are logged rather than
    /// propagated, since by the time a branch is done with its worktree the
    /// fix it produced has already been integrated or discarded.
    pub fn destroy(&self, handle: &WorktreeHandle) {
        if !handle.path.exists() {
            return;
        }
        let result = self.run_git(
            &[
                "worktree",
                "remove",
                "--force",
                handle.path.to_str().unwrap_or_default(),
            ],
            &self.project_root,
        );
        match result {
            Ok(output) if output.status.success() => {
                debug!(worktree = handle.id, "removed worktree");
            }
            Ok(output) => {
                warn!(
                    worktree = handle.id,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "git worktree remove failed, leaving directory behind"
                );
            }
            Err(err) => {
                warn!(worktree = handle.id, %err, "git worktree remove failed to spawn");
            }
        }
        let branch = format!("stomper/{}", handle.id);
        let _ = self.run_git(&["branch", "-D", &branch], &self.project_root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .status()
                .expect("git available");
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
        dir
    }

    #[test]
    fn create_and_destroy_round_trip() {
        let repo = init_repo();
        let manager = WorktreeManager::new(repo.path()).expect("manager");
        let handle = manager.create("task-1", "HEAD").expect("create");
        assert!(handle.path.exists());
        manager.destroy(&handle);
        assert!(!handle.path.exists());
    }

    #[test]
    fn status_reports_untracked_file() {
        let repo = init_repo();
        let manager = WorktreeManager::new(repo.path()).expect("manager");
        let handle = manager.create("task-2", "HEAD").expect("create");
        std::fs::write(handle.path.join("new.txt"), "content\n").unwrap();
        let status = manager.status(&handle).expect("status");
        assert_eq!(status.untracked, vec![PathBuf::from("new.txt")]);
        manager.destroy(&handle);
    }

    #[test]
    fn new_rejects_non_git_directory() {
        let dir = TempDir::new().expect("tempdir");
        let result = WorktreeManager::new(dir.path());
        assert!(matches!(result, Err(WorktreeError::RepositoryNotFound(_))));
    }
}
