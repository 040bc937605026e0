//! Runs an external AI coding assistant against a worktree and reports
//! what it did (§4.3).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// One line of the assistant's structured progress output.
#[derive(Debug, Clone)]
pub struct AssistantEvent {
    pub line: String,
}

/// Outcome of one assistant invocation.
#[derive(Debug, Clone)]
pub struct AssistantRunResult {
    pub return_code: i32,
    pub events: Vec<AssistantEvent>,
    pub modified: bool,
}

/// Errors running the assistant.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant '{0}' is not available on PATH")]
    NotAvailable(String),
    #[error("assistant exceeded its {0:?} timeout")]
    Timeout(Duration),
    #[error("failed to spawn assistant: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// Contract for invoking an AI assistant against an isolated worktree.
#[async_trait]
pub trait AssistantRunner: Send + Sync {
    /// Runs `prompt` against `worktree_path`, bounded by `timeout`.
    ///
    /// # Errors
    /// Returns [`AssistantError::Timeout`] if the subprocess exceeds
    /// `timeout`, or [`AssistantError::SpawnFailed`] if it cannot start.
    async fn run(
        &self,
        prompt: &str,
        worktree_path: &Path,
        timeout: Duration,
    ) -> Result<AssistantRunResult, AssistantError>;
}

/// Invokes a configurable external CLI as a subprocess, its working
/// directory set to the worktree, the prompt passed on stdin.
pub struct SubprocessAssistant {
    command: String,
}

impl SubprocessAssistant {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }

    pub fn is_available(&self) -> bool {
        std::process::Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl AssistantRunner for SubprocessAssistant {
    async fn run(
        &self,
        prompt: &str,
        worktree_path: &Path,
        timeout: Duration,
    ) -> Result<AssistantRunResult, AssistantError> {
        use tokio::io::AsyncWriteExt as _;

        let before = snapshot_mtimes(worktree_path);

        let mut child = Command::new(&self.command)
            .current_dir(worktree_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
        }

        let stdout = child.stdout.take().expect("stdout was piped");
        let mut lines = BufReader::new(stdout).lines();
        let mut events = Vec::new();

        let run_future = async {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(%line, "assistant output");
                events.push(AssistantEvent { line });
            }
            child.wait().await
        };

        let status = match tokio::time::timeout(timeout, run_future).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(AssistantError::Timeout(timeout));
            }
        };

        let modified = snapshot_mtimes(worktree_path) != before;

        Ok(AssistantRunResult {
            return_code: status.code().unwrap_or(-1),
            events,
            modified,
        })
    }
}

/// A coarse change detector: `(path, modified-time)` pairs for every
/// tracked file, used to decide whether the assistant touched anything.
fn snapshot_mtimes(root: &Path) -> Vec<(PathBuf, Option<std::time::SystemTime>)> {
    let mut entries: Vec<(PathBuf, Option<std::time::SystemTime>)> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let mtime = e.metadata().ok().and_then(|m| m.modified().ok());
            (e.path().to_path_buf(), mtime)
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn snapshot_changes_when_a_file_is_written() {
        let dir = TempDir::new().unwrap();
        let before = snapshot_mtimes(dir.path());
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let after = snapshot_mtimes(dir.path());
        assert_ne!(before, after);
    }
}
