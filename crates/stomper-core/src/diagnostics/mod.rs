//! Pluggable adapters over external static-analysis/type-checking tools.
//!
//! Each adapter wraps one subprocess and normalises its output into
//! [`Defect`] records. The orchestrator only ever talks to the
//! [`DiagnosticsTool`] trait; concrete tools live in [`ruff`] and [`mypy`].

pub mod mypy;
pub mod ruff;

use std::path::{Path, PathBuf};

use crate::model::Defect;

/// Errors running or probing a diagnostics tool.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("{tool} is not available on PATH")]
    NotAvailable { tool: String },
    #[error("{tool} exited with an unexpected status: {stderr}")]
    UnexpectedExit { tool: String, stderr: String },
    #[error("failed to spawn {tool}: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {tool} output: {0}")]
    ParseFailed(String),
}

/// Contract every diagnostics adapter implements (§6).
pub trait DiagnosticsTool: Send + Sync {
    /// Stable identifier used as the `tool` field on every `Defect` it
    /// produces, and as the key in the tool registry.
    fn id(&self) -> &str;

    /// Whether the underlying executable is present on `PATH`.
    fn is_available(&self) -> bool;

    /// Runs the tool over `target_path` (a file or directory) and returns
    /// normalised defects.
    ///
    /// # Errors
    /// Returns [`DiagnosticsError`] when the subprocess cannot be spawned
    /// or exits with a status this adapter does not treat as "defects
    /// found".
    fn run(&self, target_path: &Path, project_root: &Path) -> Result<Vec<Defect>, DiagnosticsError>;

    /// Looks for this tool's well-known config file, walking upward from
    /// `project_root`'s ancestors. Returns `None` when not found.
    fn discover_config(&self, project_root: &Path) -> Option<PathBuf>;
}

/// A table of diagnostics tools keyed by their `id()`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn DiagnosticsTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The default registry: every adapter this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ruff::RuffTool::new()));
        registry.register(Box::new(mypy::MypyTool::new()));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn DiagnosticsTool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, id: &str) -> Option<&dyn DiagnosticsTool> {
        self.tools.iter().find(|t| t.id() == id).map(|t| t.as_ref())
    }

    /// Runs every tool whose id is in `enabled` over `target_path`,
    /// skipping (with a warning) any tool that isn't available.
    pub fn run_enabled(
        &self,
        enabled: &[String],
        target_path: &Path,
        project_root: &Path,
    ) -> Vec<Defect> {
        let mut defects = Vec::new();
        for id in enabled {
            let Some(tool) = self.get(id) else {
                tracing::warn!(tool = id, "no diagnostics adapter registered for this tool id");
                continue;
            };
            if !tool.is_available() {
                tracing::warn!(tool = id, "diagnostics tool unavailable, skipping");
                continue;
            }
            match tool.run(target_path, project_root) {
                Ok(found) => defects.extend(found),
                Err(err) => tracing::warn!(tool = id, %err, "diagnostics tool run failed"),
            }
        }
        defects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_tool_id_returns_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("ruff").is_none());
    }

    #[test]
    fn default_registry_has_both_shipped_adapters() {
        let registry = ToolRegistry::with_defaults();
        assert!(registry.get("ruff").is_some());
        assert!(registry.get("mypy").is_some());
    }
}
