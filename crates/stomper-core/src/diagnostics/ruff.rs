//! Adapter for a ruff-style Python linter: JSON output, one diagnostic
//! object per violation.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use super::{DiagnosticsError, DiagnosticsTool};
use crate::model::{Defect, Severity};

#[derive(Debug, Deserialize)]
struct Violation {
    filename: String,
    location: Location,
    code: Option<String>,
    message: String,
    fix: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Location {
    row: u32,
    column: u32,
}

fn severity_for_code(code: &str) -> Severity {
    let prefix: String = code.chars().take_while(|c| c.is_alphabetic()).collect();
    match prefix.as_str() {
        "E" | "F" => Severity::Error,
        _ => Severity::Warning,
    }
}

/// Linter adapter, identifier `"ruff"`.
pub struct RuffTool {
    command: String,
}

impl RuffTool {
    pub fn new() -> Self {
        Self { command: "ruff".to_string() }
    }
}

impl Default for RuffTool {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsTool for RuffTool {
    fn id(&self) -> &str {
        "ruff"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(&self, target_path: &Path, project_root: &Path) -> Result<Vec<Defect>, DiagnosticsError> {
        let output = Command::new(&self.command)
            .args(["check", "--output-format=json"])
            .arg(target_path)
            .current_dir(project_root)
            .output()
            .map_err(|source| DiagnosticsError::SpawnFailed {
                tool: self.id().to_string(),
                source,
            })?;

        // ruff exits 1 when it finds lint violations; that is not a tool
        // failure. Anything else is.
        if !output.status.success() && output.status.code() != Some(1) {
            return Err(DiagnosticsError::UnexpectedExit {
                tool: self.id().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }

        let violations: Vec<Violation> = serde_json::from_str(&stdout)
            .map_err(|e| DiagnosticsError::ParseFailed(e.to_string()))?;

        Ok(violations
            .into_iter()
            .map(|v| {
                let code = v.code.unwrap_or_else(|| "UNKNOWN".to_string());
                Defect {
                    tool: self.id().to_string(),
                    file: PathBuf::from(v.filename),
                    line: v.location.row,
                    column: v.location.column,
                    severity: severity_for_code(&code),
                    auto_fixable: v.fix.is_some(),
                    code,
                    message: v.message,
                }
            })
            .collect())
    }

    fn discover_config(&self, project_root: &Path) -> Option<PathBuf> {
        for ancestor in project_root.ancestors() {
            let candidate = ancestor.join("ruff.toml");
            if candidate.exists() {
                return Some(candidate);
            }
            let pyproject = ancestor.join("pyproject.toml");
            if pyproject.exists() {
                return Some(pyproject);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_e_and_f_codes_to_error() {
        assert_eq!(severity_for_code("E501"), Severity::Error);
        assert_eq!(severity_for_code("F401"), Severity::Error);
        assert_eq!(severity_for_code("B008"), Severity::Warning);
    }

    #[test]
    fn parses_empty_output_as_no_defects() {
        let tool = RuffTool::new();
        let violations: Vec<Violation> = serde_json::from_str("[]").unwrap();
        assert!(violations.is_empty());
        assert_eq!(tool.id(), "ruff");
    }
}
