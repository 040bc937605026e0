//! Adapter for a mypy-style Python type checker: line-oriented textual
//! output, parsed with a regex.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use super::{DiagnosticsError, DiagnosticsTool};
use crate::model::{Defect, Severity};

// file:line: error: message [code]
static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^:]+):(?P<line>\d+): error: (?P<message>.+?)(?:\s*\[(?P<code>[\w-]+)\])?$")
        .expect("static regex is valid")
});

/// Type-checker adapter, identifier `"mypy"`.
pub struct MypyTool {
    command: String,
}

impl MypyTool {
    pub fn new() -> Self {
        Self { command: "mypy".to_string() }
    }

    fn parse(output: &str) -> Vec<Defect> {
        output
            .lines()
            .filter_map(|line| {
                let captures = LINE_PATTERN.captures(line)?;
                let line_num: u32 = captures.name("line")?.as_str().parse().unwrap_or(1);
                let code = captures
                    .name("code")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Some(Defect {
                    tool: "mypy".to_string(),
                    file: PathBuf::from(captures.name("file")?.as_str()),
                    line: line_num,
                    column: 0,
                    code,
                    message: captures.name("message")?.as_str().trim().to_string(),
                    severity: Severity::Error,
                    auto_fixable: false,
                })
            })
            .collect()
    }
}

impl Default for MypyTool {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsTool for MypyTool {
    fn id(&self) -> &str {
        "mypy"
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
            .args(["--show-error-codes"])
            .arg(target_path)
            .current_dir(project_root)
            .output()
            .map_err(|source| DiagnosticsError::SpawnFailed {
                tool: self.id().to_string(),
                source,
            })?;

        // mypy exits 1 when it finds type errors; that is not a tool failure.
        if !output.status.success() && output.status.code() != Some(1) {
            return Err(DiagnosticsError::UnexpectedExit {
                tool: self.id().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(Self::parse(&String::from_utf8_lossy(&output.stdout)))
    }

    fn discover_config(&self, project_root: &Path) -> Option<PathBuf> {
        for ancestor in project_root.ancestors() {
            let candidate = ancestor.join("mypy.ini");
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
    fn parses_standard_mypy_line() {
        let defects = MypyTool::parse("src/file.py:10: error: Incompatible types [assignment]\n");
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].file, PathBuf::from("src/file.py"));
        assert_eq!(defects[0].line, 10);
        assert_eq!(defects[0].code, "assignment");
        assert_eq!(defects[0].message, "Incompatible types");
    }

    #[test]
    fn missing_code_falls_back_to_unknown() {
        let defects = MypyTool::parse("src/file.py:3: error: something went wrong\n");
        assert_eq!(defects[0].code, "unknown");
    }

    #[test]
    fn ignores_non_error_lines() {
        let defects = MypyTool::parse("Success: no issues found in 1 source file\n");
        assert!(defects.is_empty());
    }
}
