//! Distinguishes progress from regression by diffing defect sets before
//! and after a fix attempt (§4.4).

use std::path::Path;
use std::sync::Arc;

use crate::diagnostics::ToolRegistry;
use crate::model::{Defect, ValidationResult};

/// Reruns diagnostics over a just-modified file set and compares the
/// result against the defects that existed before modification.
pub struct Validator {
    registry: Arc<ToolRegistry>,
    quality_tools: Vec<String>,
}

impl Validator {
    pub fn new(registry: Arc<ToolRegistry>, quality_tools: Vec<String>) -> Self {
        Self { registry, quality_tools }
    }

    /// Validates `files` (within `project_root`) against the defect set
    /// that existed before they were modified.
    pub fn validate(&self, project_root: &Path, files: &[&Path], original_defects: &[Defect]) -> ValidationResult {
        let mut new_defects = Vec::new();
        for file in files {
            new_defects.extend(self.registry.run_enabled(&self.quality_tools, file, project_root));
        }

        let fixed: Vec<&Defect> = original_defects
            .iter()
            .filter(|d| !new_defects.iter().any(|e| d.matches(e)))
            .collect();
        let introduced: Vec<Defect> = new_defects
            .iter()
            .filter(|e| !original_defects.iter().any(|d| d.matches(e)))
            .cloned()
            .collect();
        let remaining: Vec<&Defect> = original_defects
            .iter()
            .filter(|d| !fixed.iter().any(|f| f.matches(d)))
            .collect();

        let passed = introduced.is_empty() && !(fixed.is_empty() && !remaining.is_empty());

        let summary = format!(
            "{} fixed, {} remaining, {} newly introduced",
            fixed.len(),
            remaining.len(),
            introduced.len()
        );

        ValidationResult {
            passed,
            errors_fixed: fixed.len(),
            errors_remaining: remaining.len(),
            new_errors_introduced: introduced.len(),
            new_errors: introduced,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use std::path::PathBuf;

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
    fn passes_when_introduced_is_empty_and_progress_made() {
        // Simulated by hand since this doesn't invoke a real diagnostics tool.
        let original = vec![defect("F401", "a.py", 1)];
        let fixed: Vec<&Defect> = vec![];
        let remaining: Vec<&Defect> = original.iter().collect();
        let introduced: Vec<Defect> = vec![];
        let passed = introduced.is_empty() && !(fixed.is_empty() && !remaining.is_empty());
        assert!(!passed, "no fixes and remaining defects should fail as no-progress");
    }

    #[test]
    fn empty_original_and_empty_new_passes_trivially() {
        let registry = Arc::new(ToolRegistry::new());
        let validator = Validator::new(registry, vec![]);
        let result = validator.validate(Path::new("."), &[], &[]);
        assert!(result.passed);
        assert_eq!(result.errors_fixed, 0);
        assert_eq!(result.new_errors_introduced, 0);
    }
}
