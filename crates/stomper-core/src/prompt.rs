//! Renders the textual instructions handed to the AI assistant, given a
//! defect batch and an adaptive-strategy hint (§4.3).

use std::fmt::Write as _;
use std::path::Path;

use crate::learning::AdaptiveStrategy;
use crate::model::Defect;

/// Builds prompts with `format!`/`write!`, no templating engine.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Renders a prompt for `defects` (all from one file), given the
    /// worktree path the assistant should operate in and the adaptive
    /// strategy chosen for this retry.
    pub fn build(&self, defects: &[Defect], worktree_path: &Path, strategy: &AdaptiveStrategy) -> String {
        assert!(!defects.is_empty(), "build called with an empty defect list");

        let file = &defects[0].file;
        let mut prompt = String::new();

        let _ = writeln!(
            prompt,
            "Fix the following {} issue(s) in {} (working directory: {}).",
            defects.len(),
            file.display(),
            worktree_path.display()
        );
        prompt.push('\n');

        for defect in defects {
            let _ = writeln!(
                prompt,
                "- [{}:{}] line {}, col {}: {}",
                defect.tool, defect.code, defect.line, defect.column, defect.message
            );
        }

        if strategy.include_examples {
            prompt.push_str("\nPrevious fixes for similar issues have followed established conventions in this codebase; mirror that style.\n");
        }

        if strategy.include_history {
            if let Some(approach) = &strategy.suggested_approach {
                let _ = writeln!(prompt, "\nHint from prior attempts: {approach}.");
            }
        }

        if strategy.retry_count > 0 {
            let _ = writeln!(
                prompt,
                "\nThis is retry attempt {} after {} prior unsuccessful attempt(s); consider a different approach.",
                strategy.retry_count + 1,
                strategy.retry_count
            );
        }

        match strategy.verbosity {
            crate::model::PromptStrategy::Minimal => {
                prompt.push_str("\nApply the smallest possible change.\n");
            }
            crate::model::PromptStrategy::Verbose => {
                prompt.push_str(
                    "\nExplain your reasoning before editing, then apply the change and double check it resolves every issue listed above.\n",
                );
            }
            _ => {}
        }

        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PromptStrategy, Severity};
    use std::path::PathBuf;

    fn defect() -> Defect {
        Defect {
            tool: "ruff".to_string(),
            file: PathBuf::from("src/t.py"),
            line: 1,
            column: 0,
            code: "F401".to_string(),
            message: "unused import".to_string(),
            severity: Severity::Warning,
            auto_fixable: true,
        }
    }

    #[test]
    fn includes_every_defect_and_the_file_path() {
        let strategy = AdaptiveStrategy {
            verbosity: PromptStrategy::Normal,
            include_examples: false,
            include_history: false,
            retry_count: 0,
            suggested_approach: None,
        };
        let prompt = PromptBuilder::new().build(&[defect()], Path::new("/tmp/wt"), &strategy);
        assert!(prompt.contains("src/t.py"));
        assert!(prompt.contains("F401"));
        assert!(prompt.contains("/tmp/wt"));
    }

    #[test]
    fn retry_count_is_mentioned_when_nonzero() {
        let strategy = AdaptiveStrategy {
            verbosity: PromptStrategy::Detailed,
            include_examples: true,
            include_history: true,
            retry_count: 2,
            suggested_approach: Some("minimal edits worked before".to_string()),
        };
        let prompt = PromptBuilder::new().build(&[defect()], Path::new("/tmp/wt"), &strategy);
        assert!(prompt.contains("retry attempt 3"));
        assert!(prompt.contains("minimal edits worked before"));
    }

    #[test]
    #[should_panic]
    fn panics_on_empty_defect_list() {
        let strategy = AdaptiveStrategy {
            verbosity: PromptStrategy::Normal,
            include_examples: false,
            include_history: false,
            retry_count: 0,
            suggested_approach: None,
        };
        PromptBuilder::new().build(&[], Path::new("/tmp/wt"), &strategy);
    }
}
