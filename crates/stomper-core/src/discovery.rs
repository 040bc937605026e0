//! Resolves a `FileSelection` (§4.7) into a concrete list of candidate
//! paths before diagnostics collection runs.

use std::path::{Path, PathBuf};
use std::process::Command;

use glob::Pattern;
use ignore::WalkBuilder;
use tracing::warn;

use crate::config::FileSelection;

/// Errors encountered while resolving a file selection.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("git command failed while resolving file selection: {0}")]
    GitFailed(String),
    #[error("git executable not found: {0}")]
    GitNotAvailable(std::io::Error),
}

fn run_git(project_root: &Path, args: &[&str]) -> Result<String, DiscoveryError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(project_root)
        .output()
        .map_err(DiscoveryError::GitNotAvailable)?;
    if !output.status.success() {
        return Err(DiscoveryError::GitFailed(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn walk_directory(root: &Path) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder.filter_entry(|entry| {
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            return !matches!(name, "target" | "node_modules" | ".git" | ".venv" | "__pycache__" | ".stomper");
        }
        true
    });

    let mut paths: Vec<PathBuf> = builder
        .build()
        .filter_map(|entry| {
            entry.ok().and_then(|e| {
                if e.file_type()?.is_file() {
                    Some(e.path().to_path_buf())
                } else {
                    None
                }
            })
        })
        .collect();
    paths.sort();
    paths
}

fn apply_globs(paths: Vec<PathBuf>, include: &[String], exclude: &[String]) -> Vec<PathBuf> {
    let include_patterns: Vec<Pattern> = include.iter().filter_map(|p| Pattern::new(p).ok()).collect();
    let exclude_patterns: Vec<Pattern> = exclude.iter().filter_map(|p| Pattern::new(p).ok()).collect();

    paths
        .into_iter()
        .filter(|path| {
            let path_str = path.to_string_lossy();
            let included = include_patterns.is_empty() || include_patterns.iter().any(|p| p.matches(&path_str));
            let excluded = exclude_patterns.iter().any(|p| p.matches(&path_str));
            included && !excluded
        })
        .collect()
}

/// Resolves `selection` against `project_root`, applies `include`/`exclude`
/// globs, and truncates the result to `max_files`.
///
/// # Errors
/// Returns [`DiscoveryError`] when a version-control-based selection
/// (`Changed`, `Staged`, `VsBranch`) needs `git` and `git` is unavailable
/// or fails.
pub fn discover(
    project_root: &Path,
    selection: &FileSelection,
    include: &[String],
    exclude: &[String],
    max_files: usize,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let candidates = match selection {
        FileSelection::File { path } => vec![path.clone()],
        FileSelection::Files { paths } => paths.clone(),
        FileSelection::Directory { path } => walk_directory(&project_root.join(path)),
        FileSelection::Glob { patterns } => {
            let all = walk_directory(project_root);
            apply_globs(all, patterns, &[])
        }
        FileSelection::Changed => {
            let output = run_git(project_root, &["diff", "--name-only"])?;
            output.lines().map(PathBuf::from).collect()
        }
        FileSelection::Staged => {
            let output = run_git(project_root, &["diff", "--name-only", "--cached"])?;
            output.lines().map(PathBuf::from).collect()
        }
        FileSelection::VsBranch { branch } => {
            let range = format!("{branch}...HEAD");
            let output = run_git(project_root, &["diff", "--name-only", &range])?;
            output.lines().map(PathBuf::from).collect()
        }
    };

    let mut filtered = apply_globs(candidates, include, exclude);
    filtered.retain(|p| p.as_os_str() != "");

    if filtered.len() > max_files {
        warn!(
            total = filtered.len(),
            max_files, "truncating discovered file list to max_files"
        );
        filtered.truncate(max_files);
    }

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directory_selection_finds_files_and_skips_vendored_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/b.py"), "y = 1\n").unwrap();

        let found = discover(
            dir.path(),
            &FileSelection::Directory { path: PathBuf::from(".") },
            &[],
            &[],
            100,
        )
        .unwrap();

        assert_eq!(found, vec![PathBuf::from(dir.path().join("a.py"))]);
    }

    #[test]
    fn max_files_truncates_with_warning() {
        let dir = TempDir::new().unwrap();
        let found = discover(
            dir.path(),
            &FileSelection::Files {
                paths: vec![PathBuf::from("a.py"), PathBuf::from("b.py"), PathBuf::from("c.py")],
            },
            &[],
            &[],
            2,
        )
        .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn exclude_glob_removes_matching_paths() {
        let dir = TempDir::new().unwrap();
        let found = discover(
            dir.path(),
            &FileSelection::Files {
                paths: vec![PathBuf::from("src/a.py"), PathBuf::from("tests/test_a.py")],
            },
            &[],
            &["tests/*".to_string()],
            100,
        )
        .unwrap();
        assert_eq!(found, vec![PathBuf::from("src/a.py")]);
    }
}
