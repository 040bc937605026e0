//! Layered session configuration: built-in defaults, a `[tool.stomper]` TOML
//! table, `STOMPER_*` environment variables, and CLI overrides, in
//! increasing order of precedence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How candidate files are selected before diagnostics run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum FileSelection {
    File { path: PathBuf },
    Files { paths: Vec<PathBuf> },
    Directory { path: PathBuf },
    Glob { patterns: Vec<String> },
    Changed,
    Staged,
    VsBranch { branch: String },
}

impl Default for FileSelection {
    fn default() -> Self {
        FileSelection::Changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestValidation {
    Full,
    Quick,
    Final,
    None,
}

impl Default for TestValidation {
    fn default() -> Self {
        TestValidation::Full
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    BatchErrors,
    OneErrorType,
    AllErrors,
}

impl Default for ProcessingStrategy {
    fn default() -> Self {
        ProcessingStrategy::BatchErrors
    }
}

/// A fully-resolved configuration for one orchestration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub project_root: PathBuf,
    pub quality_tools: Vec<String>,
    pub selection: FileSelection,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_files: usize,
    pub error_type: Option<String>,
    pub ignore: Vec<String>,
    pub max_errors_per_iteration: usize,
    pub dry_run: bool,
    pub use_sandbox: bool,
    pub run_tests: bool,
    pub max_parallel_files: u32,
    pub test_validation: TestValidation,
    pub continue_on_error: bool,
    pub max_retries: u32,
    pub processing_strategy: ProcessingStrategy,
    pub agent_name: String,
    pub assistant_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            quality_tools: vec!["ruff".to_string(), "mypy".to_string()],
            selection: FileSelection::default(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_files: 100,
            error_type: None,
            ignore: Vec::new(),
            max_errors_per_iteration: 100,
            dry_run: false,
            use_sandbox: true,
            run_tests: true,
            max_parallel_files: 4,
            test_validation: TestValidation::default(),
            continue_on_error: true,
            max_retries: 3,
            processing_strategy: ProcessingStrategy::default(),
            agent_name: "cursor-agent".to_string(),
            assistant_timeout_secs: 300,
        }
    }
}

/// Errors resolving a `SessionConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("max_parallel_files must be between 1 and 32, got {0}")]
    InvalidParallelism(u32),
    #[error("max_retries must be at least 1, got {0}")]
    InvalidRetries(u32),
}

/// The subset of `SessionConfig` a TOML file or environment layer may set.
/// Every field is optional; an absent field simply falls through to the
/// next layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverride {
    pub quality_tools: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub max_files: Option<usize>,
    pub error_type: Option<String>,
    pub ignore: Option<Vec<String>>,
    pub max_errors_per_iteration: Option<usize>,
    pub dry_run: Option<bool>,
    pub use_sandbox: Option<bool>,
    pub run_tests: Option<bool>,
    pub max_parallel_files: Option<u32>,
    pub test_validation: Option<TestValidation>,
    pub continue_on_error: Option<bool>,
    pub max_retries: Option<u32>,
    pub processing_strategy: Option<ProcessingStrategy>,
    pub agent_name: Option<String>,
    pub assistant_timeout_secs: Option<u64>,
}

impl ConfigOverride {
    fn apply(self, base: &mut SessionConfig) {
        if let Some(v) = self.quality_tools {
            base.quality_tools = v;
        }
        if let Some(v) = self.include {
            base.include = v;
        }
        if let Some(v) = self.exclude {
            base.exclude = v;
        }
        if let Some(v) = self.max_files {
            base.max_files = v;
        }
        if let Some(v) = self.error_type {
            base.error_type = Some(v);
        }
        if let Some(v) = self.ignore {
            base.ignore = v;
        }
        if let Some(v) = self.max_errors_per_iteration {
            base.max_errors_per_iteration = v;
        }
        if let Some(v) = self.dry_run {
            base.dry_run = v;
        }
        if let Some(v) = self.use_sandbox {
            base.use_sandbox = v;
        }
        if let Some(v) = self.run_tests {
            base.run_tests = v;
        }
        if let Some(v) = self.max_parallel_files {
            base.max_parallel_files = v;
        }
        if let Some(v) = self.test_validation {
            base.test_validation = v;
        }
        if let Some(v) = self.continue_on_error {
            base.continue_on_error = v;
        }
        if let Some(v) = self.max_retries {
            base.max_retries = v;
        }
        if let Some(v) = self.processing_strategy {
            base.processing_strategy = v;
        }
        if let Some(v) = self.agent_name {
            base.agent_name = v;
        }
        if let Some(v) = self.assistant_timeout_secs {
            base.assistant_timeout_secs = v;
        }
    }
}

/// Reads the `[tool.stomper]` table out of `pyproject.toml`-style
/// build metadata, falling back to a standalone `stomper.toml`.
fn load_file_override(project_root: &Path) -> Result<ConfigOverride, ConfigError> {
    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default)]
        tool: HashMap<String, toml::Value>,
    }

    let project_toml = project_root.join("pyproject.toml");
    if project_toml.exists() {
        let content = std::fs::read_to_string(&project_toml)
            .map_err(|e| ConfigError::ReadFailed(project_toml.clone(), e))?;
        let wrapper: Wrapper = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(project_toml.clone(), e))?;
        if let Some(value) = wrapper.tool.get("stomper") {
            return value
                .clone()
                .try_into()
                .map_err(|e| ConfigError::ParseFailed(project_toml, e));
        }
    }

    let standalone = project_root.join("stomper.toml");
    if standalone.exists() {
        let content = std::fs::read_to_string(&standalone)
            .map_err(|e| ConfigError::ReadFailed(standalone.clone(), e))?;
        return toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(standalone, e));
    }

    Ok(ConfigOverride::default())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("STOMPER_{name}")).ok()
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_var(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable STOMPER_ environment variable");
            None
        }
    }
}

/// Reads overrides from `STOMPER_*` environment variables.
fn load_env_override() -> ConfigOverride {
    ConfigOverride {
        quality_tools: env_var("QUALITY_TOOLS")
            .map(|v| v.split(',').map(str::trim).map(str::to_string).collect()),
        max_files: parse_env("MAX_FILES"),
        dry_run: parse_env("DRY_RUN"),
        use_sandbox: parse_env("USE_SANDBOX"),
        run_tests: parse_env("RUN_TESTS"),
        max_parallel_files: parse_env("MAX_PARALLEL_FILES"),
        continue_on_error: parse_env("CONTINUE_ON_ERROR"),
        max_retries: parse_env("MAX_RETRIES"),
        agent_name: env_var("AGENT_NAME"),
        assistant_timeout_secs: parse_env("ASSISTANT_TIMEOUT_SECS"),
        ..ConfigOverride::default()
    }
}

impl SessionConfig {
    /// Resolves a `SessionConfig` for `project_root`, layering defaults,
    /// the project's TOML config, environment variables, and finally
    /// `cli` overrides (highest precedence).
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the config file cannot be read/parsed,
    /// or when the final resolved configuration is internally inconsistent
    /// (e.g. `max_parallel_files` out of `[1, 32]`).
    pub fn resolve(project_root: PathBuf, cli: ConfigOverride) -> Result<Self, ConfigError> {
        let mut config = SessionConfig {
            project_root: project_root.clone(),
            ..SessionConfig::default()
        };

        load_file_override(&project_root)?.apply(&mut config);
        load_env_override().apply(&mut config);
        cli.apply(&mut config);

        if !(1..=32).contains(&config.max_parallel_files) {
            return Err(ConfigError::InvalidParallelism(config.max_parallel_files));
        }
        if config.max_retries < 1 {
            return Err(ConfigError::InvalidRetries(config.max_retries));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = SessionConfig::resolve(PathBuf::from("."), ConfigOverride::default());
        assert!(config.is_ok());
    }

    #[test]
    fn cli_override_beats_default() {
        let dir = TempDir::new().unwrap();
        let cli = ConfigOverride {
            max_parallel_files: Some(8),
            ..ConfigOverride::default()
        };
        let config = SessionConfig::resolve(dir.path().to_path_buf(), cli).unwrap();
        assert_eq!(config.max_parallel_files, 8);
    }

    #[test]
    fn zero_parallelism_is_a_fatal_config_error() {
        let dir = TempDir::new().unwrap();
        let cli = ConfigOverride {
            max_parallel_files: Some(0),
            ..ConfigOverride::default()
        };
        let result = SessionConfig::resolve(dir.path().to_path_buf(), cli);
        assert!(matches!(result, Err(ConfigError::InvalidParallelism(0))));
    }

    #[test]
    fn toml_table_is_picked_up_from_pyproject() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            "[tool.stomper]\nmax_retries = 7\nagent_name = \"custom-agent\"\n",
        )
        .unwrap();
        let config = SessionConfig::resolve(dir.path().to_path_buf(), ConfigOverride::default()).unwrap();
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.agent_name, "custom-agent");
    }
}
