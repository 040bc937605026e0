//! Stomper Core - parallel fix-orchestration engine.
//!
//! This crate drives automated repair of code-quality defects: it
//! discovers files, runs pluggable diagnostics tools, isolates each
//! file's fix attempt in its own git worktree, invokes an external AI
//! coding assistant to produce a patch, validates the result against the
//! original defect set, and integrates surviving fixes one at a time.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stomper_core::assistant::SubprocessAssistant;
//! use stomper_core::config::SessionConfig;
//! use stomper_core::diagnostics::ToolRegistry;
//! use stomper_core::learning::LearningStore;
//! use stomper_core::orchestrator::Orchestrator;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SessionConfig::default();
//! let registry = Arc::new(ToolRegistry::with_defaults());
//! let learning = Arc::new(LearningStore::new(&config.project_root)?);
//! let assistant = Arc::new(SubprocessAssistant::new(config.agent_name.clone()));
//! let orchestrator = Orchestrator::new(config, registry, learning, assistant)?;
//! let summary = orchestrator.run().await?;
//! println!("{summary:?}");
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod fix_applier;
pub mod learning;
pub mod lock;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod validator;
pub mod workspace;
pub mod worktree;

pub use assistant::{AssistantError, AssistantRunResult, AssistantRunner, SubprocessAssistant};
pub use config::{ConfigError, FileSelection, ProcessingStrategy, SessionConfig, TestValidation};
pub use diagnostics::{DiagnosticsError, DiagnosticsTool, ToolRegistry};
pub use discovery::DiscoveryError;
pub use error::{Result, StomperError};
pub use fix_applier::FixApplier;
pub use learning::{AdaptiveStrategy, LearningError, LearningStore};
pub use lock::{IntegrationLock, IntegrationLockGuard, LockError};
pub use model::{
    Defect, FileTask, FileTaskStatus, FixOutcome, PromptStrategy, Severity, SessionStatus,
    SessionSummary, ValidationResult, WorktreeHandle,
};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use prompt::PromptBuilder;
pub use validator::Validator;
pub use worktree::{WorktreeError, WorktreeManager, WorktreeStatus};
