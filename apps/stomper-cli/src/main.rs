//! Stomper CLI - command-line interface for the fix-orchestration engine.
//!
//! Provides a `stomper` binary wrapping the orchestrator: discover quality
//! defects, fix them with an external AI assistant inside isolated git
//! worktrees, and integrate the surviving fixes one at a time.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use stomper_core::config::{ConfigOverride, FileSelection, SessionConfig};
use stomper_core::diagnostics::ToolRegistry;
use stomper_core::learning::LearningStore;
use stomper_core::orchestrator::Orchestrator;
use stomper_core::{SessionStatus, SubprocessAssistant};

/// Stomper - automated code-quality defect repair
#[derive(Parser, Debug)]
#[command(
    name = "stomper",
    author,
    version,
    about = "Parallel fix-orchestration engine for code-quality defects"
)]
struct Args {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long = "log-level", default_value = "info", global = true)]
    log_level: String,

    /// Report what would be done without invoking the AI assistant
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a fix-orchestration session
    Run {
        /// Specific files to process (defaults to files changed against HEAD)
        files: Vec<PathBuf>,

        /// Process every file matching these glob patterns
        #[arg(long)]
        glob: Vec<String>,

        /// Quality tools to run, e.g. ruff,mypy
        #[arg(long, value_delimiter = ',')]
        tools: Option<Vec<String>>,

        /// Only fix defects with this error code
        #[arg(long)]
        error_type: Option<String>,

        /// Maximum number of files processed concurrently
        #[arg(long)]
        max_parallel_files: Option<u32>,

        /// Maximum fix attempts per file
        #[arg(long)]
        max_retries: Option<u32>,

        /// Keep processing remaining files after a failure
        #[arg(long)]
        continue_on_error: Option<bool>,
    },

    /// Print learning-store statistics without running a session
    Stats,

    /// Write a starter configuration file to the project root
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("a tracing subscriber was already installed");
    }

    let project_root = args.project_root.clone().unwrap_or_else(|| PathBuf::from("."));

    let result = match args.command.unwrap_or(Command::Run {
        files: Vec::new(),
        glob: Vec::new(),
        tools: None,
        error_type: None,
        max_parallel_files: None,
        max_retries: None,
        continue_on_error: None,
    }) {
        Command::Run { files, glob, tools, error_type, max_parallel_files, max_retries, continue_on_error } => {
            run_session(
                project_root,
                args.dry_run,
                files,
                glob,
                tools,
                error_type,
                max_parallel_files,
                max_retries,
                continue_on_error,
            )
            .await
        }
        Command::Stats => print_stats(project_root).await,
        Command::InitConfig => write_starter_config(project_root),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_session(
    project_root: PathBuf,
    dry_run: bool,
    files: Vec<PathBuf>,
    glob: Vec<String>,
    tools: Option<Vec<String>>,
    error_type: Option<String>,
    max_parallel_files: Option<u32>,
    max_retries: Option<u32>,
    continue_on_error: Option<bool>,
) -> anyhow::Result<()> {
    let cli_override = ConfigOverride {
        quality_tools: tools,
        error_type,
        dry_run: Some(dry_run),
        max_parallel_files,
        max_retries,
        continue_on_error,
        ..ConfigOverride::default()
    };

    let mut config = SessionConfig::resolve(project_root.clone(), cli_override)?;

    config.selection = if !files.is_empty() {
        FileSelection::Files { paths: files }
    } else if !glob.is_empty() {
        FileSelection::Glob { patterns: glob }
    } else {
        FileSelection::Changed
    };

    let registry = Arc::new(ToolRegistry::with_defaults());
    let learning = Arc::new(LearningStore::new(&config.project_root)?);
    let assistant = Arc::new(SubprocessAssistant::new(config.agent_name.clone()));

    let orchestrator = Orchestrator::new(config, registry, learning, assistant_as_trait(assistant))?;
    let summary = orchestrator.run().await?;

    println!(
        "{} fixed, {} failed, {} defects resolved",
        summary.successful_fixes.len(),
        summary.failed_fixes.len(),
        summary.total_errors_fixed
    );
    for file in &summary.failed_fixes {
        println!("  failed: {}", file.display());
    }

    if summary.status == SessionStatus::Failed {
        anyhow::bail!("session ended with unresolved failures");
    }
    Ok(())
}

/// `Orchestrator::new` takes its assistant as a trait object; this keeps
/// the call site above readable when the concrete type changes.
fn assistant_as_trait(
    assistant: Arc<SubprocessAssistant>,
) -> Arc<dyn stomper_core::AssistantRunner> {
    assistant
}

async fn print_stats(project_root: PathBuf) -> anyhow::Result<()> {
    let learning = LearningStore::new(&project_root)?;
    let stats = learning.statistics().await;

    println!("overall success rate: {:.1}%", stats.overall_success_rate);
    println!("total attempts: {}", stats.total_attempts);
    println!("total successes: {}", stats.total_successes);
    println!("tracked patterns: {}", stats.total_patterns);
    println!("last updated: {}", stats.last_updated);

    if !stats.difficult_errors.is_empty() {
        println!("\nmost difficult:");
        for p in &stats.difficult_errors {
            println!("  {} {} — {:.1}% over {} attempts", p.tool, p.code, p.success_rate, p.total_attempts);
        }
    }
    if !stats.easy_errors.is_empty() {
        println!("\nmost reliable:");
        for p in &stats.easy_errors {
            println!("  {} {} — {:.1}% over {} attempts", p.tool, p.code, p.success_rate, p.total_attempts);
        }
    }

    Ok(())
}

fn write_starter_config(project_root: PathBuf) -> anyhow::Result<()> {
    let path = project_root.join("stomper.toml");
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let starter = r#"# Stomper configuration. All fields are optional; unset fields fall
# back to built-in defaults, then to STOMPER_* environment variables.

quality_tools = ["ruff", "mypy"]
max_files = 100
max_errors_per_iteration = 100
max_parallel_files = 4
max_retries = 3
continue_on_error = true
run_tests = true
test_validation = "full"
agent_name = "cursor-agent"
assistant_timeout_secs = 300
"#;
    std::fs::write(&path, starter)?;
    println!("wrote {}", path.display());
    Ok(())
}
