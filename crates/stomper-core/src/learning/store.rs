//! Persistent, per-project error-pattern learning store.
//!
//! Tracks fix-attempt outcomes keyed by `(tool, code)` and derives an
//! adaptive prompting strategy from that history, the way the orchestrator
//! uses it to decide how much context to hand the assistant on each retry.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use super::error::{LearningError, Result};
use crate::model::{Defect, FixOutcome, PromptStrategy};

/// One recorded fix attempt, appended to its `ErrorPattern`'s history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAttempt {
    pub tool: String,
    pub code: String,
    pub outcome: FixOutcome,
    pub strategy: PromptStrategy,
    pub timestamp: DateTime<Utc>,
    pub file: Option<PathBuf>,
}

/// Aggregated outcome history for a single `(tool, code)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub tool: String,
    pub code: String,
    pub total_attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub attempts: Vec<ErrorAttempt>,
    pub successful_strategies: HashSet<PromptStrategy>,
    pub failed_strategies: HashSet<PromptStrategy>,
}

impl ErrorPattern {
    fn new(tool: &str, code: &str) -> Self {
        Self {
            tool: tool.to_string(),
            code: code.to_string(),
            total_attempts: 0,
            successes: 0,
            failures: 0,
            attempts: Vec::new(),
            successful_strategies: HashSet::new(),
            failed_strategies: HashSet::new(),
        }
    }

    /// Fraction of attempts that succeeded, `0.0` when there is no history.
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_attempts as f64
        }
    }

    /// True once an error code has proven hard to fix: at least three
    /// attempts with a success rate under 50%.
    pub fn is_difficult(&self) -> bool {
        self.total_attempts >= 3 && self.success_rate() < 0.5
    }

    fn record(&mut self, outcome: FixOutcome, strategy: PromptStrategy, file: Option<PathBuf>) {
        self.total_attempts += 1;
        match outcome {
            FixOutcome::Success => {
                self.successes += 1;
                self.successful_strategies.insert(strategy);
            }
            FixOutcome::Failure => {
                self.failures += 1;
                self.failed_strategies.insert(strategy);
            }
            FixOutcome::Partial | FixOutcome::Skipped => {}
        }
        self.attempts.push(ErrorAttempt {
            tool: self.tool.clone(),
            code: self.code.clone(),
            outcome,
            strategy,
            timestamp: Utc::now(),
            file,
        });
    }

    /// The strategy that has succeeded most often for this pattern, if any.
    fn most_frequent_successful_strategy(&self) -> Option<PromptStrategy> {
        let mut counts: HashMap<PromptStrategy, u32> = HashMap::new();
        for attempt in &self.attempts {
            if attempt.outcome == FixOutcome::Success {
                *counts.entry(attempt.strategy).or_insert(0) += 1;
            }
        }
        counts.into_iter().max_by_key(|(_, count)| *count).map(|(s, _)| s)
    }
}

/// A prompting-strategy recommendation derived from a pattern's history.
#[derive(Debug, Clone)]
pub struct AdaptiveStrategy {
    pub verbosity: PromptStrategy,
    pub include_examples: bool,
    pub include_history: bool,
    pub retry_count: u32,
    pub suggested_approach: Option<String>,
}

/// Summary of one `(tool, code)` pattern, used in [`LearningStatistics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
    pub tool: String,
    pub code: String,
    pub success_rate: f64,
    pub total_attempts: u64,
}

/// Snapshot returned by [`LearningStore::statistics`].
#[derive(Debug, Clone)]
pub struct LearningStatistics {
    pub overall_success_rate: f64,
    pub total_attempts: u64,
    pub total_successes: u64,
    pub total_patterns: usize,
    pub last_updated: DateTime<Utc>,
    pub difficult_errors: Vec<PatternSummary>,
    pub easy_errors: Vec<PatternSummary>,
}

const CURRENT_VERSION: u32 = 1;

fn pattern_key(tool: &str, code: &str) -> String {
    format!("{tool}::{code}")
}

/// On-disk document persisted at `.stomper/learning_data.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LearningData {
    version: u32,
    patterns: HashMap<String, ErrorPattern>,
    total_attempts: u64,
    total_successes: u64,
    last_updated: DateTime<Utc>,
}

impl LearningData {
    fn new() -> Self {
        Self {
            version: CURRENT_VERSION,
            patterns: HashMap::new(),
            total_attempts: 0,
            total_successes: 0,
            last_updated: Utc::now(),
        }
    }

    fn overall_success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            (self.total_successes as f64 / self.total_attempts as f64) * 100.0
        }
    }
}

/// Tracks error-fix outcome history for a single project and derives
/// adaptive prompting strategies from it.
///
/// Internally single-writer: every mutating method serializes through an
/// async mutex so that concurrent orchestrator branches never interleave
/// writes to the in-memory map or the file on disk.
pub struct LearningStore {
    path: PathBuf,
    data: Mutex<LearningData>,
}

impl LearningStore {
    /// Loads (or initialises) the learning store rooted at `project_root`.
    ///
    /// A missing file is treated as an empty store. A corrupt or unreadable
    /// file is logged at `warn` and replaced in memory by an empty store;
    /// it is overwritten the next time a write occurs.
    ///
    /// # Errors
    /// Returns an error only if the store directory cannot be created.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self> {
        let dir = project_root.as_ref().join(".stomper");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("learning_data.json");

        let data = if path.exists() {
            match std::fs::read_to_string(&path).map(|s| serde_json::from_str::<LearningData>(&s)) {
                Ok(Ok(data)) => data,
                Ok(Err(err)) => {
                    warn!(%err, path = %path.display(), "learning store file is corrupt, starting fresh");
                    LearningData::new()
                }
                Err(err) => {
                    warn!(%err, path = %path.display(), "learning store file unreadable, starting fresh");
                    LearningData::new()
                }
            }
        } else {
            LearningData::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Records the outcome of one fix attempt and persists the store.
    ///
    /// Persistence failures are logged at `warn` and otherwise swallowed —
    /// a learning store that cannot be written to disk must never abort a
    /// session in progress.
    pub async fn record_attempt(
        &self,
        defect: &Defect,
        outcome: FixOutcome,
        strategy: PromptStrategy,
        file: Option<PathBuf>,
    ) {
        let mut data = self.data.lock().await;
        let key = pattern_key(&defect.tool, &defect.code);
        let pattern = data
            .patterns
            .entry(key)
            .or_insert_with(|| ErrorPattern::new(&defect.tool, &defect.code));
        pattern.record(outcome, strategy, file);
        data.total_attempts += 1;
        if outcome == FixOutcome::Success {
            data.total_successes += 1;
        }
        data.last_updated = Utc::now();

        if let Err(err) = Self::save(&self.path, &data) {
            warn!(%err, path = %self.path.display(), "failed to persist learning store");
        }
    }

    /// Success rate for a `(tool, code)` pair, `0.0` when unseen.
    pub async fn success_rate(&self, tool: &str, code: &str) -> f64 {
        let data = self.data.lock().await;
        data.patterns
            .get(&pattern_key(tool, code))
            .map(ErrorPattern::success_rate)
            .unwrap_or(0.0)
    }

    /// Derives the prompting strategy to use for `defect` on attempt
    /// `retry_count`, per the adaptive-strategy decision table.
    pub async fn adaptive_strategy(&self, defect: &Defect, retry_count: u32) -> AdaptiveStrategy {
        let data = self.data.lock().await;
        let pattern = data.patterns.get(&pattern_key(&defect.tool, &defect.code));

        let (verbosity, include_examples, include_history) = match pattern {
            None => (PromptStrategy::Normal, false, false),
            Some(p) if p.total_attempts == 0 => (PromptStrategy::Normal, false, false),
            Some(p) if p.is_difficult() && retry_count == 0 => (PromptStrategy::Detailed, true, true),
            Some(p) if p.is_difficult() && retry_count == 1 => (PromptStrategy::Detailed, true, true),
            Some(p) if p.is_difficult() => (PromptStrategy::Verbose, true, true),
            Some(p) if p.success_rate() >= 0.8 => (PromptStrategy::Minimal, false, false),
            Some(p) if p.success_rate() < 0.6 => (PromptStrategy::Normal, true, false),
            Some(_) => (PromptStrategy::Normal, false, false),
        };

        let suggested_approach = pattern.and_then(|p| {
            p.most_frequent_successful_strategy()
                .map(|s| format!("previous fixes for {} succeeded using a {s:?} prompt", defect.code))
        });

        AdaptiveStrategy {
            verbosity,
            include_examples,
            include_history,
            retry_count,
            suggested_approach,
        }
    }

    /// Returns the next strategy to try given a list already exhausted for
    /// this retry sequence, or `None` when every strategy has failed.
    pub async fn fallback_strategy(
        &self,
        defect: &Defect,
        failed: &[PromptStrategy],
    ) -> Option<PromptStrategy> {
        let data = self.data.lock().await;
        let pattern = data.patterns.get(&pattern_key(&defect.tool, &defect.code));

        if let Some(pattern) = pattern {
            if let Some(strategy) = pattern
                .successful_strategies
                .iter()
                .find(|s| !failed.contains(s))
            {
                return Some(*strategy);
            }
        }

        PromptStrategy::CANONICAL_ORDER
            .into_iter()
            .find(|s| !failed.contains(s))
    }

    /// Aggregate statistics over the whole store.
    pub async fn statistics(&self) -> LearningStatistics {
        let data = self.data.lock().await;

        let mut eligible: Vec<&ErrorPattern> = data
            .patterns
            .values()
            .filter(|p| p.total_attempts >= 3)
            .collect();

        eligible.sort_by(|a, b| a.success_rate().partial_cmp(&b.success_rate()).unwrap());
        let difficult_errors = eligible
            .iter()
            .take(5)
            .map(|p| PatternSummary {
                tool: p.tool.clone(),
                code: p.code.clone(),
                success_rate: p.success_rate(),
                total_attempts: p.total_attempts,
            })
            .collect();

        eligible.retain(|p| p.success_rate() >= 0.8);
        eligible.sort_by(|a, b| b.success_rate().partial_cmp(&a.success_rate()).unwrap());
        let easy_errors = eligible
            .iter()
            .take(5)
            .map(|p| PatternSummary {
                tool: p.tool.clone(),
                code: p.code.clone(),
                success_rate: p.success_rate(),
                total_attempts: p.total_attempts,
            })
            .collect();

        LearningStatistics {
            overall_success_rate: data.overall_success_rate(),
            total_attempts: data.total_attempts,
            total_successes: data.total_successes,
            total_patterns: data.patterns.len(),
            last_updated: data.last_updated,
            difficult_errors,
            easy_errors,
        }
    }

    /// Forces a write of the current in-memory state, bypassing the
    /// best-effort swallow in [`Self::record_attempt`]. Used by callers
    /// (e.g. the CLI) that want a hard error if the store is unwritable.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn flush(&self) -> Result<()> {
        let data = self.data.lock().await;
        Self::save(&self.path, &data)
    }

    fn save(path: &Path, data: &LearningData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path).map_err(LearningError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn defect(tool: &str, code: &str) -> Defect {
        Defect {
            tool: tool.to_string(),
            file: PathBuf::from("src/t.py"),
            line: 1,
            column: 0,
            code: code.to_string(),
            message: "example".to_string(),
            severity: crate::model::Severity::Warning,
            auto_fixable: true,
        }
    }

    #[tokio::test]
    async fn first_sighting_has_zero_attempts_and_normal_strategy() {
        let dir = TempDir::new().unwrap();
        let store = LearningStore::new(dir.path()).unwrap();
        let d = defect("ruff", "F401");
        let strategy = store.adaptive_strategy(&d, 0).await;
        assert_eq!(strategy.verbosity, PromptStrategy::Normal);
        assert!(!strategy.include_examples);
        assert!(!strategy.include_history);
    }

    #[tokio::test]
    async fn difficult_pattern_escalates_with_retry_count() {
        let dir = TempDir::new().unwrap();
        let store = LearningStore::new(dir.path()).unwrap();
        let d = defect("mypy", "arg-type");

        for _ in 0..4 {
            store
                .record_attempt(&d, FixOutcome::Failure, PromptStrategy::Normal, None)
                .await;
        }

        assert!(store.success_rate("mypy", "arg-type").await < 0.5);

        let s0 = store.adaptive_strategy(&d, 0).await;
        assert_eq!(s0.verbosity, PromptStrategy::Detailed);
        let s2 = store.adaptive_strategy(&d, 2).await;
        assert_eq!(s2.verbosity, PromptStrategy::Verbose);
    }

    #[tokio::test]
    async fn high_success_rate_yields_minimal_strategy() {
        let dir = TempDir::new().unwrap();
        let store = LearningStore::new(dir.path()).unwrap();
        let d = defect("ruff", "E501");

        for _ in 0..5 {
            store
                .record_attempt(&d, FixOutcome::Success, PromptStrategy::Normal, None)
                .await;
        }

        let strategy = store.adaptive_strategy(&d, 0).await;
        assert_eq!(strategy.verbosity, PromptStrategy::Minimal);
    }

    #[tokio::test]
    async fn fallback_strategy_never_repeats_a_failed_strategy() {
        let dir = TempDir::new().unwrap();
        let store = LearningStore::new(dir.path()).unwrap();
        let d = defect("ruff", "F841");

        let failed = vec![PromptStrategy::Minimal, PromptStrategy::Normal];
        let next = store.fallback_strategy(&d, &failed).await;
        assert_eq!(next, Some(PromptStrategy::Detailed));

        let all_failed = PromptStrategy::CANONICAL_ORDER.to_vec();
        let none_left = store.fallback_strategy(&d, &all_failed).await;
        assert_eq!(none_left, None);
    }

    #[tokio::test]
    async fn persistence_survives_reload() {
        let dir = TempDir::new().unwrap();
        let d = defect("ruff", "F401");
        {
            let store = LearningStore::new(dir.path()).unwrap();
            store
                .record_attempt(&d, FixOutcome::Success, PromptStrategy::Normal, None)
                .await;
        }
        let reloaded = LearningStore::new(dir.path()).unwrap();
        assert_eq!(reloaded.success_rate("ruff", "F401").await, 1.0);
    }

    #[tokio::test]
    async fn corrupt_file_is_replaced_by_empty_store() {
        let dir = TempDir::new().unwrap();
        let stomper_dir = dir.path().join(".stomper");
        std::fs::create_dir_all(&stomper_dir).unwrap();
        std::fs::write(stomper_dir.join("learning_data.json"), "{ not json").unwrap();

        let store = LearningStore::new(dir.path()).unwrap();
        let stats = store.statistics().await;
        assert_eq!(stats.total_attempts, 0);
    }

    #[tokio::test]
    async fn overall_success_rate_is_bounded() {
        let dir = TempDir::new().unwrap();
        let store = LearningStore::new(dir.path()).unwrap();
        let d = defect("ruff", "F401");
        store
            .record_attempt(&d, FixOutcome::Success, PromptStrategy::Normal, None)
            .await;
        let stats = store.statistics().await;
        assert!(stats.overall_success_rate >= 0.0 && stats.overall_success_rate <= 100.0);
    }
}
