//! Per-task results and run statistics.

use crate::error::TaskError;
use crate::task::TaskCounts;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Outcome of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// Task name
    pub name: String,
    /// Whether execute, validate and commit all succeeded
    pub success: bool,
    /// Wall-clock time from boundary open to commit/rollback
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Counters reported by the task body
    pub counts: TaskCounts,
    /// Primary failure, `None` on success
    pub error: Option<TaskError>,
    /// Rollback failure, kept next to the primary error
    pub secondary_error: Option<String>,
    /// Execute attempts made
    pub attempts: u32,
    /// Parallel level the task ran in
    pub level: Option<usize>,
    /// When the task started
    pub started_at: DateTime<Utc>,
    /// Synthetic result produced by a dry run
    pub dry_run: bool,
}

impl TaskResult {
    /// Zero-duration success recorded for a dry run.
    pub(crate) fn planned(name: &str, level: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            duration: Duration::ZERO,
            counts: TaskCounts::default(),
            error: None,
            secondary_error: None,
            attempts: 0,
            level,
            started_at: Utc::now(),
            dry_run: true,
        }
    }

    /// Failure recorded without a usable timing, e.g. from a crashed unit.
    pub(crate) fn failed(name: &str, error: TaskError, level: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration: Duration::ZERO,
            counts: TaskCounts::default(),
            error: Some(error),
            secondary_error: None,
            attempts: 0,
            level,
            started_at: Utc::now(),
            dry_run: false,
        }
    }
}

/// Aggregated statistics for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    /// Tasks attempted (or planned, in a dry run)
    pub total: usize,
    /// Tasks that succeeded
    pub successful: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Sum of per-task durations
    #[serde(rename = "total_duration_ms", serialize_with = "serialize_millis")]
    pub total_duration: Duration,
    /// Results in the order they were folded
    pub results: Vec<TaskResult>,
    /// Tasks not attempted because a dependency failed
    pub skipped: Vec<String>,
}

impl Statistics {
    /// Counter totals over all results.
    #[must_use]
    pub fn counts(&self) -> TaskCounts {
        self.results.iter().fold(TaskCounts::default(), |mut acc, r| {
            acc.absorb(r.counts);
            acc
        })
    }

    /// Look up the result of a task by name.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Names of the results in fold order.
    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    /// No task failed and none was skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped.is_empty()
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .results
            .iter()
            .map(|r| r.name.len())
            .chain(self.skipped.iter().map(String::len))
            .max()
            .unwrap_or(0);

        for result in &self.results {
            let tag = match (result.dry_run, result.success) {
                (true, _) => "dry",
                (false, true) => "ok",
                (false, false) => "fail",
            };
            write!(
                f,
                "[{tag:<4}] {:<width$}  {:>6}ms",
                result.name,
                result.duration.as_millis()
            )?;
            match &result.error {
                None => write!(
                    f,
                    "  created={} updated={} skipped={}",
                    result.counts.created, result.counts.updated, result.counts.skipped
                )?,
                Some(error) => write!(f, "  {error}")?,
            }
            if let Some(secondary) = &result.secondary_error {
                write!(f, " (rollback failed: {secondary})")?;
            }
            writeln!(f)?;
        }
        for name in &self.skipped {
            writeln!(f, "[skip] {name:<width$}  dependency failed")?;
        }

        let counts = self.counts();
        write!(
            f,
            "{} task(s): {} successful, {} failed, {} skipped in {}ms (created={} updated={} skipped={})",
            self.total,
            self.successful,
            self.failed,
            self.skipped.len(),
            self.total_duration.as_millis(),
            counts.created,
            counts.updated,
            counts.skipped
        )
    }
}

/// Folds task results into [`Statistics`].
#[derive(Debug, Default)]
pub struct StatsCollector {
    stats: Statistics,
}

impl StatsCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one result.
    pub fn fold(&mut self, result: TaskResult) {
        self.stats.total += 1;
        if result.success {
            self.stats.successful += 1;
        } else {
            self.stats.failed += 1;
        }
        self.stats.total_duration += result.duration;
        self.stats.results.push(result);
    }

    /// Record a task that was never attempted.
    pub fn record_skipped(&mut self, name: impl Into<String>) {
        self.stats.skipped.push(name.into());
    }

    /// Snapshot of everything folded so far.
    #[must_use]
    pub fn summary(&self) -> Statistics {
        self.stats.clone()
    }

    pub(crate) fn into_summary(self) -> Statistics {
        self.stats
    }
}
