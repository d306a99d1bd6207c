//! Execution engine.
//!
//! Walks a resolved plan, runs every task inside its own resource boundary
//! and folds the outcomes into [`Statistics`]. Levels of a parallel plan are
//! barriers: a level starts only after every task of the previous one has
//! committed or rolled back.

use crate::error::{Error, RunFailure, TaskError};
use crate::resolver::Resolved;
use crate::resource::ResourceProvider;
use crate::retry::{RetryFailure, RetryPolicy, with_retry};
use crate::stats::{Statistics, StatsCollector, TaskResult};
use crate::task::{Task, TaskContext, TaskCounts};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type TaskOutcome = std::result::Result<TaskCounts, TaskError>;

/// Runs one resolved plan.
pub(crate) struct Engine<P: ResourceProvider> {
    provider: Arc<P>,
    retry: RetryPolicy,
    cancellation: CancellationToken,
    timeout: Option<Duration>,
    timed_out: Arc<AtomicBool>,
}

/// Bookkeeping shared by both modes.
#[derive(Default)]
struct RunState {
    collector: StatsCollector,
    /// Tasks whose dependents must not run (failed or skipped)
    blocked: HashSet<String>,
    failures: Vec<(String, TaskError)>,
}

impl RunState {
    fn is_blocked<H>(&self, task: &Task<H>) -> bool {
        task.dependencies().iter().any(|dep| self.blocked.contains(dep))
    }

    fn skip(&mut self, name: &str) {
        tracing::warn!(task = %name, "Skipping task: a dependency failed");
        self.blocked.insert(name.to_string());
        self.collector.record_skipped(name);
    }

    /// Fold a result; returns whether it failed.
    fn record(&mut self, result: TaskResult) -> bool {
        let failed = if let Some(error) = &result.error {
            self.blocked.insert(result.name.clone());
            self.failures.push((result.name.clone(), error.clone()));
            true
        } else {
            false
        };
        self.collector.fold(result);
        failed
    }
}

impl<P: ResourceProvider> Engine<P> {
    pub(crate) fn new(
        provider: Arc<P>,
        retry: RetryPolicy,
        cancellation: CancellationToken,
        timeout: Option<Duration>,
        timed_out: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider,
            retry,
            cancellation,
            timeout,
            timed_out,
        }
    }

    /// Execute a resolved plan.
    pub(crate) async fn execute(
        &self,
        resolved: Resolved<P::Handle>,
        dry_run: bool,
    ) -> std::result::Result<Statistics, RunFailure> {
        match resolved {
            Resolved::Sequential(order) => self.run_sequential(order, dry_run).await,
            Resolved::Parallel(levels) => self.run_parallel(levels, dry_run).await,
        }
    }

    async fn run_sequential(
        &self,
        order: Vec<Task<P::Handle>>,
        dry_run: bool,
    ) -> std::result::Result<Statistics, RunFailure> {
        let mut state = RunState::default();

        for task in order {
            if dry_run {
                tracing::info!(task = %task.name(), "Dry run: would execute task");
                state.collector.fold(TaskResult::planned(task.name(), None));
                continue;
            }
            if self.cancellation.is_cancelled() {
                return Err(self.interrupted(state));
            }
            if state.is_blocked(&task) {
                state.skip(task.name());
                continue;
            }

            let tolerant = task.is_continue_on_error();
            let result = run_task(
                Arc::clone(&self.provider),
                task,
                self.retry,
                self.cancellation.clone(),
                None,
            )
            .await;

            if state.record(result) && !tolerant {
                return Err(self.failed(state));
            }
        }

        self.finish(state)
    }

    async fn run_parallel(
        &self,
        levels: Vec<Vec<Task<P::Handle>>>,
        dry_run: bool,
    ) -> std::result::Result<Statistics, RunFailure> {
        let mut state = RunState::default();

        for (level, tasks) in levels.into_iter().enumerate() {
            if dry_run {
                for task in &tasks {
                    tracing::info!(task = %task.name(), level, "Dry run: would execute task");
                    state
                        .collector
                        .fold(TaskResult::planned(task.name(), Some(level)));
                }
                continue;
            }

            tracing::info!(level, tasks = tasks.len(), "Starting level");
            let names: Vec<String> = tasks.iter().map(|t| t.name().to_string()).collect();
            let tolerant: Vec<bool> = tasks.iter().map(Task::is_continue_on_error).collect();
            let mut slots: Vec<Option<TaskResult>> = vec![None; tasks.len()];
            let mut slot_of = HashMap::new();
            let mut join_set = JoinSet::new();
            let mut interrupted = false;

            for (slot, task) in tasks.into_iter().enumerate() {
                if self.cancellation.is_cancelled() {
                    interrupted = true;
                    break;
                }
                if state.is_blocked(&task) {
                    state.skip(task.name());
                    continue;
                }
                let handle = join_set.spawn(run_task(
                    Arc::clone(&self.provider),
                    task,
                    self.retry,
                    self.cancellation.clone(),
                    Some(level),
                ));
                slot_of.insert(handle.id(), slot);
            }

            // Barrier: every spawned task finishes before the level is folded.
            while let Some(joined) = join_set.join_next_with_id().await {
                match joined {
                    Ok((id, result)) => {
                        if let Some(&slot) = slot_of.get(&id) {
                            slots[slot] = Some(result);
                        }
                    }
                    Err(join_error) => {
                        let Some(&slot) = slot_of.get(&join_error.id()) else {
                            continue;
                        };
                        let error = if join_error.is_panic() {
                            TaskError::Panicked {
                                message: panic_message(&*join_error.into_panic()),
                            }
                        } else {
                            TaskError::Cancelled
                        };
                        tracing::error!(task = %names[slot], %error, "Task execution panicked");
                        slots[slot] = Some(TaskResult::failed(&names[slot], error, Some(level)));
                    }
                }
            }

            let mut level_failed = false;
            for (slot, result) in slots.into_iter().enumerate() {
                if let Some(result) = result
                    && state.record(result)
                    && !tolerant[slot]
                {
                    level_failed = true;
                }
            }

            if interrupted {
                return Err(self.interrupted(state));
            }
            if level_failed {
                tracing::error!(level, "Level failed, aborting remaining levels");
                return Err(self.failed(state));
            }
        }

        self.finish(state)
    }

    fn finish(&self, state: RunState) -> std::result::Result<Statistics, RunFailure> {
        if state.failures.is_empty() {
            Ok(state.collector.into_summary())
        } else {
            Err(self.failed(state))
        }
    }

    /// Stopped because the cancellation token fired before a task started.
    fn interrupted(&self, state: RunState) -> RunFailure {
        tracing::warn!("Run cancelled, not starting remaining tasks");
        RunFailure {
            error: self.cancelled_error(),
            statistics: state.collector.into_summary(),
        }
    }

    fn failed(&self, state: RunState) -> RunFailure {
        let only_cancelled = state
            .failures
            .iter()
            .all(|(_, error)| *error == TaskError::Cancelled);

        let error = if only_cancelled && self.cancellation.is_cancelled() {
            self.cancelled_error()
        } else {
            match state.failures.as_slice() {
                [(task, source)] => Error::TaskFailed {
                    task: task.clone(),
                    source: source.clone(),
                },
                failures => Error::TasksFailed {
                    tasks: failures.iter().map(|(name, _)| name.clone()).collect(),
                },
            }
        };

        RunFailure {
            error,
            statistics: state.collector.into_summary(),
        }
    }

    fn cancelled_error(&self) -> Error {
        match self.timeout {
            Some(timeout) if self.timed_out.load(Ordering::SeqCst) => Error::TimedOut { timeout },
            _ => Error::Cancelled,
        }
    }
}

/// Render a panic payload as text.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Await a future, turning a panic into its message.
async fn guarded<F: Future>(future: F) -> std::result::Result<F::Output, String> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(&*payload))
}

/// Run one task inside its own resource boundary.
async fn run_task<P: ResourceProvider>(
    provider: Arc<P>,
    task: Task<P::Handle>,
    retry: RetryPolicy,
    cancellation: CancellationToken,
    level: Option<usize>,
) -> TaskResult {
    let started_at = Utc::now();
    let start = Instant::now();
    let name = task.name().to_string();
    let ctx = TaskContext::new(&name, cancellation.clone());

    tracing::debug!(task = %name, ?level, "Opening resource boundary");
    let handle = match guarded(provider.open(&ctx)).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            let error = TaskError::Resource {
                message: format!("open failed: {e}"),
            };
            tracing::error!(task = %name, %error, "Task failed");
            return TaskResult {
                started_at,
                duration: start.elapsed(),
                ..TaskResult::failed(&name, error, level)
            };
        }
        Err(message) => {
            let error = TaskError::Panicked { message };
            tracing::error!(task = %name, %error, "Task execution panicked");
            return TaskResult {
                started_at,
                duration: start.elapsed(),
                ..TaskResult::failed(&name, error, level)
            };
        }
    };

    let policy = task
        .max_attempts()
        .map_or(retry, |max| retry.with_max_attempts(max));
    let attempts = AtomicU32::new(0);

    let executed = guarded(with_retry(&policy, &cancellation, |attempt| {
        attempts.store(attempt, Ordering::SeqCst);
        tracing::debug!(task = %name, attempt, "Executing task");
        task.execute(ctx.for_attempt(attempt), handle.clone())
    }))
    .await;
    let attempts = attempts.load(Ordering::SeqCst);

    let outcome: TaskOutcome = match executed {
        Err(message) => Err(TaskError::Panicked { message }),
        Ok(Err(RetryFailure::Cancelled { .. })) => Err(TaskError::Cancelled),
        Ok(Err(RetryFailure::Exhausted {
            attempts,
            last_error,
        })) => Err(TaskError::Execution {
            message: last_error.to_string(),
            attempts,
        }),
        Ok(Ok((counts, _))) => {
            // The callback itself may panic before handing back its future.
            let validated = guarded(async {
                match task.validate(ctx.for_attempt(attempts), handle.clone()) {
                    Some(validation) => validation.await,
                    None => Ok(()),
                }
            })
            .await;
            match validated {
                Ok(Ok(())) => Ok(counts),
                Ok(Err(e)) => Err(TaskError::Validation {
                    message: e.to_string(),
                }),
                Err(message) => Err(TaskError::Panicked { message }),
            }
        }
    };

    let mut secondary_error = None;
    let outcome = match outcome {
        Ok(counts) => match guarded(provider.commit(handle)).await {
            Ok(Ok(())) => Ok(counts),
            Ok(Err(e)) => Err(TaskError::Resource {
                message: format!("commit failed: {e}"),
            }),
            Err(message) => Err(TaskError::Panicked { message }),
        },
        Err(error) => {
            match guarded(provider.rollback(handle)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => secondary_error = Some(e.to_string()),
                Err(message) => secondary_error = Some(format!("rollback panicked: {message}")),
            }
            Err(error)
        }
    };

    let duration = start.elapsed();
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    let (success, counts, error) = match outcome {
        Ok(counts) => {
            tracing::info!(
                task = %name,
                duration_ms,
                attempts,
                created = counts.created,
                updated = counts.updated,
                skipped = counts.skipped,
                "Task completed"
            );
            (true, counts, None)
        }
        Err(error) => {
            if error.is_fault() {
                tracing::error!(
                    task = %name,
                    duration_ms,
                    attempts,
                    %error,
                    "Task execution panicked"
                );
            } else {
                tracing::error!(task = %name, duration_ms, attempts, %error, "Task failed");
            }
            if let Some(secondary) = &secondary_error {
                tracing::error!(task = %name, error = %secondary, "Rollback failed");
            }
            (false, TaskCounts::default(), Some(error))
        }
    };

    TaskResult {
        name,
        success,
        duration,
        counts,
        error,
        secondary_error,
        attempts,
        level,
        started_at,
        dry_run: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::resource::NoopProvider;
    use async_trait::async_trait;

    fn engine<P: ResourceProvider>(provider: P) -> Engine<P> {
        Engine::new(
            Arc::new(provider),
            RetryPolicy::new(2, Duration::from_millis(1)),
            CancellationToken::new(),
            None,
            Arc::new(AtomicBool::new(false)),
        )
    }

    struct FailingCommit;

    #[async_trait]
    impl ResourceProvider for FailingCommit {
        type Handle = ();

        async fn open(&self, _ctx: &TaskContext) -> Result<(), BoxError> {
            Ok(())
        }

        async fn commit(&self, _handle: ()) -> Result<(), BoxError> {
            Err("disk full".into())
        }

        async fn rollback(&self, _handle: ()) -> Result<(), BoxError> {
            Err("connection lost".into())
        }
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static str"), "static str");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic payload");
    }

    #[tokio::test]
    async fn test_run_task_success() {
        let task = Task::new("users", |_, ()| async { Ok(TaskCounts::created(4)) });
        let engine = engine(NoopProvider);
        let result = run_task(engine.provider, task, engine.retry, engine.cancellation, None).await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.counts.created, 4);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_run_task_commit_failure_is_fatal() {
        let task = Task::new("users", |_, ()| async { Ok(TaskCounts::created(1)) });
        let engine = engine(FailingCommit);
        let result = run_task(engine.provider, task, engine.retry, engine.cancellation, None).await;

        assert!(!result.success);
        assert_eq!(
            result.error,
            Some(TaskError::Resource {
                message: "commit failed: disk full".into()
            })
        );
        assert_eq!(result.counts, TaskCounts::default());
        assert!(result.secondary_error.is_none());
    }

    #[tokio::test]
    async fn test_run_task_rollback_failure_is_secondary() {
        let task: Task<()> = Task::new("users", |_, ()| async { Err("bad row".into()) });
        let engine = engine(FailingCommit);
        let result = run_task(engine.provider, task, engine.retry, engine.cancellation, None).await;

        assert_eq!(
            result.error,
            Some(TaskError::Execution {
                message: "bad row".into(),
                attempts: 2
            })
        );
        assert_eq!(result.secondary_error.as_deref(), Some("connection lost"));
    }

    #[tokio::test]
    async fn test_run_task_recovers_panic() {
        let task: Task<()> = Task::new("users", |_, ()| async {
            if true {
                panic!("seed data corrupt");
            }
            Ok(TaskCounts::default())
        });
        let engine = engine(NoopProvider);
        let result = run_task(
            engine.provider,
            task,
            engine.retry,
            engine.cancellation,
            Some(0),
        )
        .await;

        assert_eq!(
            result.error,
            Some(TaskError::Panicked {
                message: "seed data corrupt".into()
            })
        );
        assert_eq!(result.attempts, 1);
        assert_eq!(result.level, Some(0));
    }
}
