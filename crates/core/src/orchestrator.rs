//! The orchestrator: task registry plus run entry points.

use crate::config::{OrchestratorConfig, RunOptions};
use crate::engine::Engine;
use crate::error::{Error, Result, RunFailure};
use crate::resolver::{self, ExecutionPlan};
use crate::resource::{NoopProvider, ResourceProvider};
use crate::retry::RetryPolicy;
use crate::stats::Statistics;
use crate::task::Task;
use ordo_task_graph::{TaskGraph, ValidationResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Registry of tasks and the provider their boundaries come from.
///
/// ```ignore
/// let mut orchestrator = Orchestrator::new(PgProvider::new(pool));
/// orchestrator.register(Task::new("users", seed_users))?;
/// orchestrator.register(Task::new("posts", seed_posts).depends_on(["users"]))?;
///
/// let stats = orchestrator.run(RunOptions::new().with_parallel(true)).await?;
/// println!("{stats}");
/// ```
pub struct Orchestrator<P: ResourceProvider> {
    provider: Arc<P>,
    retry: RetryPolicy,
    tasks: Vec<Task<P::Handle>>,
    names: HashSet<String>,
}

impl Orchestrator<NoopProvider> {
    /// Orchestrator for tasks that need no resource boundary.
    #[must_use]
    pub fn without_resources() -> Self {
        Self::new(NoopProvider)
    }
}

impl<P: ResourceProvider> Orchestrator<P> {
    /// Create an orchestrator with the default retry policy.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            retry: RetryPolicy::default(),
            tasks: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Create an orchestrator whose retry policy comes from configuration.
    pub fn from_config(provider: P, config: &OrchestratorConfig) -> Self {
        Self::new(provider).with_retry_policy(config.retry_policy())
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy applied to tasks without their own budget.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Register a task. Registration order is the final ordering tie-break.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if the name is already registered.
    pub fn register(&mut self, task: Task<P::Handle>) -> Result<()> {
        if !self.names.insert(task.name().to_string()) {
            return Err(Error::DuplicateTask {
                name: task.name().to_string(),
            });
        }
        tracing::debug!(
            task = %task.name(),
            dependencies = ?task.dependencies(),
            "Registered task"
        );
        self.tasks.push(task);
        Ok(())
    }

    /// Registered tasks in registration order.
    #[must_use]
    pub fn tasks(&self) -> &[Task<P::Handle>] {
        &self.tasks
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolve the plan a run with these options would follow.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown `only` names, missing
    /// dependencies or cycles.
    pub fn plan(&self, options: &RunOptions) -> Result<ExecutionPlan> {
        Ok(resolver::resolve(&self.tasks, options)?.plan())
    }

    /// Report every structural problem of the registered tasks at once.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut graph = TaskGraph::new();
        let mut errors = Vec::new();
        for task in &self.tasks {
            if let Err(e) = graph.add_task(task.name(), task.clone()) {
                errors.push(e);
            }
        }
        // Resolvable edges are added even when some are missing; the
        // missing ones are reported by `validate` below.
        if let Err(e) = graph.add_dependency_edges() {
            tracing::debug!(error = %e, "Task graph has dangling dependencies");
        }

        errors.extend(graph.validate().errors);
        if errors.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(errors)
        }
    }

    /// Run the registered tasks.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] carrying the error and the statistics gathered
    /// before the run stopped.
    pub async fn run(&self, options: RunOptions) -> std::result::Result<Statistics, RunFailure> {
        self.run_with_cancellation(options, CancellationToken::new())
            .await
    }

    /// Run the registered tasks under an external cancellation token.
    ///
    /// Once the token fires no new task starts; tasks already running finish
    /// and are recorded. A configured timeout cancels the run the same way.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] carrying the error and the statistics gathered
    /// before the run stopped.
    #[tracing::instrument(
        name = "run",
        skip_all,
        fields(
            tasks = self.tasks.len(),
            parallel = options.parallel,
            dry_run = options.dry_run
        )
    )]
    pub async fn run_with_cancellation(
        &self,
        options: RunOptions,
        cancellation: CancellationToken,
    ) -> std::result::Result<Statistics, RunFailure> {
        let resolved = resolver::resolve(&self.tasks, &options).map_err(|e| {
            tracing::error!(error = %e, "Failed to resolve execution plan");
            RunFailure::before_start(e)
        })?;
        tracing::info!(plan = ?resolved.plan(), "Resolved execution plan");

        let token = cancellation.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = options.timeout.map(|timeout| {
            let token = token.clone();
            let timed_out = Arc::clone(&timed_out);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!(?timeout, "Run timeout elapsed, cancelling");
                timed_out.store(true, Ordering::SeqCst);
                token.cancel();
            })
        });

        let engine = Engine::new(
            Arc::clone(&self.provider),
            self.retry,
            token,
            options.timeout,
            timed_out,
        );
        let outcome = engine.execute(resolved, options.dry_run).await;

        if let Some(timer) = timer {
            timer.abort();
        }

        match &outcome {
            Ok(stats) => tracing::info!(
                total = stats.total,
                successful = stats.successful,
                duration_ms = u64::try_from(stats.total_duration.as_millis()).unwrap_or(u64::MAX),
                "Run completed"
            ),
            Err(failure) => tracing::error!(
                error = %failure.error,
                total = failure.statistics.total,
                failed = failure.statistics.failed,
                "Run failed"
            ),
        }
        outcome
    }
}

impl<P: ResourceProvider> std::fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("retry", &self.retry)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}
