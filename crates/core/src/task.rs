//! Task definitions registered with the orchestrator.
//!
//! A [`Task`] is plain data plus two callbacks. Bodies are async closures
//! that receive a [`TaskContext`] and a clone of the task's resource handle;
//! the orchestrator never looks inside them.

use crate::error::BoxError;
use futures::FutureExt;
use futures::future::BoxFuture;
use ordo_task_graph::TaskNodeData;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Counters a task reports about the work it did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    /// Records created
    pub created: u64,
    /// Records updated
    pub updated: u64,
    /// Records left untouched (already present)
    pub skipped: u64,
}

impl TaskCounts {
    /// Counters with explicit values.
    #[must_use]
    pub const fn new(created: u64, updated: u64, skipped: u64) -> Self {
        Self {
            created,
            updated,
            skipped,
        }
    }

    /// Only `created` set.
    #[must_use]
    pub const fn created(created: u64) -> Self {
        Self::new(created, 0, 0)
    }

    /// Add another set of counters into this one.
    pub fn absorb(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

/// Per-invocation context handed to task bodies.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task: String,
    attempt: u32,
    cancellation: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(task: &str, cancellation: CancellationToken) -> Self {
        Self {
            task: task.to_string(),
            attempt: 0,
            cancellation,
        }
    }

    pub(crate) fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            ..self.clone()
        }
    }

    /// Name of the task being run.
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.task
    }

    /// 1-based attempt number of the current `execute` call. `validate`
    /// sees the attempt that succeeded; resource providers see 0.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The run's cancellation token. Long task bodies may poll it; the
    /// orchestrator never interrupts a body that has started.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Shorthand for `cancellation().is_cancelled()`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

type ExecuteFn<H> =
    Arc<dyn Fn(TaskContext, H) -> BoxFuture<'static, Result<TaskCounts, BoxError>> + Send + Sync>;
type ValidateFn<H> =
    Arc<dyn Fn(TaskContext, H) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A named unit of work with dependencies, a priority and callbacks.
///
/// `H` is the resource handle type of the orchestrator's provider.
pub struct Task<H> {
    name: String,
    dependencies: Vec<String>,
    priority: i32,
    continue_on_error: bool,
    max_attempts: Option<u32>,
    execute: ExecuteFn<H>,
    validate: Option<ValidateFn<H>>,
}

impl<H: Send + 'static> Task<H> {
    /// Create a task from its name and `execute` body.
    pub fn new<F, Fut>(name: impl Into<String>, execute: F) -> Self
    where
        F: Fn(TaskContext, H) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskCounts, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            priority: 0,
            continue_on_error: false,
            max_attempts: None,
            execute: Arc::new(move |ctx, handle| execute(ctx, handle).boxed()),
            validate: None,
        }
    }

    /// Declare the tasks that must succeed before this one runs.
    #[must_use]
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Set the priority; lower runs earlier when dependencies allow.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a post-condition check, run once after a successful `execute`.
    #[must_use]
    pub fn with_validation<F, Fut>(mut self, validate: F) -> Self
    where
        F: Fn(TaskContext, H) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.validate = Some(Arc::new(move |ctx, handle| validate(ctx, handle).boxed()));
        self
    }

    /// Keep running unrelated tasks if this one fails. Tasks depending on
    /// it are still skipped.
    #[must_use]
    pub const fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Override the orchestrator's retry budget for this task.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl<H> Task<H> {
    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependency names.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Declared priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether a failure of this task lets the run continue.
    #[must_use]
    pub fn is_continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    /// Per-task retry budget, if set.
    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Whether a validator is attached.
    #[must_use]
    pub fn has_validation(&self) -> bool {
        self.validate.is_some()
    }

    pub(crate) fn execute(
        &self,
        ctx: TaskContext,
        handle: H,
    ) -> BoxFuture<'static, Result<TaskCounts, BoxError>> {
        (self.execute)(ctx, handle)
    }

    pub(crate) fn validate(
        &self,
        ctx: TaskContext,
        handle: H,
    ) -> Option<BoxFuture<'static, Result<(), BoxError>>> {
        self.validate.as_ref().map(|validate| validate(ctx, handle))
    }
}

impl<H> Clone for Task<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            dependencies: self.dependencies.clone(),
            priority: self.priority,
            continue_on_error: self.continue_on_error,
            max_attempts: self.max_attempts,
            execute: Arc::clone(&self.execute),
            validate: self.validate.clone(),
        }
    }
}

impl<H> fmt::Debug for Task<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("continue_on_error", &self.continue_on_error)
            .field("max_attempts", &self.max_attempts)
            .field("has_validation", &self.validate.is_some())
            .finish_non_exhaustive()
    }
}

impl<H> TaskNodeData for Task<H> {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
