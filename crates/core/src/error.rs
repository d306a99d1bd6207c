//! Error types for the orchestrator.
//!
//! Two layers: [`TaskError`] describes why a single task did not succeed and
//! lives on its [`TaskResult`](crate::TaskResult); [`Error`] describes why a
//! whole run (or a registration/plan call) failed.

use crate::stats::Statistics;
use miette::Diagnostic;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by task bodies and resource providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for orchestrator operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A task name was registered twice.
    #[error("Task '{name}' is already registered")]
    #[diagnostic(
        code(ordo::registration::duplicate),
        help("task names must be unique within one orchestrator")
    )]
    DuplicateTask {
        /// The duplicated name
        name: String,
    },

    /// A run was restricted to a task that was never registered.
    #[error("Unknown task '{name}' requested")]
    #[diagnostic(code(ordo::plan::unknown_task))]
    UnknownTask {
        /// The requested name
        name: String,
    },

    /// The dependency graph is invalid (missing dependency or cycle).
    #[error("Invalid task graph: {0}")]
    #[diagnostic(code(ordo::plan::graph))]
    Graph(#[from] ordo_task_graph::Error),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(ordo::config::invalid))]
    Config {
        /// What went wrong
        message: String,
    },

    /// A task failed and stopped the run.
    #[error("Task '{task}' failed: {source}")]
    #[diagnostic(code(ordo::run::task_failed))]
    TaskFailed {
        /// The failing task
        task: String,
        /// Why it failed
        #[source]
        source: TaskError,
    },

    /// Several tasks failed (tasks of one parallel level, or tasks marked
    /// continue-on-error).
    #[error("{} tasks failed: {}", .tasks.len(), .tasks.join(", "))]
    #[diagnostic(code(ordo::run::tasks_failed))]
    TasksFailed {
        /// Names of the failing tasks, in plan order
        tasks: Vec<String>,
    },

    /// The run was cancelled by the caller.
    #[error("Run cancelled before all tasks were started")]
    #[diagnostic(code(ordo::run::cancelled))]
    Cancelled,

    /// The run exceeded its configured timeout.
    #[error("Run timed out after {timeout:?}")]
    #[diagnostic(code(ordo::run::timed_out))]
    TimedOut {
        /// The configured timeout
        timeout: Duration,
    },
}

impl Error {
    /// Create a configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the environment asked the run to stop (as opposed to a task
    /// failing).
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut { .. })
    }

    /// Whether the error was detected before any task executed.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTask { .. }
                | Self::UnknownTask { .. }
                | Self::Graph(_)
                | Self::Config { .. }
        )
    }
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single task did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    /// `execute` returned an error on every attempt.
    #[error("execution failed after {attempts} attempt(s): {message}")]
    Execution {
        /// Error text of the last attempt
        message: String,
        /// Attempts made
        attempts: u32,
    },

    /// `validate` rejected the result of a successful `execute`.
    #[error("validation failed: {message}")]
    Validation {
        /// Error text from the validator
        message: String,
    },

    /// The task body panicked; the panic was recovered at the task boundary.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text
        message: String,
    },

    /// Opening or committing the task's resource boundary failed.
    #[error("resource boundary error: {message}")]
    Resource {
        /// Error text from the provider
        message: String,
    },

    /// Retrying stopped because the run was cancelled.
    #[error("cancelled while retrying")]
    Cancelled,
}

impl TaskError {
    /// Whether the task's code faulted unexpectedly rather than returning an
    /// error.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

/// A failed run: the error plus every result collected before it stopped.
#[derive(Error, Debug, Diagnostic)]
#[error("{error}")]
#[diagnostic(forward(error))]
pub struct RunFailure {
    /// Primary reason the run failed
    pub error: Error,
    /// Partial statistics up to the point of failure
    pub statistics: Statistics,
}

impl RunFailure {
    /// A failure detected before any task started.
    pub(crate) fn before_start(error: Error) -> Self {
        Self {
            error,
            statistics: Statistics::default(),
        }
    }
}
