//! Dependency-ordered task orchestration for ordo.
//!
//! Register named [`Task`]s with dependencies and priorities on an
//! [`Orchestrator`], then run them sequentially or level by level in
//! parallel. Each task runs inside its own resource boundary supplied by a
//! [`ResourceProvider`]: committed on success, rolled back on failure or
//! panic. `execute` is retried with quadratic backoff; `validate` never is.
//! Every run produces [`Statistics`], also when it fails.
//!
//! # Example
//!
//! ```ignore
//! use ordo_core::{Orchestrator, RunOptions, Task, TaskCounts};
//!
//! let mut orchestrator = Orchestrator::without_resources();
//! orchestrator.register(Task::new("users", |_, ()| async { Ok(TaskCounts::created(10)) }))?;
//! orchestrator.register(
//!     Task::new("posts", |_, ()| async { Ok(TaskCounts::created(40)) }).depends_on(["users"]),
//! )?;
//!
//! let stats = orchestrator.run(RunOptions::new()).await?;
//! assert_eq!(stats.successful, 2);
//! ```

pub mod config;
pub mod error;
pub mod resource;
pub mod retry;
pub mod stats;
pub mod task;

mod engine;
mod orchestrator;
mod resolver;

pub use config::{OrchestratorConfig, RetrySettings, RunOptions, RunSettings};
pub use error::{BoxError, Error, Result, RunFailure, TaskError};
pub use orchestrator::Orchestrator;
pub use ordo_task_graph::ValidationResult;
pub use resolver::ExecutionPlan;
pub use resource::{NoopProvider, ResourceProvider};
pub use retry::{RetryFailure, RetryPolicy, with_retry};
pub use stats::{Statistics, StatsCollector, TaskResult};
pub use task::{Task, TaskContext, TaskCounts};
pub use tokio_util::sync::CancellationToken;
