//! Error types for task graph operations.

use thiserror::Error;

/// Result type for task graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during task graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Two tasks were added under the same name.
    #[error("Task '{name}' is registered more than once")]
    DuplicateTask {
        /// The duplicated task name.
        name: String,
    },

    /// One or more tasks depend on tasks that don't exist.
    #[error("Missing dependencies: {}", describe_missing(.missing))]
    MissingDependencies {
        /// List of (task, missing_dependency) pairs, in registration order.
        missing: Vec<(String, String)>,
    },

    /// A dependency cycle was detected in the graph.
    #[error("Cycle detected in task graph: {}", .cycle.join(" -> "))]
    CycleDetected {
        /// Task names along the cycle; the first name is repeated at the end.
        cycle: Vec<String>,
    },
}

fn describe_missing(missing: &[(String, String)]) -> String {
    missing
        .iter()
        .map(|(task, dep)| format!("Task '{task}' depends on missing task '{dep}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
