//! Task graph DAG algorithms and dependency resolution for ordo.
//!
//! This crate provides a directed acyclic graph (DAG) implementation for
//! task dependency resolution and execution ordering using petgraph.
//!
//! # Key Types
//!
//! - [`TaskGraph`]: The main graph structure for building and querying task dependencies
//! - [`TaskNodeData`]: Trait that task types must implement to be stored in the graph
//! - [`GraphNode`]: A node in the graph containing the task name and data
//!
//! # Example
//!
//! ```ignore
//! use ordo_task_graph::{TaskGraph, TaskNodeData};
//!
//! #[derive(Clone)]
//! struct MyTask {
//!     depends_on: Vec<String>,
//!     priority: i32,
//! }
//!
//! impl TaskNodeData for MyTask {
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.depends_on.iter().map(String::as_str)
//!     }
//!
//!     fn priority(&self) -> i32 {
//!         self.priority
//!     }
//! }
//!
//! let mut graph = TaskGraph::new();
//! graph.add_task("users", MyTask { depends_on: vec![], priority: 1 })?;
//! graph.add_task("posts", MyTask { depends_on: vec!["users".into()], priority: 2 })?;
//! graph.add_dependency_edges()?;
//!
//! let sorted = graph.topological_sort()?;
//! let levels = graph.get_parallel_groups()?;
//! ```

mod error;
mod graph;
mod traversal;
mod validation;

pub use error::{Error, Result};
pub use graph::{GraphNode, TaskGraph, compute_transitive_closure};
pub use traversal::{ParallelGroups, TopologicalOrder};
pub use validation::ValidationResult;

/// Trait for task data that can be stored in the task graph.
///
/// Implement this trait for your task type to enable it to be stored
/// in a [`TaskGraph`] and participate in dependency resolution.
pub trait TaskNodeData: Clone {
    /// Returns the names of tasks this task depends on.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;

    /// Ordering hint among tasks that are not ordered by dependencies.
    ///
    /// Lower values run earlier. Never overrides a dependency edge.
    fn priority(&self) -> i32 {
        0
    }
}
