//! Traversal algorithms and types for task graphs.
//!
//! This module provides types and utilities for traversing task graphs
//! in various orders.

use crate::GraphNode;

/// A topologically sorted sequence of task nodes.
///
/// Every task appears after all of its dependencies. Among tasks that are
/// free to run, lower priority comes first, then earlier registration.
pub type TopologicalOrder<T> = Vec<GraphNode<T>>;

/// Groups of tasks that can execute in parallel.
///
/// Each inner vector contains tasks that have no dependencies on each other
/// and can safely execute concurrently. The outer vector is ordered by
/// dependency level - all tasks in group N must complete before tasks
/// in group N+1 can start.
pub type ParallelGroups<T> = Vec<Vec<GraphNode<T>>>;

/// Sort key used for every tie-break in the graph: priority, then
/// registration order.
pub(crate) fn tie_break_key<T>(node: &GraphNode<T>) -> (i32, usize) {
    (node.priority, node.order)
}
