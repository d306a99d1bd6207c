//! Task graph builder using petgraph.
//!
//! This module builds directed acyclic graphs (DAGs) from task definitions
//! to handle dependencies and determine execution order.

use crate::traversal::tie_break_key;
use crate::{Error, ParallelGroups, Result, TaskNodeData, TopologicalOrder};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::IntoNodeReferences;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

/// A node in the task graph.
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    /// Name of the task.
    pub name: String,
    /// The task data.
    pub task: T,
    /// Priority copied from the task when it was added.
    pub priority: i32,
    /// Position in registration order (0-based).
    pub order: usize,
}

/// DFS marks used by cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Task graph for dependency resolution and execution ordering.
///
/// This is a generic graph that can hold any task type implementing [`TaskNodeData`].
/// Edges point from a dependency to the task that depends on it.
pub struct TaskGraph<T: TaskNodeData> {
    /// The directed graph of tasks.
    graph: DiGraph<GraphNode<T>, ()>,
    /// Map from task names to node indices.
    name_to_node: HashMap<String, NodeIndex>,
}

impl<T: TaskNodeData> TaskGraph<T> {
    /// Create a new empty task graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_node: HashMap::new(),
        }
    }

    /// Add a single task to the graph.
    ///
    /// Tasks are numbered in the order they are added; that number is the
    /// final tie-break for ordering.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if a task with the same name exists.
    pub fn add_task(&mut self, name: &str, task: T) -> Result<NodeIndex> {
        if self.name_to_node.contains_key(name) {
            return Err(Error::DuplicateTask {
                name: name.to_string(),
            });
        }

        let node = GraphNode {
            name: name.to_string(),
            priority: task.priority(),
            order: self.graph.node_count(),
            task,
        };

        let node_index = self.graph.add_node(node);
        self.name_to_node.insert(name.to_string(), node_index);
        debug!("Added task node '{}'", name);

        Ok(node_index)
    }

    /// Add dependency edges after all tasks have been added.
    ///
    /// Every dangling reference is collected before failing, so callers see
    /// the full list at once. Edges that do resolve are still added, which
    /// keeps [`TaskGraph::validate`] able to report cycles alongside missing
    /// dependencies. Repeated dependency names produce a single edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependencies`] if any task depends on a
    /// non-existent task.
    pub fn add_dependency_edges(&mut self) -> Result<()> {
        let mut missing_deps = Vec::new();
        let mut edges_to_add = Vec::new();

        for (node_index, node) in self.graph.node_references() {
            for dep_name in node.task.dependency_names() {
                if let Some(&dep_node_index) = self.name_to_node.get(dep_name) {
                    edges_to_add.push((dep_node_index, node_index));
                } else {
                    missing_deps.push((node.name.clone(), dep_name.to_string()));
                }
            }
        }

        for (from, to) in edges_to_add {
            self.graph.update_edge(from, to, ());
        }

        if missing_deps.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingDependencies {
                missing: missing_deps,
            })
        }
    }

    /// Find one dependency cycle, if any.
    ///
    /// Walks the graph depth-first along dependency edges, marking nodes
    /// unvisited / in-progress / done. Reaching an in-progress node closes a
    /// cycle; the returned path starts and ends with the same task name and
    /// reads as "depends on" from left to right.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
        let mut path = Vec::new();

        for start in self.graph.node_indices() {
            if marks[start.index()] == Mark::Unvisited
                && let Some(cycle) = self.visit(start, &mut marks, &mut path)
            {
                return Some(cycle);
            }
        }

        None
    }

    fn visit(
        &self,
        node: NodeIndex,
        marks: &mut [Mark],
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<String>> {
        marks[node.index()] = Mark::InProgress;
        path.push(node);

        for dep in self.dependency_indices(node) {
            match marks[dep.index()] {
                Mark::InProgress => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&n| self.graph[n].name.clone())
                        .collect();
                    cycle.push(self.graph[dep].name.clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = self.visit(dep, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node.index()] = Mark::Done;
        None
    }

    /// Direct dependencies of a node, in registration order.
    fn dependency_indices(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    fn cycle_error(&self) -> Error {
        Error::CycleDetected {
            cycle: self.find_cycle().unwrap_or_default(),
        }
    }

    /// Get topologically sorted list of tasks.
    ///
    /// Among tasks whose dependencies are satisfied, the one with the lowest
    /// priority is emitted first; equal priorities fall back to registration
    /// order. The result is identical for identical registrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleDetected`] if the graph contains cycles.
    pub fn topological_sort(&self) -> Result<TopologicalOrder<T>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(Error::CycleDetected { cycle });
        }

        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.dependency_indices(idx).len())
            .collect();

        let mut ready = BinaryHeap::new();
        for (idx, node) in self.graph.node_references() {
            if in_degree[idx.index()] == 0 {
                ready.push(Reverse((tie_break_key(node), idx)));
            }
        }

        let mut sorted = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, idx))) = ready.pop() {
            sorted.push(self.graph[idx].clone());

            let mut dependents: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            dependents.sort_unstable();
            dependents.dedup();

            for dependent in dependents {
                let remaining = &mut in_degree[dependent.index()];
                *remaining -= 1;
                if *remaining == 0 {
                    ready.push(Reverse((tie_break_key(&self.graph[dependent]), dependent)));
                }
            }
        }

        if sorted.len() != self.graph.node_count() {
            return Err(self.cycle_error());
        }

        Ok(sorted)
    }

    /// Get all tasks that can run in parallel (no dependencies between them).
    ///
    /// Returns a vector of parallel groups, where each group contains tasks
    /// that can execute concurrently. A task's group index is one more than
    /// the highest group index among its dependencies. Inside a group, tasks
    /// are listed by priority and then registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn get_parallel_groups(&self) -> Result<ParallelGroups<T>> {
        let sorted = self.topological_sort()?;

        if sorted.is_empty() {
            return Ok(vec![]);
        }

        let mut groups: ParallelGroups<T> = vec![];
        let mut processed: HashMap<String, usize> = HashMap::new();

        for task in sorted {
            let level = task
                .task
                .dependency_names()
                .filter_map(|dep| processed.get(dep))
                .map(|dep_level| dep_level + 1)
                .max()
                .unwrap_or(0);

            if level >= groups.len() {
                groups.resize(level + 1, vec![]);
            }
            processed.insert(task.name.clone(), level);
            groups[level].push(task);
        }

        for group in &mut groups {
            group.sort_by_key(tie_break_key);
        }

        Ok(groups)
    }

    /// Get the number of tasks in the graph.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if a task exists in the graph.
    #[must_use]
    pub fn contains_task(&self, name: &str) -> bool {
        self.name_to_node.contains_key(name)
    }

    /// Iterate over all nodes in registration order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode<T>> {
        self.graph.node_weights()
    }
}

impl<T: TaskNodeData> Default for TaskGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the transitive closure of dependencies from an initial set.
///
/// Given a set of starting nodes and a function to retrieve dependencies,
/// returns all nodes reachable by following dependency edges, including the
/// starting nodes themselves.
///
/// # Example
///
/// ```ignore
/// use ordo_task_graph::compute_transitive_closure;
/// use std::collections::HashMap;
///
/// let deps: HashMap<&str, Vec<String>> = [
///     ("users", vec![]),
///     ("posts", vec!["users".to_string()]),
///     ("comments", vec!["posts".to_string()]),
/// ].into_iter().collect();
///
/// let closure = compute_transitive_closure(
///     ["comments"],
///     |name| deps.get(name).map(|v| v.as_slice()),
/// );
/// // closure contains: {"comments", "posts", "users"}
/// ```
#[must_use]
pub fn compute_transitive_closure<'a>(
    initial: impl IntoIterator<Item = &'a str>,
    get_deps: impl Fn(&str) -> Option<&'a [String]>,
) -> HashSet<String> {
    let mut all = HashSet::new();
    let mut frontier: Vec<&str> = Vec::new();

    for name in initial {
        if all.insert(name.to_string()) {
            frontier.push(name);
        }
    }

    while let Some(task_id) = frontier.pop() {
        if let Some(deps) = get_deps(task_id) {
            for dep in deps {
                if all.insert(dep.clone()) {
                    frontier.push(dep.as_str());
                }
            }
        }
    }

    all
}
