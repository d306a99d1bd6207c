//! Turns registered tasks into an execution plan.

use crate::config::RunOptions;
use crate::error::{Error, Result};
use crate::task::Task;
use ordo_task_graph::{TaskGraph, compute_transitive_closure};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Resolved execution order, by task name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "tasks", rename_all = "snake_case")]
pub enum ExecutionPlan {
    /// One task at a time, in this order
    Sequential(Vec<String>),
    /// Level by level; tasks inside a level may run concurrently
    Parallel(Vec<Vec<String>>),
}

impl ExecutionPlan {
    /// Number of tasks in the plan.
    #[must_use]
    pub fn task_count(&self) -> usize {
        match self {
            Self::Sequential(order) => order.len(),
            Self::Parallel(levels) => levels.iter().map(Vec::len).sum(),
        }
    }

    /// Task names in execution order, flattening levels.
    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        match self {
            Self::Sequential(order) => order.iter().map(String::as_str).collect(),
            Self::Parallel(levels) => levels.iter().flatten().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential(order) => {
                for (idx, name) in order.iter().enumerate() {
                    writeln!(f, "{:>3}. {name}", idx + 1)?;
                }
            }
            Self::Parallel(levels) => {
                for (idx, level) in levels.iter().enumerate() {
                    writeln!(f, "level {idx}: {}", level.join(", "))?;
                }
            }
        }
        Ok(())
    }
}

/// Resolved plan that still carries the task values.
pub(crate) enum Resolved<H> {
    Sequential(Vec<Task<H>>),
    Parallel(Vec<Vec<Task<H>>>),
}

impl<H> Resolved<H> {
    pub(crate) fn plan(&self) -> ExecutionPlan {
        match self {
            Self::Sequential(order) => {
                ExecutionPlan::Sequential(order.iter().map(|t| t.name().to_string()).collect())
            }
            Self::Parallel(levels) => ExecutionPlan::Parallel(
                levels
                    .iter()
                    .map(|level| level.iter().map(|t| t.name().to_string()).collect())
                    .collect(),
            ),
        }
    }
}

/// Build the dependency graph for the tasks selected by `options.only`.
///
/// Missing dependencies are reported before cycles.
pub(crate) fn build_graph<H>(
    tasks: &[Task<H>],
    options: &RunOptions,
) -> Result<TaskGraph<Task<H>>> {
    let selected = match &options.only {
        None => None,
        Some(only) => {
            let by_name: HashMap<&str, &Task<H>> =
                tasks.iter().map(|t| (t.name(), t)).collect();
            if let Some(unknown) = only.iter().find(|name| !by_name.contains_key(name.as_str())) {
                return Err(Error::UnknownTask {
                    name: unknown.clone(),
                });
            }
            Some(compute_transitive_closure(
                only.iter().map(String::as_str),
                |name| by_name.get(name).map(|t| t.dependencies()),
            ))
        }
    };

    let mut graph = TaskGraph::new();
    for task in tasks {
        if selected
            .as_ref()
            .is_some_and(|keep| !keep.contains(task.name()))
        {
            continue;
        }
        graph.add_task(task.name(), task.clone())?;
    }
    graph.add_dependency_edges()?;

    tracing::debug!(
        tasks = graph.task_count(),
        registered = tasks.len(),
        "Built task graph"
    );
    Ok(graph)
}

/// Resolve the registered tasks into sequential order or parallel levels.
pub(crate) fn resolve<H>(tasks: &[Task<H>], options: &RunOptions) -> Result<Resolved<H>> {
    let graph = build_graph(tasks, options)?;

    if options.parallel {
        let levels = graph
            .get_parallel_groups()?
            .into_iter()
            .map(|level| level.into_iter().map(|node| node.task).collect())
            .collect();
        Ok(Resolved::Parallel(levels))
    } else {
        let order = graph
            .topological_sort()?
            .into_iter()
            .map(|node| node.task)
            .collect();
        Ok(Resolved::Sequential(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskCounts;
    use ordo_task_graph::Error as GraphError;

    fn task(name: &str, deps: &[&str], priority: i32) -> Task<()> {
        Task::new(name, |_, ()| async { Ok(TaskCounts::default()) })
            .depends_on(deps.iter().copied())
            .with_priority(priority)
    }

    #[test]
    fn test_sequential_priority_tie_break() {
        let tasks = vec![task("a", &[], 5), task("b", &[], 1), task("c", &["b"], 0)];
        let plan = resolve(&tasks, &RunOptions::new()).unwrap().plan();
        assert_eq!(
            plan,
            ExecutionPlan::Sequential(vec!["b".into(), "c".into(), "a".into()])
        );
    }

    #[test]
    fn test_parallel_levels() {
        let tasks = vec![
            task("users", &[], 0),
            task("categories", &[], 0),
            task("posts", &["users", "categories"], 0),
        ];
        let plan = resolve(&tasks, &RunOptions::new().with_parallel(true))
            .unwrap()
            .plan();
        assert_eq!(
            plan,
            ExecutionPlan::Parallel(vec![
                vec!["users".into(), "categories".into()],
                vec!["posts".into()],
            ])
        );
        assert_eq!(plan.task_count(), 3);
    }

    #[test]
    fn test_only_includes_transitive_dependencies() {
        let tasks = vec![
            task("users", &[], 0),
            task("tags", &[], 0),
            task("posts", &["users"], 0),
            task("comments", &["posts"], 0),
        ];
        let plan = resolve(&tasks, &RunOptions::new().with_only(["comments"]))
            .unwrap()
            .plan();
        assert_eq!(plan.task_names(), ["users", "posts", "comments"]);
    }

    #[test]
    fn test_only_unknown_task() {
        let tasks = vec![task("users", &[], 0)];
        let err = resolve(&tasks, &RunOptions::new().with_only(["ghost"])).err();
        assert!(matches!(err, Some(Error::UnknownTask { name }) if name == "ghost"));
    }

    #[test]
    fn test_missing_dependency_reported_before_cycle() {
        let tasks = vec![task("a", &["b", "ghost"], 0), task("b", &["a"], 0)];
        let err = resolve(&tasks, &RunOptions::new()).err();
        assert!(matches!(
            err,
            Some(Error::Graph(GraphError::MissingDependencies { .. }))
        ));
    }

    #[test]
    fn test_cycle_is_reported() {
        let tasks = vec![task("a", &["c"], 0), task("b", &["a"], 0), task("c", &["b"], 0)];
        let err = resolve(&tasks, &RunOptions::new()).err();
        match err {
            Some(Error::Graph(GraphError::CycleDetected { cycle })) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_display() {
        let plan = ExecutionPlan::Parallel(vec![vec!["a".into(), "b".into()], vec!["c".into()]]);
        assert_eq!(plan.to_string(), "level 0: a, b\nlevel 1: c\n");

        let plan = ExecutionPlan::Sequential(vec!["a".into(), "b".into()]);
        assert_eq!(plan.to_string(), "  1. a\n  2. b\n");
    }
}
