//! Property-based tests for task graph invariants.
//!
//! These tests verify the behavioral contracts of the task graph:
//! - Topological sort respects all dependencies and the priority tie-break
//! - Parallel levels are minimal and only contain independent tasks
//! - Cycle detection is accurate and reports a real cycle

use ordo_task_graph::{Error, TaskGraph, TaskNodeData};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

// =============================================================================
// Test Task Type
// =============================================================================

#[derive(Clone, Debug)]
struct PropTask {
    deps: Vec<String>,
    priority: i32,
}

impl TaskNodeData for PropTask {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.deps.iter().map(String::as_str)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// (name, dependencies, priority)
type TaskList = Vec<(String, Vec<String>, i32)>;

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn task_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,10}".prop_map(String::from)
}

/// Generate a DAG whose tasks only depend on tasks registered before them.
fn dag_strategy(min_tasks: usize, max_tasks: usize) -> impl Strategy<Value = TaskList> {
    (min_tasks..=max_tasks).prop_flat_map(|task_count| {
        proptest::collection::vec(task_name_strategy(), task_count).prop_flat_map(move |names| {
            let unique_names: Vec<String> = names
                .into_iter()
                .enumerate()
                .map(|(i, name)| format!("{name}_{i}"))
                .collect();

            let task_strategies: Vec<_> = (0..task_count)
                .map(|i| {
                    let deps = if i == 0 {
                        Just(vec![]).boxed()
                    } else {
                        let earlier_names: Vec<String> = unique_names[..i].to_vec();
                        proptest::collection::vec(
                            proptest::sample::select(earlier_names),
                            0..=i.min(3),
                        )
                        .prop_map(|deps| {
                            let mut seen = HashSet::new();
                            deps.into_iter()
                                .filter(|d| seen.insert(d.clone()))
                                .collect::<Vec<String>>()
                        })
                        .boxed()
                    };
                    (deps, -3..=3_i32)
                })
                .collect();

            let names_clone = unique_names.clone();
            task_strategies.prop_map(move |all| {
                names_clone
                    .iter()
                    .cloned()
                    .zip(all)
                    .map(|(name, (deps, priority))| (name, deps, priority))
                    .collect::<Vec<_>>()
            })
        })
    })
}

/// Generate a ring of tasks where every task depends on its predecessor and
/// the first depends on the last.
fn cyclic_graph_strategy() -> impl Strategy<Value = TaskList> {
    (2..=6_usize).prop_flat_map(|task_count| {
        proptest::collection::vec(task_name_strategy(), task_count).prop_map(move |names| {
            let unique: Vec<String> = names
                .into_iter()
                .enumerate()
                .map(|(i, name)| format!("{name}_{i}"))
                .collect();

            (0..task_count)
                .map(|i| {
                    let dep = if i == 0 {
                        unique[task_count - 1].clone()
                    } else {
                        unique[i - 1].clone()
                    };
                    (unique[i].clone(), vec![dep], 0)
                })
                .collect()
        })
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

fn build_graph(tasks: &TaskList) -> Result<TaskGraph<PropTask>, Error> {
    let mut graph = TaskGraph::new();

    for (name, deps, priority) in tasks {
        graph.add_task(
            name,
            PropTask {
                deps: deps.clone(),
                priority: *priority,
            },
        )?;
    }

    graph.add_dependency_edges()?;
    Ok(graph)
}

// =============================================================================
// Property Tests: Topological Sort
// =============================================================================

proptest! {
    /// For every task A that depends on task B, B appears before A.
    #[test]
    fn topological_sort_respects_dependencies(tasks in dag_strategy(1, 15)) {
        let graph = build_graph(&tasks).expect("Graph should build successfully");
        let sorted = graph.topological_sort().expect("Sort should succeed for DAG");

        prop_assert_eq!(sorted.len(), tasks.len());

        let positions: HashMap<String, usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), i))
            .collect();

        for (name, deps, _) in &tasks {
            let task_pos = positions[name];
            for dep in deps {
                prop_assert!(
                    positions[dep] < task_pos,
                    "Dependency '{}' should come before '{}'",
                    dep, name
                );
            }
        }
    }

    /// Each emitted task is the (priority, registration) minimum of the tasks
    /// that were ready at that step.
    #[test]
    fn topological_sort_picks_lowest_ready_key(tasks in dag_strategy(1, 15)) {
        let graph = build_graph(&tasks).expect("Graph should build successfully");
        let sorted = graph.topological_sort().expect("Sort should succeed");

        let keys: HashMap<&str, (i32, usize)> = tasks
            .iter()
            .enumerate()
            .map(|(i, (name, _, priority))| (name.as_str(), (*priority, i)))
            .collect();
        let mut done: HashSet<&str> = HashSet::new();

        for node in &sorted {
            let best_ready = tasks
                .iter()
                .filter(|(name, deps, _)| {
                    !done.contains(name.as_str()) && deps.iter().all(|d| done.contains(d.as_str()))
                })
                .map(|(name, _, _)| keys[name.as_str()])
                .min()
                .expect("at least one task is ready");

            prop_assert_eq!(keys[node.name.as_str()], best_ready);
            done.insert(node.name.as_str());
        }
    }

    /// Resolving the same registration twice yields the same order.
    #[test]
    fn topological_sort_is_deterministic(tasks in dag_strategy(2, 10)) {
        let first = build_graph(&tasks).expect("Graph 1 should build");
        let second = build_graph(&tasks).expect("Graph 2 should build");

        let names1: Vec<String> = first
            .topological_sort()
            .expect("sort")
            .into_iter()
            .map(|n| n.name)
            .collect();
        let names2: Vec<String> = second
            .topological_sort()
            .expect("sort")
            .into_iter()
            .map(|n| n.name)
            .collect();

        prop_assert_eq!(names1, names2);
    }
}

// =============================================================================
// Property Tests: Parallel Groups
// =============================================================================

proptest! {
    /// Every task lands exactly one level above its deepest dependency.
    #[test]
    fn parallel_levels_are_minimal(tasks in dag_strategy(1, 15)) {
        let graph = build_graph(&tasks).expect("Graph should build successfully");
        let groups = graph.get_parallel_groups().expect("Parallel groups should succeed");

        let mut level_of: HashMap<String, usize> = HashMap::new();
        for (idx, group) in groups.iter().enumerate() {
            for node in group {
                prop_assert!(
                    level_of.insert(node.name.clone(), idx).is_none(),
                    "Task '{}' appears in more than one level",
                    node.name
                );
            }
        }
        prop_assert_eq!(level_of.len(), tasks.len());

        for (name, deps, _) in &tasks {
            let expected = deps.iter().map(|d| level_of[d] + 1).max().unwrap_or(0);
            prop_assert_eq!(level_of[name], expected, "wrong level for '{}'", name);
        }
    }

    /// Levels list their members by priority, then registration order.
    #[test]
    fn parallel_levels_are_sorted_by_tie_break(tasks in dag_strategy(2, 15)) {
        let graph = build_graph(&tasks).expect("Graph should build successfully");
        let groups = graph.get_parallel_groups().expect("Parallel groups should succeed");

        for group in &groups {
            let keys: Vec<(i32, usize)> = group.iter().map(|n| (n.priority, n.order)).collect();
            let mut sorted = keys.clone();
            sorted.sort_unstable();
            prop_assert_eq!(keys, sorted);
        }
    }
}

// =============================================================================
// Property Tests: Cycle Detection
// =============================================================================

proptest! {
    #[test]
    fn cycle_detection_identifies_dags(tasks in dag_strategy(1, 15)) {
        let graph = build_graph(&tasks).expect("Graph should build successfully");

        prop_assert!(graph.find_cycle().is_none());
        prop_assert!(graph.validate().is_valid);
    }

    /// The reported cycle is a closed walk along real dependency edges.
    #[test]
    fn cycle_detection_reports_real_cycle(tasks in cyclic_graph_strategy()) {
        let graph = build_graph(&tasks).expect("ring references only registered tasks");

        prop_assert!(graph.find_cycle().is_some());

        let deps: HashMap<&str, &Vec<String>> =
            tasks.iter().map(|(name, deps, _)| (name.as_str(), deps)).collect();

        match graph.topological_sort() {
            Err(Error::CycleDetected { cycle }) => {
                prop_assert!(cycle.len() >= 2);
                prop_assert_eq!(cycle.first(), cycle.last());
                for pair in cycle.windows(2) {
                    prop_assert!(
                        deps[pair[0].as_str()].contains(&pair[1]),
                        "'{}' does not depend on '{}'",
                        pair[0], pair[1]
                    );
                }
            }
            other => {
                prop_assert!(false, "expected cycle error, got {:?}", other.map(|v| v.len()));
            }
        }
    }
}

// =============================================================================
// Additional Property Tests
// =============================================================================

proptest! {
    #[test]
    fn duplicate_task_names_rejected(name in task_name_strategy()) {
        let mut graph = TaskGraph::new();

        graph.add_task(&name, PropTask { deps: vec![], priority: 0 }).expect("First add");
        let second = graph.add_task(&name, PropTask { deps: vec![], priority: 0 });

        prop_assert_eq!(second, Err(Error::DuplicateTask { name: name.clone() }));
        prop_assert_eq!(graph.task_count(), 1);
    }

    #[test]
    fn single_task_graph_works(name in task_name_strategy()) {
        let mut graph = TaskGraph::new();
        graph.add_task(&name, PropTask { deps: vec![], priority: 0 }).expect("Add should succeed");
        graph.add_dependency_edges().expect("Edges should succeed");

        let sorted = graph.topological_sort().expect("Sort should succeed");
        prop_assert_eq!(sorted.len(), 1);
        prop_assert_eq!(&sorted[0].name, &name);

        let groups = graph.get_parallel_groups().expect("Groups should succeed");
        prop_assert_eq!(groups.len(), 1);
    }
}
