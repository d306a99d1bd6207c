//! Validation utilities for task graphs.
//!
//! This module provides types and functions for validating task graph structure.

use crate::{Error, TaskGraph, TaskNodeData};

/// Result of graph validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the graph is valid (no cycles, no missing dependencies).
    pub is_valid: bool,
    /// List of validation errors, if any.
    pub errors: Vec<Error>,
}

impl ValidationResult {
    /// Create a valid result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    /// Create an invalid result with errors.
    #[must_use]
    pub fn invalid(errors: Vec<Error>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

impl<T: TaskNodeData> TaskGraph<T> {
    /// Validate the graph structure.
    ///
    /// Checks for:
    /// - Dependencies on tasks that are not in the graph
    /// - Cycles among the edges added so far
    ///
    /// Unlike the ordering methods this does not stop at the first problem,
    /// so tooling can present every issue in one pass.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        let missing: Vec<(String, String)> = self
            .iter_nodes()
            .flat_map(|node| {
                node.task
                    .dependency_names()
                    .filter(|dep| !self.contains_task(dep))
                    .map(|dep| (node.name.clone(), dep.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect();
        if !missing.is_empty() {
            errors.push(Error::MissingDependencies { missing });
        }

        if let Some(cycle) = self.find_cycle() {
            errors.push(Error::CycleDetected { cycle });
        }

        if errors.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(errors)
        }
    }
}
