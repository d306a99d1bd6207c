//! Errors surfaced by the ordo command line.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-level error
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The plan file could not be read.
    #[error("Failed to read plan file {}", .path.display())]
    #[diagnostic(
        code(ordo::cli::plan_read),
        help("check that the path exists and is readable")
    )]
    PlanRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The plan file is not valid TOML or has unknown keys.
    #[error("Invalid plan file {}: {message}", .path.display())]
    #[diagnostic(
        code(ordo::cli::plan_parse),
        help(
            "a plan has an optional [settings] table and [[task]] entries with a name and a command"
        )
    )]
    PlanParse { path: PathBuf, message: String },

    /// The task graph has structural problems.
    #[error("Plan has {} problem(s):\n{}", .problems.len(), .problems.join("\n"))]
    #[diagnostic(code(ordo::cli::invalid_plan))]
    InvalidPlan { problems: Vec<String> },

    /// The report could not be serialized.
    #[error("Failed to render report: {0}")]
    #[diagnostic(code(ordo::cli::render))]
    Render(#[from] serde_json::Error),

    /// Error from the orchestrator.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Orchestrator(#[from] ordo_core::Error),
}

impl CliError {
    pub fn plan_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PlanParse {
            path: path.into(),
            message: message.into(),
        }
    }
}
