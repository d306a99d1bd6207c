//! Plan files: shell-command tasks described in TOML.
//!
//! ```toml
//! [settings.retry]
//! max_attempts = 2
//!
//! [[task]]
//! name = "users"
//! command = "psql -f seeds/users.sql"
//!
//! [[task]]
//! name = "posts"
//! depends_on = ["users"]
//! command = "./seed-posts.sh"
//! validate = "./check-posts.sh"
//! ```
//!
//! Commands run through `sh -c` with `ORDO_TASK` and `ORDO_ATTEMPT` set.
//! Lines of the form `created=N`, `updated=N` or `skipped=N` on stdout are
//! summed into the task's counters.

use crate::errors::CliError;
use ordo_core::{
    BoxError, NoopProvider, Orchestrator, OrchestratorConfig, Task, TaskContext, TaskCounts,
};
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

/// A parsed plan file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    /// Retry policy and run defaults
    #[serde(default)]
    pub settings: OrchestratorConfig,
    /// Tasks in registration order
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskSpec>,
}

/// One `[[task]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    pub validate: Option<String>,
    #[serde(default)]
    pub continue_on_error: bool,
    pub max_attempts: Option<u32>,
}

impl PlanFile {
    /// Parse plan text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, CliError> {
        toml::from_str(text).map_err(|e| CliError::plan_parse(path, e.to_string()))
    }

    /// Read and parse a plan file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::PlanRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Replace the plan's `[settings]` with a standalone settings file.
    pub fn with_settings_file(mut self, path: Option<&Path>) -> Result<Self, CliError> {
        if let Some(path) = path {
            tracing::debug!(settings = %path.display(), "Loading settings file");
            self.settings = OrchestratorConfig::load(path)?;
        }
        Ok(self)
    }

    /// Register every task of the plan on a fresh orchestrator.
    pub fn into_orchestrator(self) -> Result<Orchestrator<NoopProvider>, CliError> {
        let mut orchestrator = Orchestrator::from_config(NoopProvider, &self.settings);
        for spec in self.tasks {
            orchestrator.register(spec.into_task())?;
        }
        Ok(orchestrator)
    }
}

impl TaskSpec {
    fn into_task(self) -> Task<()> {
        let command = self.command;
        let mut task = Task::new(self.name, move |ctx: TaskContext, (): ()| {
            let command = command.clone();
            async move {
                let stdout = run_shell(&command, &ctx).await?;
                Ok(parse_counts(&stdout))
            }
        })
        .depends_on(self.depends_on)
        .with_priority(self.priority)
        .continue_on_error(self.continue_on_error);

        if let Some(max_attempts) = self.max_attempts {
            task = task.with_max_attempts(max_attempts);
        }
        if let Some(check) = self.validate {
            task = task.with_validation(move |ctx: TaskContext, (): ()| {
                let check = check.clone();
                async move { run_shell(&check, &ctx).await.map(|_| ()) }
            });
        }
        task
    }
}

/// Run `command` through `sh -c`, returning stdout on a zero exit status.
async fn run_shell(command: &str, ctx: &TaskContext) -> Result<String, BoxError> {
    tracing::debug!(
        task = %ctx.task_name(),
        attempt = ctx.attempt(),
        %command,
        "Running shell command"
    );

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("ORDO_TASK", ctx.task_name())
        .env("ORDO_ATTEMPT", ctx.attempt().to_string())
        .output()
        .await?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim().lines().last().unwrap_or_default();
    let message = match output.status.code() {
        Some(code) if detail.is_empty() => format!("command exited with status {code}"),
        Some(code) => format!("command exited with status {code}: {detail}"),
        None => "command terminated by signal".to_string(),
    };
    Err(message.into())
}

/// Sum `created=`, `updated=` and `skipped=` lines from command output.
fn parse_counts(stdout: &str) -> TaskCounts {
    let mut counts = TaskCounts::default();
    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<u64>() else {
            continue;
        };
        match key.trim() {
            "created" => counts.created += value,
            "updated" => counts.updated += value,
            "skipped" => counts.skipped += value,
            _ => {}
        }
    }
    counts
}
