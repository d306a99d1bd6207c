//! Rendering of run reports and plans for stdout.

use crate::errors::CliError;
use ordo_core::{Error, ExecutionPlan, Statistics};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    success: bool,
    error: Option<String>,
    statistics: &'a Statistics,
}

/// Render the outcome of a run.
pub fn render_run(
    statistics: &Statistics,
    error: Option<&Error>,
    json: bool,
) -> Result<String, CliError> {
    if json {
        let report = RunReport {
            success: error.is_none(),
            error: error.map(ToString::to_string),
            statistics,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(statistics.to_string())
    }
}

/// Render a resolved plan.
pub fn render_plan(plan: &ExecutionPlan, json: bool) -> Result<String, CliError> {
    if json {
        Ok(serde_json::to_string_pretty(plan)?)
    } else {
        Ok(plan.to_string().trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_run_report() {
        let stats = Statistics::default();
        let rendered = render_run(&stats, Some(&Error::Cancelled), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Run cancelled before all tasks were started");
        assert_eq!(value["statistics"]["total"], 0);
    }

    #[test]
    fn test_text_run_report() {
        let rendered = render_run(&Statistics::default(), None, false).unwrap();
        assert!(rendered.starts_with("0 task(s): 0 successful, 0 failed"));
    }

    #[test]
    fn test_plan_rendering() {
        let plan = ExecutionPlan::Parallel(vec![vec!["users".into()], vec!["posts".into()]]);
        assert_eq!(render_plan(&plan, false).unwrap(), "level 0: users\nlevel 1: posts");

        let value: serde_json::Value =
            serde_json::from_str(&render_plan(&plan, true).unwrap()).unwrap();
        assert_eq!(value["mode"], "parallel");
        assert_eq!(value["tasks"][1][0], "posts");
    }
}
