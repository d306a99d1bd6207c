mod cli;
mod errors;
mod plan;
mod report;
mod shutdown;
mod tracing;

use crate::cli::{Commands, parse};
use crate::errors::CliError;
use crate::plan::PlanFile;
use crate::report::{render_plan, render_run};
use crate::tracing::TracingConfig;
use ::tracing::Instrument;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(code) => code,
        Err(error) => {
            report_error(&error);
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> miette::Result<ExitCode> {
    let cli = parse();

    crate::tracing::init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        filter: None,
    })?;

    let span = ::tracing::info_span!(
        "ordo",
        correlation_id = %crate::tracing::correlation_id(),
        command = cli.command.name()
    );

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            plan,
            dry_run,
            parallel,
            only,
            timeout_secs,
            json,
        } => {
            execute_run(plan, config, dry_run, parallel, only, timeout_secs, json)
                .instrument(span)
                .await
        }
        Commands::Plan {
            plan,
            parallel,
            json,
        } => span.in_scope(|| execute_plan(&plan, config, parallel, json)),
    }
}

async fn execute_run(
    plan_path: PathBuf,
    config: Option<&Path>,
    dry_run: bool,
    parallel: bool,
    only: Vec<String>,
    timeout_secs: Option<u64>,
    json: bool,
) -> miette::Result<ExitCode> {
    ::tracing::debug!(plan = %plan_path.display(), "Loading plan");
    let plan = PlanFile::load(&plan_path)?.with_settings_file(config)?;

    let mut options = plan.settings.run_options();
    options.dry_run |= dry_run;
    options.parallel |= parallel;
    if !only.is_empty() {
        options = options.with_only(only);
    }
    if let Some(secs) = timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let orchestrator = plan.into_orchestrator()?;
    let cancellation = shutdown::install_signal_handlers();

    match orchestrator.run_with_cancellation(options, cancellation).await {
        Ok(statistics) => {
            emit(&render_run(&statistics, None, json)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            emit(&render_run(&failure.statistics, Some(&failure.error), json)?);
            report_error(&miette::Report::new(CliError::from(failure.error)));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn execute_plan(
    plan_path: &Path,
    config: Option<&Path>,
    parallel: bool,
    json: bool,
) -> miette::Result<ExitCode> {
    let plan = PlanFile::load(plan_path)?.with_settings_file(config)?;
    let mut options = plan.settings.run_options();
    options.parallel |= parallel;
    let orchestrator = plan.into_orchestrator()?;

    let validation = orchestrator.validate();
    if !validation.is_valid {
        return Err(CliError::InvalidPlan {
            problems: validation.errors.iter().map(ToString::to_string).collect(),
        }
        .into());
    }

    let resolved = orchestrator.plan(&options).map_err(CliError::from)?;
    emit(&render_plan(&resolved, json)?);
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::print_stdout)]
fn emit(text: &str) {
    println!("{text}");
}

#[allow(clippy::print_stderr)]
fn report_error(error: &miette::Report) {
    eprintln!("{error:?}");
}
