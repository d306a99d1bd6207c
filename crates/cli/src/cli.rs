use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ordo")]
#[command(about = "Run dependency-ordered task plans with retries and rollback")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(
        long,
        global = true,
        help = "Settings file used instead of the plan's [settings] table"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Execute a plan file")]
    Run {
        #[arg(help = "Path to the plan file")]
        plan: PathBuf,
        #[arg(long, help = "Show what would run without executing anything")]
        dry_run: bool,
        #[arg(long, help = "Run independent tasks concurrently, level by level")]
        parallel: bool,
        #[arg(
            long,
            value_delimiter = ',',
            help = "Only run these tasks (and their dependencies)"
        )]
        only: Vec<String>,
        #[arg(long, help = "Stop starting new tasks after this many seconds")]
        timeout_secs: Option<u64>,
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    #[command(about = "Validate a plan file and print its execution order")]
    Plan {
        #[arg(help = "Path to the plan file")]
        plan: PathBuf,
        #[arg(long, help = "Show parallel levels instead of a flat order")]
        parallel: bool,
        #[arg(long, help = "Print the plan as JSON")]
        json: bool,
    },
}

impl Commands {
    /// Subcommand name for log context.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Plan { .. } => "plan",
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
