//! CLI command definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use qaops_tools::DEFAULT_MEMORY_FILE;

pub mod memory;
pub mod providers;
pub mod triage;

/// QAOps - CI failure triage
#[derive(Parser)]
#[command(name = "qaops")]
#[command(version, about = "QAOps - CI failure triage pipeline")]
#[command(long_about = r#"
QAOps extracts failing tests from CI logs, explains the likely root cause
with an LLM (or a mock analysis when none is configured), files a ticket and
records how often each failure recurs.

COMMANDS:
  triage     → Run the pipeline on CI logs and print the result JSON
  memory     → Show or clear recurrence counts
  providers  → Report which analysis backend would be used

EXIT CODES:
  0 - Success
  1 - Pipeline error
  2 - Invalid arguments, configuration or I/O error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "QAOPS_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Memory bank file holding recurrence counts
    #[arg(long, global = true, env = "QAOPS_MEMORY_FILE", default_value = DEFAULT_MEMORY_FILE)]
    pub memory_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Triage CI logs
    Triage(triage::TriageArgs),

    /// Inspect or reset the memory bank
    Memory(memory::MemoryArgs),

    /// Show analysis backend configuration
    Providers(providers::ProvidersArgs),
}
