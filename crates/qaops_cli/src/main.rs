//! QAOps CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Pipeline error (the result JSON is still printed)
//! - 2: Invalid arguments, configuration or I/O error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, LogFormat};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const PIPELINE_ERROR: u8 = 1;
    pub const INVALID_INPUT: u8 = 2;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Triage(args) => commands::triage::execute(args, &cli.memory_file).await,
        Commands::Memory(args) => commands::memory::execute(args, &cli.memory_file),
        Commands::Providers(args) => commands::providers::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let directive = if cli.verbose {
        "qaops=debug"
    } else if cli.quiet {
        "qaops=warn"
    } else {
        "qaops=info"
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(directive.parse()?)
        .add_directive("warn".parse()?);

    let (text, json) = match cli.log_format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .try_init()?;
    Ok(())
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<commands::triage::TriageFailed>().is_some() {
        ExitCodes::PIPELINE_ERROR
    } else {
        ExitCodes::INVALID_INPUT
    }
}
