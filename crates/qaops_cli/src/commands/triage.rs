//! Triage command - Run the pipeline on CI logs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use qaops_core::{context_window, LogSource, PipelineConfig, PipelineResult, TriagePipeline};
use qaops_llm::select_backend;
use qaops_tools::{FileLogSource, MemoryBank, MockJiraClient, SampleJenkinsSource};

/// Pipeline finished with the error shape. Already reported on stdout.
#[derive(Debug, thiserror::Error)]
#[error("Triage failed: {0}")]
pub struct TriageFailed(pub String);

#[derive(Args)]
pub struct TriageArgs {
    /// CI log text to triage
    #[arg(long, group = "input")]
    logs: Option<String>,

    /// Read CI logs from a file
    #[arg(short, long, group = "input")]
    file: Option<PathBuf>,

    /// Use the sample Jenkins build log
    #[arg(long, group = "input")]
    sample: bool,

    /// Only triage the last N lines of the log
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    tail: Option<u64>,

    /// Pretty-print the result JSON
    #[arg(long)]
    pretty: bool,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, env = "QAOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL for ticket references
    #[arg(long, env = "QAOPS_JIRA_URL")]
    jira_url: Option<String>,

    /// Directory containing `.qaops/settings.json` (defaults to the current directory)
    #[arg(long)]
    workspace: Option<PathBuf>,
}

/// Where the CI log text comes from. Standard input when nothing is given.
#[derive(Debug, PartialEq)]
enum LogInput {
    Inline(String),
    File(PathBuf),
    Sample,
    Stdin,
}

impl TriageArgs {
    fn input(&self) -> LogInput {
        if let Some(logs) = &self.logs {
            LogInput::Inline(logs.clone())
        } else if let Some(path) = &self.file {
            LogInput::File(path.clone())
        } else if self.sample {
            LogInput::Sample
        } else {
            LogInput::Stdin
        }
    }
}

async fn read_logs(input: LogInput) -> Result<String> {
    match input {
        LogInput::Inline(logs) => Ok(logs),
        LogInput::File(path) => Ok(FileLogSource::new(path).read().await?),
        LogInput::Sample => Ok(SampleJenkinsSource.fetch_ci_logs().await?),
        LogInput::Stdin => {
            let mut logs = String::new();
            tokio::io::stdin()
                .read_to_string(&mut logs)
                .await
                .context("Failed to read CI logs from stdin")?;
            Ok(logs)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn render(result: &PipelineResult, pretty: bool) -> Result<String> {
    let value = result.to_json()?;
    Ok(if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        value.to_string()
    })
}

pub async fn execute(args: TriageArgs, memory_file: &Path) -> Result<()> {
    let mut logs = read_logs(args.input()).await?;
    if let Some(n) = args.tail {
        debug!("Keeping the last {} log lines", n);
        logs = context_window(&logs, usize::try_from(n).unwrap_or(usize::MAX));
    }

    let config = load_config(args.config.as_deref())?;
    let workspace = match &args.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let jira = match &args.jira_url {
        Some(url) => MockJiraClient::with_base_url(url)?,
        None => MockJiraClient::new(),
    };

    let pipeline = TriagePipeline::builder(Arc::new(jira))
        .with_config(config)
        .with_backend(select_backend(&workspace))
        .with_tracker(Arc::new(MemoryBank::new(memory_file)))
        .build()?;

    info!("Triaging {} bytes of CI logs", logs.len());
    let result = pipeline.run(&logs).await;
    println!("{}", render(&result, args.pretty)?);

    match result.error_message() {
        Some(message) => Err(TriageFailed(message.to_string()).into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    fn triage_args(argv: &[&str]) -> TriageArgs {
        let mut full = vec!["qaops", "triage"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Triage(args) => args,
            _ => panic!("expected triage command"),
        }
    }

    #[test]
    fn test_input_selection() {
        assert_eq!(
            triage_args(&["--logs", "x FAIL"]).input(),
            LogInput::Inline("x FAIL".into())
        );
        assert_eq!(
            triage_args(&["--file", "build.log"]).input(),
            LogInput::File(PathBuf::from("build.log"))
        );
        assert_eq!(triage_args(&["--sample"]).input(), LogInput::Sample);
        assert_eq!(triage_args(&[]).input(), LogInput::Stdin);
    }

    #[test]
    fn test_inputs_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["qaops", "triage", "--sample", "--logs", "x"]).is_err());
    }

    #[test]
    fn test_tail_must_be_positive() {
        assert!(Cli::try_parse_from(["qaops", "triage", "--tail", "0"]).is_err());
        assert_eq!(triage_args(&["--tail", "5"]).tail, Some(5));
    }

    #[tokio::test]
    async fn test_read_sample_logs() {
        let logs = read_logs(LogInput::Sample).await.unwrap();
        assert!(logs.contains("test_login FAILED"));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        assert!(read_logs(LogInput::File("/nonexistent/ci.log".into()))
            .await
            .is_err());
    }

    #[test]
    fn test_render_compact_and_pretty() {
        let result = PipelineResult::error("boom");
        let compact = render(&result, false).unwrap();
        assert!(!compact.contains('\n'));
        assert!(render(&result, true).unwrap().contains('\n'));
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qaops.json");
        std::fs::write(&path, r#"{"ticketSummary": "Nightly QA"}"#).unwrap();

        assert_eq!(
            load_config(Some(&path)).unwrap().ticket_summary,
            "Nightly QA"
        );
        assert!(load_config(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[tokio::test]
    async fn test_execute_records_recurrences() {
        // A configured provider key would turn this into a network call.
        if qaops_llm::LlmAdapter::from_env().is_ok() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let memory = dir.path().join("memory_bank.json");
        let args = TriageArgs {
            workspace: Some(dir.path().to_path_buf()),
            ..triage_args(&["--logs", "a FAIL\nok\nb FAIL", "--tail", "1"])
        };

        execute(args, &memory).await.unwrap();

        let bank = MemoryBank::new(&memory);
        assert_eq!(bank.count("b FAIL").unwrap(), 1);
        assert_eq!(bank.count("a FAIL").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_execute_bad_config_is_not_a_pipeline_failure() {
        let dir = tempfile::tempdir().unwrap();
        let args = TriageArgs {
            config: Some(dir.path().join("missing.json")),
            ..triage_args(&["--logs", "a FAIL"])
        };

        let err = execute(args, &dir.path().join("memory_bank.json"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<TriageFailed>().is_none());
    }
}
