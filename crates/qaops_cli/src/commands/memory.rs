//! Memory command - Inspect or reset recurrence counts.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use qaops_tools::{IssueCounts, MemoryBank};

#[derive(Args)]
pub struct MemoryArgs {
    #[command(subcommand)]
    action: MemoryAction,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Print recurrence counts as JSON
    Show {
        /// Only the N most frequent issues
        #[arg(long, value_name = "N")]
        top: Option<usize>,
    },

    /// Reset the memory bank to an empty object
    Clear,
}

/// The `n` most frequent issues, ties broken by issue text.
fn top_issues(counts: &IssueCounts, n: usize) -> Vec<(&str, u64)> {
    let mut ranked: Vec<(&str, u64)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(n);
    ranked
}

pub fn execute(args: MemoryArgs, memory_file: &Path) -> Result<()> {
    let bank = MemoryBank::new(memory_file);

    match args.action {
        MemoryAction::Show { top } => {
            let counts = bank
                .read()
                .with_context(|| format!("Failed to read memory bank {}", memory_file.display()))?;
            let value = match top {
                Some(n) => serde_json::to_value(top_issues(&counts, n))?,
                None => serde_json::to_value(&counts)?,
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        MemoryAction::Clear => {
            bank.clear()
                .with_context(|| format!("Failed to clear memory bank {}", memory_file.display()))?;
            println!("✅ Cleared memory bank {}", memory_file.display());
        }
    }

    Ok(())
}
