//! Providers command - Report analysis backend configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use qaops_llm::{LlmAdapter, LlmError, LlmProvider, LlmSettings};

#[derive(Args)]
pub struct ProvidersArgs {
    /// Directory containing `.qaops/settings.json` (defaults to the current directory)
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn key_status(provider: LlmProvider) -> Option<&'static str> {
    provider
        .key_vars()
        .iter()
        .copied()
        .find(|var| std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false))
}

pub fn execute(args: ProvidersArgs) -> Result<()> {
    let workspace = match args.workspace {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    println!("🔑 Provider credentials:");
    for provider in LlmProvider::ALL {
        match key_status(provider) {
            Some(var) => println!(
                "   ✅ {:<10} {} ({})",
                provider,
                var,
                provider.default_model()
            ),
            None => println!(
                "   ➖ {:<10} set {}",
                provider,
                provider.key_vars().join(" or ")
            ),
        }
    }

    let settings_path = LlmSettings::path(&workspace);
    if settings_path.exists() {
        println!("⚙️  Settings: {}", settings_path.display());
    }

    match LlmAdapter::detect(&workspace) {
        Ok(adapter) => println!(
            "🤖 Analysis backend: {} ({})",
            adapter.provider(),
            adapter.model()
        ),
        Err(LlmError::NotConfigured) => {
            println!("🤖 Analysis backend: none, mock analysis will be used")
        }
        Err(e) => println!("⚠️  Analysis backend unavailable: {}", e),
    }

    Ok(())
}
