//! Analysis backend selection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use qaops_core::{AnalysisBackend, BackendResult, NullBackend};
use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::llm::LlmAdapter;

#[async_trait]
impl AnalysisBackend for LlmAdapter {
    fn name(&self) -> &str {
        self.provider().label()
    }

    async fn generate(&self, prompt: &str) -> BackendResult<String> {
        let response = self.complete(prompt).await?;
        debug!(
            provider = %self.provider(),
            model = %response.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "LLM completion received"
        );
        Ok(response.content)
    }
}

/// Live backend configured for `workspace_root`, or the null backend when no
/// credential is available.
pub fn select_backend(workspace_root: &Path) -> Arc<dyn AnalysisBackend> {
    match LlmAdapter::detect(workspace_root) {
        Ok(adapter) => {
            info!(
                provider = %adapter.provider(),
                model = adapter.model(),
                "Using live analysis backend"
            );
            Arc::new(adapter)
        }
        Err(LlmError::NotConfigured) => {
            warn!("No LLM API key configured, analysis will use mock output");
            NullBackend::shared()
        }
        Err(e) => {
            warn!("LLM backend unavailable ({}), analysis will use mock output", e);
            NullBackend::shared()
        }
    }
}
