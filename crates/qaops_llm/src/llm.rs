//! LLM adapter for single-prompt completions.
//!
//! Supports Gemini, OpenAI and Anthropic APIs, selected via environment
//! variables or the workspace settings file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};

/// Environment variable overriding the provider's default model.
pub const MODEL_ENV: &str = "QAOPS_LLM_MODEL";

const MAX_RETRIES: u32 = 3;
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    /// Providers in the order their credentials are checked.
    pub const ALL: [LlmProvider; 3] = [
        LlmProvider::Gemini,
        LlmProvider::OpenAI,
        LlmProvider::Anthropic,
    ];

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.5-flash",
            LlmProvider::OpenAI => "gpt-5-mini",
            LlmProvider::Anthropic => "claude-sonnet-4.5",
        }
    }

    /// Environment variables holding the API key, checked in order.
    pub fn key_vars(&self) -> &'static [&'static str] {
        match self {
            LlmProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            LlmProvider::OpenAI => &["OPENAI_API_KEY"],
            LlmProvider::Anthropic => &["ANTHROPIC_API_KEY"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenAI => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
        }
    }

    /// Parse a provider name as written in the settings file.
    pub fn parse(name: &str) -> LlmResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAI),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }

    /// First non-empty API key for this provider.
    fn find_key(&self, lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
        self.key_vars()
            .iter()
            .filter_map(|var| lookup(*var))
            .find(|key| !key.trim().is_empty())
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// Contents of `.qaops/settings.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
}

impl LlmSettings {
    pub fn path(workspace_root: &Path) -> std::path::PathBuf {
        workspace_root.join(".qaops").join("settings.json")
    }

    /// Load settings; a missing file yields empty settings.
    pub fn load(workspace_root: &Path) -> LlmResult<Self> {
        let path = Self::path(workspace_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| LlmError::Settings(format!("{}: {}", path.display(), e)))
    }
}

/// LLM adapter that handles API calls
pub struct LlmAdapter {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
    retry_delay: Duration,
}

/// Response from LLM including usage info
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

impl LlmAdapter {
    /// Create a new LLM adapter with explicit configuration
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        Self {
            provider,
            api_key,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            client: reqwest::Client::new(),
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Base delay of the exponential backoff between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Create an LLM adapter from environment variables
    ///
    /// Checks in order:
    /// 1. GEMINI_API_KEY, GOOGLE_API_KEY
    /// 2. OPENAI_API_KEY
    /// 3. ANTHROPIC_API_KEY
    pub fn from_env() -> LlmResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`LlmAdapter::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LlmResult<Self> {
        let model = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty());

        LlmProvider::ALL
            .iter()
            .find_map(|provider| {
                provider
                    .find_key(&lookup)
                    .map(|key| Self::new(*provider, key, model.clone()))
            })
            .ok_or(LlmError::NotConfigured)
    }

    /// Create an LLM adapter from workspace settings
    ///
    /// The provider named by `defaultProvider` must have its key in the
    /// environment. Without a named provider the environment order applies.
    pub fn from_settings(workspace_root: &Path) -> LlmResult<Self> {
        Self::from_settings_with(workspace_root, |var| std::env::var(var).ok())
    }

    pub fn from_settings_with(
        workspace_root: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> LlmResult<Self> {
        let settings = LlmSettings::load(workspace_root)?;

        let Some(name) = settings.default_provider.as_deref() else {
            let adapter = Self::from_lookup(&lookup)?;
            return Ok(match settings.default_model {
                Some(model) => Self::new(adapter.provider, adapter.api_key, Some(model)),
                None => adapter,
            });
        };

        let provider = LlmProvider::parse(name)?;
        let api_key = provider.find_key(&lookup).ok_or(LlmError::NotConfigured)?;
        Ok(Self::new(provider, api_key, settings.default_model))
    }

    /// Settings file when present, environment otherwise.
    pub fn detect(workspace_root: &Path) -> LlmResult<Self> {
        if LlmSettings::path(workspace_root).exists() {
            Self::from_settings(workspace_root)
        } else {
            Self::from_env()
        }
    }

    /// Get the current provider
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Complete a single prompt with the LLM
    pub async fn complete(&self, prompt: &str) -> LlmResult<LlmResponse> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_delay * (1 << (attempt - 1));
                tracing::debug!(
                    provider = %self.provider,
                    attempt = attempt + 1,
                    "Retrying LLM request in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            let result = match self.provider {
                LlmProvider::Gemini => self.complete_gemini(prompt).await,
                LlmProvider::OpenAI => self.complete_openai(prompt).await,
                LlmProvider::Anthropic => self.complete_anthropic(prompt).await,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        provider = %self.provider,
                        "LLM request failed (attempt {}/{}): {}",
                        attempt + 1,
                        MAX_RETRIES,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
    }

    async fn send<T: Serialize>(
        &self,
        request: reqwest::RequestBuilder,
        body: &T,
    ) -> LlmResult<reqwest::Response> {
        let response = request
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::api(
                self.provider.display_name(),
                status.as_u16(),
                body,
            ));
        }
        Ok(response)
    }

    // Gemini generateContent
    async fn complete_gemini(&self, prompt: &str) -> LlmResult<LlmResponse> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .send(
                self.client.post(&url).header("x-goog-api-key", &self.api_key),
                &request,
            )
            .await?;

        let result: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = result
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| LlmError::EmptyResponse("Gemini".to_string()))?;

        let (input_tokens, output_tokens) = result
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(LlmResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    // OpenAI chat completion
    async fn complete_openai(&self, prompt: &str) -> LlmResult<LlmResponse> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_completion_tokens: Some(MAX_OUTPUT_TOKENS),
        };

        let response = self
            .send(
                self.client
                    .post("https://api.openai.com/v1/chat/completions")
                    .header("Authorization", format!("Bearer {}", self.api_key)),
                &request,
            )
            .await?;

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::EmptyResponse("OpenAI".to_string()))?;

        let (input_tokens, output_tokens) = result
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(LlmResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    // Anthropic messages
    async fn complete_anthropic(&self, prompt: &str) -> LlmResult<LlmResponse> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .send(
                self.client
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01"),
                &request,
            )
            .await?;

        let result: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = result
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| LlmError::EmptyResponse("Anthropic".to_string()))?;

        let (input_tokens, output_tokens) = result
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));

        Ok(LlmResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }
}

// Gemini API types
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_provider_detection() {
        assert!(matches!(
            LlmAdapter::from_lookup(vars(&[])),
            Err(LlmError::NotConfigured)
        ));

        let adapter = LlmAdapter::from_lookup(vars(&[("GOOGLE_API_KEY", "g")])).unwrap();
        assert_eq!(adapter.provider(), LlmProvider::Gemini);

        let adapter = LlmAdapter::from_lookup(vars(&[("OPENAI_API_KEY", "o")])).unwrap();
        assert_eq!(adapter.provider(), LlmProvider::OpenAI);

        let adapter = LlmAdapter::from_lookup(vars(&[("ANTHROPIC_API_KEY", "a")])).unwrap();
        assert_eq!(adapter.provider(), LlmProvider::Anthropic);
    }

    #[test]
    fn test_first_non_empty_key_wins() {
        let adapter = LlmAdapter::from_lookup(vars(&[
            ("GEMINI_API_KEY", ""),
            ("OPENAI_API_KEY", "o"),
            ("ANTHROPIC_API_KEY", "a"),
        ]))
        .unwrap();
        assert_eq!(adapter.provider(), LlmProvider::OpenAI);
    }

    #[test]
    fn test_model_override() {
        let adapter = LlmAdapter::from_lookup(vars(&[
            ("GEMINI_API_KEY", "g"),
            (MODEL_ENV, "gemini-2.0-pro"),
        ]))
        .unwrap();
        assert_eq!(adapter.model(), "gemini-2.0-pro");
    }

    #[test]
    fn test_default_models() {
        let gemini = LlmAdapter::new(LlmProvider::Gemini, "key".to_string(), None);
        assert_eq!(gemini.model(), "gemini-2.5-flash");

        let openai = LlmAdapter::new(LlmProvider::OpenAI, "key".to_string(), None);
        assert_eq!(openai.model(), "gpt-5-mini");

        let anthropic = LlmAdapter::new(LlmProvider::Anthropic, "key".to_string(), None);
        assert_eq!(anthropic.model(), "claude-sonnet-4.5");
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(LlmProvider::parse("Google").unwrap(), LlmProvider::Gemini);
        assert_eq!(LlmProvider::parse("anthropic").unwrap(), LlmProvider::Anthropic);
        assert!(matches!(
            LlmProvider::parse("mistral"),
            Err(LlmError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".qaops")).unwrap();
        std::fs::write(
            LlmSettings::path(dir.path()),
            r#"{"defaultProvider": "anthropic", "defaultModel": "claude-haiku"}"#,
        )
        .unwrap();

        let env = vars(&[("GEMINI_API_KEY", "g"), ("ANTHROPIC_API_KEY", "a")]);
        let adapter = LlmAdapter::from_settings_with(dir.path(), env).unwrap();
        assert_eq!(adapter.provider(), LlmProvider::Anthropic);
        assert_eq!(adapter.model(), "claude-haiku");

        let missing_key = LlmAdapter::from_settings_with(dir.path(), vars(&[("GEMINI_API_KEY", "g")]));
        assert!(matches!(missing_key, Err(LlmError::NotConfigured)));
    }

    #[test]
    fn test_settings_without_provider_follow_env_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".qaops")).unwrap();
        std::fs::write(LlmSettings::path(dir.path()), r#"{"defaultModel": "m"}"#).unwrap();

        let adapter =
            LlmAdapter::from_settings_with(dir.path(), vars(&[("OPENAI_API_KEY", "o")])).unwrap();
        assert_eq!(adapter.provider(), LlmProvider::OpenAI);
        assert_eq!(adapter.model(), "m");
    }

    #[test]
    fn test_missing_settings_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LlmSettings::load(dir.path()).unwrap();
        assert!(settings.default_provider.is_none());
    }

    #[test]
    fn test_malformed_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".qaops")).unwrap();
        std::fs::write(LlmSettings::path(dir.path()), "not json").unwrap();
        assert!(matches!(
            LlmSettings::load(dir.path()),
            Err(LlmError::Settings(_))
        ));
    }

    #[test]
    fn test_gemini_response_parsing() {
        let body = r#"{
            "candidates": [{"content": {"parts": [{"text": "Timeouts in login"}], "role": "model"}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "Timeouts in login");
        assert_eq!(parsed.usage_metadata.unwrap().prompt_token_count, 12);
    }
}
