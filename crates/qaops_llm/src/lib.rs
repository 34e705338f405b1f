//! # qaops_llm
//!
//! Live text-generation providers behind the `AnalysisBackend` port.
//!
//! Provider selection, first match wins:
//!
//! | Source | Provider |
//! |--------|----------|
//! | `.qaops/settings.json` `defaultProvider` | named provider |
//! | `GEMINI_API_KEY` / `GOOGLE_API_KEY` | Gemini |
//! | `OPENAI_API_KEY` | OpenAI |
//! | `ANTHROPIC_API_KEY` | Anthropic |
//!
//! With no credential the pipeline gets a `NullBackend` and produces mock
//! analysis text.

pub mod backend;
pub mod error;
pub mod llm;

pub use backend::select_backend;
pub use error::{LlmError, LlmResult};
pub use llm::{LlmAdapter, LlmProvider, LlmResponse, LlmSettings, MODEL_ENV};
