//! Hosted provider abstraction.
//!
//! The conversation pipeline talks to three external services through the
//! traits below: [`Transcriber`] (speech-to-text), [`ChatModel`] (reply
//! generation) and [`SpeechSynthesizer`] (text-to-speech). Concrete clients
//! are built once at startup and shared behind `Arc<dyn ...>`.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod openai;
pub mod output;
pub mod replicate;
pub mod whisper;

pub use output::{extract_audio_url, ProviderRecord, SynthesisOutput};

/// A single-turn chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// Speech-to-text over an audio file on disk.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// `language: None` lets the provider detect the language.
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> anyhow::Result<String>;
}

/// Chat completion producing a reply text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String>;
}

/// Text-to-speech; the output shape is provider-defined and decoded into
/// [`SynthesisOutput`] for URL extraction.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> anyhow::Result<SynthesisOutput>;
}

/// Build an error from a non-success provider response.
pub(crate) async fn api_error(provider: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::anyhow!("{provider} API error {status}: {body}")
}
