//! OpenAI-compatible Chat Completions client.
//!
//! Used against Groq's `/openai/v1/chat/completions`; replies are short, so
//! the request is non-streaming.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use parley_core::config::GroqConfig;

use crate::{api_error, ChatModel, ChatRequest};

const GROQ_CHAT_PATH: &str = "/openai/v1/chat/completions";

pub struct OpenAiCompatChat {
    pub base_url: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatChat {
    pub fn groq(config: &GroqConfig, api_key: String) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{GROQ_CHAT_PATH}", self.base_url)
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request(model: &str, request: &ChatRequest) -> OpenAiRequest {
    OpenAiRequest {
        model: model.to_string(),
        messages: vec![
            json!({ "role": "system", "content": request.system }),
            json!({ "role": "user", "content": request.user }),
        ],
        max_tokens: request.max_tokens,
        stream: false,
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatChat {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let body = build_request(&self.model, request);

        debug!(model = %body.model, provider = "groq", "Requesting chat completion");

        let resp = self
            .client
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error("Chat", resp).await);
        }

        let completion: ChatCompletion = resp.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("chat completion returned no choices"))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
