//! Text-to-speech via a Replicate-hosted model (Kokoro by default).
//!
//! A prediction is created with `Prefer: wait`; if it has not reached a
//! terminal status when the call returns, `urls.get` is polled until it does.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use parley_core::config::ReplicateConfig;

use crate::{api_error, SpeechSynthesizer, SynthesisOutput};

pub struct ReplicateSynthesizer {
    pub base_url: String,
    pub version: String,
    poll_interval: Duration,
    max_polls: u32,
    api_token: String,
    client: reqwest::Client,
}

impl ReplicateSynthesizer {
    pub fn new(config: &ReplicateConfig, api_token: String) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.model_version().to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
            api_token,
            client: reqwest::Client::new(),
        }
    }

    fn status(prediction: &Value) -> String {
        prediction
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    /// Where to poll a prediction that has not finished yet.
    fn poll_url(&self, prediction: &Value) -> anyhow::Result<String> {
        if let Some(url) = prediction
            .get("urls")
            .and_then(|u| u.get("get"))
            .and_then(|u| u.as_str())
        {
            return Ok(url.to_string());
        }
        let id = prediction
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| anyhow::anyhow!("prediction has neither urls.get nor id"))?;
        Ok(format!("{}/v1/predictions/{id}", self.base_url))
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Value> {
        let resp = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error("Replicate", resp).await);
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl SpeechSynthesizer for ReplicateSynthesizer {
    async fn synthesize(&self, text: &str) -> anyhow::Result<SynthesisOutput> {
        debug!(version = %self.version, text_len = text.len(), "Creating TTS prediction");

        let resp = self
            .client
            .post(format!("{}/v1/predictions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Prefer", "wait")
            .json(&json!({
                "version": self.version,
                "input": { "text": text },
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error("Replicate", resp).await);
        }

        let mut prediction: Value = resp.json().await?;
        let mut polls = 0;

        loop {
            let status = Self::status(&prediction);
            match status.as_str() {
                "succeeded" => {
                    info!(polls, "TTS prediction succeeded");
                    return Ok(SynthesisOutput::from_prediction(prediction));
                }
                "failed" | "canceled" => {
                    let reason = prediction
                        .get("error")
                        .map(|e| match e {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| "no error reported".into());
                    anyhow::bail!("prediction {status}: {reason}");
                }
                _ => {}
            }

            if polls >= self.max_polls {
                anyhow::bail!("prediction still '{status}' after {polls} polls");
            }

            let url = self.poll_url(&prediction)?;
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            debug!(polls, %status, "Polling TTS prediction");
            prediction = self.fetch(&url).await?;
        }
    }
}
