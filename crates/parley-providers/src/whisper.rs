//! Speech-to-text via Whisper on Groq's OpenAI-compatible endpoint.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use parley_core::config::GroqConfig;

use crate::{api_error, Transcriber};

pub struct WhisperTranscriber {
    pub base_url: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(config: &GroqConfig, api_key: String) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.stt_model.clone(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/openai/v1/audio/transcriptions", self.base_url)
    }
}

/// Build the multipart form for a transcription request.
fn transcription_form(
    file_bytes: Vec<u8>,
    file_name: String,
    model: &str,
    language: Option<&str>,
) -> anyhow::Result<reqwest::multipart::Form> {
    let file_part = reqwest::multipart::Part::bytes(file_bytes)
        .file_name(file_name)
        .mime_str("audio/wav")?;

    let mut form = reqwest::multipart::Form::new()
        .part("file", file_part)
        .text("model", model.to_string())
        .text("response_format", "text")
        .text("temperature", "0");

    if let Some(lang) = language {
        form = form.text("language", lang.to_string());
    }

    Ok(form)
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> anyhow::Result<String> {
        let file_bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".into());

        debug!(
            model = %self.model,
            language = language.unwrap_or("auto"),
            bytes = file_bytes.len(),
            "Sending audio for transcription"
        );

        let form = transcription_form(file_bytes, file_name, &self.model, language)?;

        let resp = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error("Transcription", resp).await);
        }

        let transcript = resp.text().await?.trim().to_string();
        info!(model = %self.model, chars = transcript.len(), "Audio transcribed");

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::{extract::Multipart, routing::post, Router};

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = GroqConfig {
            base_url: "https://api.groq.com/".into(),
            ..GroqConfig::default()
        };
        let stt = WhisperTranscriber::new(&config, "gsk".into());
        assert_eq!(
            stt.endpoint(),
            "https://api.groq.com/openai/v1/audio/transcriptions"
        );
        assert_eq!(stt.model, "whisper-large-v3-turbo");
    }

    /// Start a fake transcription endpoint that records multipart field names
    /// and text values, replying with a padded transcript.
    async fn fake_groq(fields: Arc<Mutex<Vec<(String, String)>>>) -> String {
        let app = Router::new().route(
            "/openai/v1/audio/transcriptions",
            post(move |mut multipart: Multipart| {
                let fields = fields.clone();
                async move {
                    while let Ok(Some(field)) = multipart.next_field().await {
                        let name = field.name().unwrap_or_default().to_string();
                        let value = if name == "file" {
                            format!("{} bytes", field.bytes().await.map(|b| b.len()).unwrap_or(0))
                        } else {
                            field.text().await.unwrap_or_default()
                        };
                        fields.lock().unwrap().push((name, value));
                    }
                    "  bonjour tout le monde \n"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_transcribe_sends_language_when_given() {
        let fields = Arc::new(Mutex::new(Vec::new()));
        let base_url = fake_groq(fields.clone()).await;

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, vec![0u8; 64]).unwrap();

        let config = GroqConfig {
            base_url,
            ..GroqConfig::default()
        };
        let stt = WhisperTranscriber::new(&config, "gsk".into());
        let text = stt.transcribe(&audio, Some("fr")).await.unwrap();
        assert_eq!(text, "bonjour tout le monde");

        let fields = fields.lock().unwrap();
        assert_eq!(field(&fields, "language"), Some("fr"));
        assert_eq!(field(&fields, "model"), Some("whisper-large-v3-turbo"));
        assert_eq!(field(&fields, "response_format"), Some("text"));
        assert_eq!(field(&fields, "file"), Some("64 bytes"));
    }

    #[tokio::test]
    async fn test_transcribe_omits_language_for_detection() {
        let fields = Arc::new(Mutex::new(Vec::new()));
        let base_url = fake_groq(fields.clone()).await;

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, vec![0u8; 16]).unwrap();

        let config = GroqConfig {
            base_url,
            ..GroqConfig::default()
        };
        let stt = WhisperTranscriber::new(&config, "gsk".into());
        stt.transcribe(&audio, None).await.unwrap();

        let fields = fields.lock().unwrap();
        assert_eq!(field(&fields, "language"), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let stt = WhisperTranscriber::new(&GroqConfig::default(), "gsk".into());
        let result = stt
            .transcribe(Path::new("/nonexistent/parley/clip.wav"), None)
            .await;
        assert!(result.is_err());
    }
}
