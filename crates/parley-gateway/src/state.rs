//! Gateway shared state.

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::config::{Config, Secrets};
use parley_media::download::AudioDownloader;
use parley_providers::openai::OpenAiCompatChat;
use parley_providers::replicate::ReplicateSynthesizer;
use parley_providers::whisper::WhisperTranscriber;
use parley_providers::{ChatModel, SpeechSynthesizer, Transcriber};

use crate::jobs::JobRegistry;

/// The three hosted collaborators the pipeline depends on.
#[derive(Clone)]
pub struct Providers {
    pub transcriber: Arc<dyn Transcriber>,
    pub chat: Arc<dyn ChatModel>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Providers {
    /// Build the production clients (Groq for STT and chat, Replicate for TTS).
    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        let groq = config.groq();
        Self {
            transcriber: Arc::new(WhisperTranscriber::new(&groq, secrets.groq_api_key.clone())),
            chat: Arc::new(OpenAiCompatChat::groq(&groq, secrets.groq_api_key.clone())),
            synthesizer: Arc::new(ReplicateSynthesizer::new(
                &config.replicate(),
                secrets.replicate_api_token.clone(),
            )),
        }
    }
}

/// Shared gateway state accessible from all handlers and background jobs.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub providers: Providers,
    pub downloader: AudioDownloader,
    pub jobs: Arc<JobRegistry>,
    pub static_dir: PathBuf,
    pub output_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_reply_tokens: u32,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, providers: Providers) -> anyhow::Result<Self> {
        let downloader = AudioDownloader::new(&config.download())?;
        let jobs = Arc::new(JobRegistry::new(config.max_tracked_jobs()));

        Ok(Self {
            static_dir: config.static_dir(),
            output_dir: config.output_dir(),
            upload_dir: config.upload_dir(),
            max_reply_tokens: config.groq().max_tokens,
            config,
            providers,
            downloader,
            jobs,
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        })
    }

    /// Attach the handle `/metrics` renders from.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
