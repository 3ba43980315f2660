//! Background speech synthesis jobs and their in-memory registry.
//!
//! Jobs are never retried or cancelled. The registry exists so that a
//! failed job can be looked up instead of only showing up as a missing file.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use parley_core::error::ParleyError;
use parley_core::types::{JobRecord, JobState};
use parley_media::download::AudioDownloader;
use parley_providers::{extract_audio_url, SpeechSynthesizer};

#[derive(Default)]
struct Inner {
    records: HashMap<String, JobRecord>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

pub struct JobRegistry {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Track a new job as pending, evicting the oldest finished records if full.
    pub async fn register(&self, id: &str, reply_audio_url: &str) {
        let mut inner = self.inner.write().await;

        while inner.records.len() >= self.capacity {
            let finished = inner.order.iter().position(|job_id| {
                inner
                    .records
                    .get(job_id)
                    .is_some_and(JobRecord::is_finished)
            });
            let Some(pos) = finished else {
                // Every tracked job is still running; keep them all.
                break;
            };
            if let Some(evicted) = inner.order.remove(pos) {
                inner.records.remove(&evicted);
                debug!(job_id = %evicted, "Evicted finished job record");
            }
        }

        inner.order.push_back(id.to_string());
        inner.records.insert(
            id.to_string(),
            JobRecord::pending(id.to_string(), reply_audio_url.to_string()),
        );
    }

    pub async fn complete(&self, id: &str) {
        self.finish(id, JobState::Done, None).await;
    }

    pub async fn fail(&self, id: &str, error: String) {
        self.finish(id, JobState::Failed, Some(error)).await;
    }

    async fn finish(&self, id: &str, state: JobState, error: Option<String>) {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.records.get_mut(id) {
            record.state = state;
            record.error = error;
            record.finished_at = Some(Utc::now());
        }
    }

    pub async fn get(&self, id: &str) -> Option<JobRecord> {
        self.inner.read().await.records.get(id).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner
            .read()
            .await
            .records
            .values()
            .filter(|r| r.state == JobState::Pending)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

/// Synthesize `text`, locate the audio URL, and download it to `dest`.
pub async fn synthesize_to_file(
    synthesizer: &dyn SpeechSynthesizer,
    downloader: &AudioDownloader,
    text: &str,
    dest: &std::path::Path,
) -> Result<u64, ParleyError> {
    let output = synthesizer
        .synthesize(text)
        .await
        .map_err(|e| ParleyError::Synthesis(format!("{e:#}")))?;

    let audio_url = extract_audio_url(&output)?;
    info!(%audio_url, "Background TTS produced URL");

    downloader
        .download_to(&audio_url, dest)
        .await
        .map_err(|e| ParleyError::Download(format!("{e:#}")))
}

/// Run a synthesis job detached from the request that scheduled it.
///
/// The job must already be registered. Its outcome is only logged and
/// recorded in `jobs`.
pub fn spawn_synthesis_job(
    jobs: Arc<JobRegistry>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    downloader: AudioDownloader,
    job_id: String,
    text: String,
    dest: PathBuf,
) {
    tokio::spawn(async move {
        match synthesize_to_file(synthesizer.as_ref(), &downloader, &text, &dest).await {
            Ok(bytes) => {
                info!(%job_id, path = %dest.display(), bytes, "TTS file saved");
                jobs.complete(&job_id).await;
                #[cfg(feature = "metrics")]
                crate::metrics::record_job("done");
            }
            Err(e) => {
                error!(%job_id, stage = e.stage().unwrap_or("tts"), %e, "Background TTS failed");
                jobs.fail(&job_id, e.to_string()).await;
                #[cfg(feature = "metrics")]
                crate::metrics::record_job("failed");
            }
        }
    });
}
