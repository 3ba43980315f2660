//! One conversation turn: stage the upload, transcribe, reply, schedule speech.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use parley_core::config::{OUTPUT_SUBDIR, STATIC_URL_PREFIX};
use parley_core::error::ParleyError;
use parley_core::types::{language_constraint, ConversationReply};
use parley_media::upload::StagedUpload;
use parley_media::wav::looks_like_wav;
use parley_providers::ChatRequest;

use crate::jobs::spawn_synthesis_job;
use crate::state::GatewayState;

/// Where a reply's synthesized audio will land and how it is addressed publicly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub id: String,
    pub path: PathBuf,
    pub url: String,
}

impl OutputTarget {
    pub fn generate(output_dir: &Path) -> Self {
        let id = Uuid::new_v4().to_string();
        let file_name = format!("{id}.mp3");
        Self {
            path: output_dir.join(&file_name),
            url: format!("{STATIC_URL_PREFIX}/{OUTPUT_SUBDIR}/{file_name}"),
            id,
        }
    }
}

pub fn system_prompt(target_lang: &str) -> String {
    format!(
        "You are a friendly language learning assistant. Always reply in {target_lang}. \
         Keep your responses concise (1–3 sentences maximum)."
    )
}

/// Parsed form of a conversation upload.
#[derive(Debug, Clone)]
pub struct ConversationInput {
    pub audio: Bytes,
    /// Source language hint; `None` or `"auto"` lets the transcriber detect it.
    pub lang: Option<String>,
    pub target_lang: String,
}

/// Run one turn and schedule background synthesis of the reply.
///
/// Returns as soon as the reply text exists. The staged upload is removed
/// before this returns, whatever the outcome.
pub async fn converse(
    state: &Arc<GatewayState>,
    input: ConversationInput,
) -> Result<ConversationReply, ParleyError> {
    let started = Instant::now();
    let result = run_turn(state, input).await;

    match &result {
        Ok(_) => {
            #[cfg(feature = "metrics")]
            crate::metrics::record_conversation(started.elapsed().as_secs_f64());
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "Conversation turn complete");
        }
        Err(e) => {
            #[cfg(feature = "metrics")]
            crate::metrics::record_stage_failure(e.stage().unwrap_or("internal"));
            error!(stage = e.stage().unwrap_or("internal"), %e, "Conversation turn failed");
        }
    }

    result
}

async fn run_turn(
    state: &Arc<GatewayState>,
    input: ConversationInput,
) -> Result<ConversationReply, ParleyError> {
    if !looks_like_wav(&input.audio) {
        warn!(bytes = input.audio.len(), "Upload has no WAV header; forwarding as-is");
    }

    let upload = StagedUpload::stage(&state.upload_dir, input.audio)
        .await
        .map_err(|e| ParleyError::Upload(e.to_string()))?;

    let language = language_constraint(input.lang.as_deref());
    let transcript = state
        .providers
        .transcriber
        .transcribe(upload.path(), language)
        .await
        .map_err(|e| ParleyError::Transcription(format!("{e:#}")))?;
    info!(chars = transcript.len(), ?language, "Transcribed upload");

    let request = ChatRequest {
        system: system_prompt(&input.target_lang),
        user: transcript.clone(),
        max_tokens: state.max_reply_tokens,
    };
    let reply_text = state
        .providers
        .chat
        .complete(&request)
        .await
        .map_err(|e| ParleyError::ReplyGeneration(format!("{e:#}")))?
        .trim()
        .to_string();

    drop(upload);

    let target = OutputTarget::generate(&state.output_dir);
    state.jobs.register(&target.id, &target.url).await;
    spawn_synthesis_job(
        state.jobs.clone(),
        state.providers.synthesizer.clone(),
        state.downloader.clone(),
        target.id.clone(),
        reply_text.clone(),
        target.path,
    );
    info!(job_id = %target.id, url = %target.url, "Scheduled reply synthesis");

    Ok(ConversationReply {
        success: true,
        transcript,
        reply_text,
        reply_audio_url: target.url,
    })
}
