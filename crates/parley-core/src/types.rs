//! Wire types shared between the pipeline and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Language value meaning "let the transcriber detect it".
pub const AUTO_LANGUAGE: &str = "auto";

/// Form default for both `lang` and `target_lang`.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Map a caller-supplied source language to the constraint sent to STT.
///
/// `"auto"` and empty values mean no constraint; anything else is forwarded as-is.
pub fn language_constraint(lang: Option<&str>) -> Option<&str> {
    match lang {
        None => None,
        Some(l) if l.is_empty() || l == AUTO_LANGUAGE => None,
        Some(l) => Some(l),
    }
}

/// Successful conversation turn returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReply {
    pub success: bool,
    pub transcript: String,
    pub reply_text: String,
    /// Public path of the reply audio. The file may not exist yet.
    pub reply_audio_url: String,
}

/// Body of the structured-error route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub success: bool,
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Done,
    Failed,
}

/// In-memory record of one background synthesis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub reply_audio_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(id: String, reply_audio_url: String) -> Self {
        Self {
            id,
            state: JobState::Pending,
            error: None,
            reply_audio_url,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state != JobState::Pending
    }
}
