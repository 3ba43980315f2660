use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParleyError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("STT failed: {0}")]
    Transcription(String),

    #[error("LLM failed: {0}")]
    ReplyGeneration(String),

    #[error("TTS failed: {0}")]
    Synthesis(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Unexpected TTS output format")]
    UnrecognizedShape,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParleyError {
    /// Pipeline stage this error belongs to, if any.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Upload(_) => Some("upload"),
            Self::Transcription(_) => Some("stt"),
            Self::ReplyGeneration(_) => Some("llm"),
            Self::Synthesis(_) | Self::UnrecognizedShape => Some("tts"),
            Self::Download(_) => Some("download"),
            Self::Config(_) | Self::Io(_) | Self::Json(_) | Self::Other(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
