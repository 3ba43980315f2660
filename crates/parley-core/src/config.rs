//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, Result};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const OUTPUT_SUBDIR: &str = "tts_outputs";
pub const STATIC_URL_PREFIX: &str = "/static";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_MAX_TRACKED_JOBS: usize = 10_000;

pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const REPLICATE_API_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<ProvidersConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Directory exposed read-only under `/static`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,

    /// Where uploads are staged while a request runs (default: system temp dir).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,

    /// Upper bound on synthesis job records kept in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tracked_jobs: Option<usize>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groq: Option<GroqConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicate: Option<ReplicateConfig>,
}

/// Groq settings, shared by transcription (Whisper) and chat (LLaMA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_groq_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_groq_base_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Token ceiling for replies; keeps them to a few sentences.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_groq_key_env(),
            base_url: default_groq_base_url(),
            chat_model: default_chat_model(),
            stt_model: default_stt_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl GroqConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &Some(self.api_key_env.clone()))
    }
}

fn default_groq_key_env() -> String {
    GROQ_API_KEY_ENV.into()
}

fn default_groq_base_url() -> String {
    "https://api.groq.com".into()
}

fn default_chat_model() -> String {
    "llama-3.1-8b-instant".into()
}

fn default_stt_model() -> String {
    "whisper-large-v3-turbo".into()
}

fn default_max_tokens() -> u32 {
    150
}

/// Replicate settings for speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_replicate_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_replicate_base_url")]
    pub base_url: String,

    /// `owner/name:version` reference of the TTS model.
    #[serde(default = "default_tts_model")]
    pub model: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_replicate_key_env(),
            base_url: default_replicate_base_url(),
            model: default_tts_model(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

impl ReplicateConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &Some(self.api_key_env.clone()))
    }

    /// The version hash Replicate expects in the prediction body.
    pub fn model_version(&self) -> &str {
        match self.model.rsplit_once(':') {
            Some((_, version)) => version,
            None => &self.model,
        }
    }
}

fn default_replicate_key_env() -> String {
    REPLICATE_API_TOKEN_ENV.into()
}

fn default_replicate_base_url() -> String {
    "https://api.replicate.com".into()
}

fn default_tts_model() -> String {
    "jaaari/kokoro-82m:f559560eb822dc509045f3921a1921234918b91739db4bf3daab2169b71c7a13".into()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    120
}

/// Timeouts for fetching synthesized audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_download_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "parley_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Both provider credentials, resolved at startup.
#[derive(Clone)]
pub struct Secrets {
    pub groq_api_key: String,
    pub replicate_api_token: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("groq_api_key", &"<redacted>")
            .field("replicate_api_token", &"<redacted>")
            .finish()
    }
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_REF: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        json5::from_str(&substituted).map_err(|e| ParleyError::Config(e.to_string()))
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or(DEFAULT_PORT)
    }

    pub fn bind_addr(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn static_dir(&self) -> PathBuf {
        self.gateway
            .as_ref()
            .and_then(|g| g.static_dir.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR))
    }

    /// Directory synthesized replies are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.static_dir().join(OUTPUT_SUBDIR)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.gateway
            .as_ref()
            .and_then(|g| g.upload_dir.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.gateway
            .as_ref()
            .and_then(|g| g.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }

    pub fn max_tracked_jobs(&self) -> usize {
        self.gateway
            .as_ref()
            .and_then(|g| g.max_tracked_jobs)
            .unwrap_or(DEFAULT_MAX_TRACKED_JOBS)
    }

    pub fn groq(&self) -> GroqConfig {
        self.providers
            .as_ref()
            .and_then(|p| p.groq.clone())
            .unwrap_or_default()
    }

    pub fn replicate(&self) -> ReplicateConfig {
        self.providers
            .as_ref()
            .and_then(|p| p.replicate.clone())
            .unwrap_or_default()
    }

    pub fn download(&self) -> DownloadConfig {
        self.download.clone().unwrap_or_default()
    }

    /// Resolve both provider secrets, failing on the first one missing.
    pub fn require_secrets(&self) -> Result<Secrets> {
        let groq = self.groq();
        let groq_api_key = groq.resolve_api_key().ok_or_else(|| {
            ParleyError::Config(format!("{} not set in environment", groq.api_key_env))
        })?;

        let replicate = self.replicate();
        let replicate_api_token = replicate.resolve_api_key().ok_or_else(|| {
            ParleyError::Config(format!("{} not set in environment", replicate.api_key_env))
        })?;

        Ok(Secrets {
            groq_api_key,
            replicate_api_token,
        })
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let groq = self.groq();
        if groq.resolve_api_key().is_none() {
            errors.push(format!(
                "Groq API key missing: set {} or providers.groq.api_key",
                groq.api_key_env
            ));
        }

        let replicate = self.replicate();
        if replicate.resolve_api_key().is_none() {
            errors.push(format!(
                "Replicate API token missing: set {} or providers.replicate.api_key",
                replicate.api_key_env
            ));
        }
        if !replicate.model.contains(':') {
            warnings.push(format!(
                "Replicate model '{}' has no ':<version>' suffix; using it as the version id",
                replicate.model
            ));
        }
        if replicate.poll_interval_ms == 0 {
            errors.push("providers.replicate.poll_interval_ms cannot be 0".to_string());
        }

        if groq.max_tokens > 512 {
            warnings.push(format!(
                "providers.groq.max_tokens is {}; replies may exceed a few sentences",
                groq.max_tokens
            ));
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
            if gw.max_upload_bytes == Some(0) {
                errors.push("gateway.max_upload_bytes cannot be 0".to_string());
            }
        }

        if let Some(format) = self.logging.as_ref().map(|l| l.format.as_str()) {
            if format != "plain" && format != "json" {
                warnings.push(format!("Unknown log format '{format}', falling back to plain"));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for Parley data: `~/.parley/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parley")
}
