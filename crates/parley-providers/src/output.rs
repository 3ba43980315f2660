//! Decoding and URL extraction for speech synthesis output.
//!
//! The TTS provider does not commit to a response shape: depending on the
//! model and client version the audio location shows up as a bare string, a
//! list of files, a nested mapping, or a prediction object. Responses are
//! decoded into [`SynthesisOutput`] at the network boundary and searched
//! depth-first, first match wins.

use std::sync::LazyLock;

use regex::Regex;
use tracing::error;

use parley_core::error::ParleyError;

/// Attributes probed on provider records, in priority order.
const PROBED_ATTRIBUTES: [&str; 5] = ["output", "result", "url", "audio", "audio_url"];

/// Suffixes accepted as a bare audio filename.
const AUDIO_EXTENSIONS: [&str; 4] = [".wav", ".mp3", ".m4a", ".ogg"];

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Decoded TTS provider output.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutput {
    Null,
    Text(String),
    Sequence(Vec<SynthesisOutput>),
    /// Key/value pairs in the order the provider sent them.
    Mapping(Vec<(String, SynthesisOutput)>),
    Record(ProviderRecord),
    /// Any other scalar, kept in textual form.
    Other(String),
}

/// An opaque provider object: named attributes, an optional structured
/// form, and a textual representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRecord {
    pub kind: String,
    pub attributes: Vec<(String, SynthesisOutput)>,
    pub structured: Option<Box<SynthesisOutput>>,
    pub repr: String,
}

impl ProviderRecord {
    pub fn attribute(&self, name: &str) -> Option<&SynthesisOutput> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

impl SynthesisOutput {
    /// Decode a plain JSON value structurally.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
            other @ (Value::Bool(_) | Value::Number(_)) => Self::Other(other.to_string()),
        }
    }

    /// Decode the `output` of a finished prediction.
    ///
    /// Only `output` is searched; `input`, `urls` and `logs` never are. An
    /// object output becomes a provider record whose structured form is the
    /// same mapping. Anything else decodes structurally, and a missing
    /// output is `Null`.
    pub fn from_prediction(mut prediction: serde_json::Value) -> Self {
        let output = prediction
            .get_mut("output")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);

        match output {
            serde_json::Value::Object(map) => {
                let repr = serde_json::Value::Object(map.clone()).to_string();
                let attributes = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v.clone())))
                    .collect();
                Self::Record(ProviderRecord {
                    kind: "prediction_output".into(),
                    attributes,
                    structured: Some(Box::new(Self::from_json(serde_json::Value::Object(map)))),
                    repr,
                })
            }
            other => Self::from_json(other),
        }
    }

    /// Depth-first search for an HTTP(S) URL or an audio filename.
    pub fn find_audio_url(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(text) => {
                if let Some(m) = URL_RE.find(text) {
                    return Some(m.as_str().to_string());
                }
                if AUDIO_EXTENSIONS.iter().any(|ext| text.ends_with(ext)) {
                    return Some(text.clone());
                }
                None
            }
            Self::Sequence(items) => items.iter().find_map(Self::find_audio_url),
            Self::Mapping(entries) => entries
                .iter()
                .find_map(|(_, value)| value.find_audio_url())
                // URLs echoed back as keys are accepted as a last resort.
                .or_else(|| entries.iter().find_map(|(key, _)| find_url(key))),
            Self::Record(record) => {
                let probed = PROBED_ATTRIBUTES
                    .iter()
                    .filter_map(|name| record.attribute(name))
                    .find_map(Self::find_audio_url);
                if probed.is_some() {
                    return probed;
                }
                match &record.structured {
                    Some(structured) => structured.find_audio_url(),
                    None => find_url(&record.repr),
                }
            }
            Self::Other(repr) => find_url(repr),
        }
    }
}

fn find_url(text: &str) -> Option<String> {
    URL_RE.find(text).map(|m| m.as_str().to_string())
}

/// Locate the playable audio URL in a synthesis response.
pub fn extract_audio_url(output: &SynthesisOutput) -> Result<String, ParleyError> {
    match output.find_audio_url() {
        Some(url) => Ok(url),
        None => {
            error!(?output, "Unexpected TTS output format");
            Err(ParleyError::UnrecognizedShape)
        }
    }
}
