//! Gateway integration tests: start a real gateway with fake providers and
//! drive it over HTTP.
//!
//! Run with: `cargo test -p parley-gateway --test integration`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use serde_json::Value;

use parley_core::config::{Config, GatewayConfig};
use parley_gateway::{GatewayState, Providers};
use parley_providers::{ChatModel, ChatRequest, SpeechSynthesizer, SynthesisOutput, Transcriber};

const FAKE_AUDIO: &[u8] = b"ID3\x04\x00fake-mp3-payload";

/// Find an available port.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

struct FakeStt {
    fail: bool,
}

#[async_trait]
impl Transcriber for FakeStt {
    async fn transcribe(&self, audio: &Path, _language: Option<&str>) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("upstream 503");
        }
        let len = std::fs::metadata(audio)?.len();
        anyhow::ensure!(len > 0, "empty upload");
        Ok("Good morning, I would like a coffee.".into())
    }
}

struct FakeChat;

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> {
        Ok(format!(" Reply for: {} ", request.user))
    }
}

/// Answers like Replicate does for kokoro: a nested output carrying the URL.
struct FakeTts {
    audio_url: String,
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, _text: &str) -> anyhow::Result<SynthesisOutput> {
        Ok(SynthesisOutput::from_json(serde_json::json!({
            "metadata": {"model": "kokoro"},
            "files": [{"audio": self.audio_url}],
        })))
    }
}

/// Serve a fixed audio payload standing in for the provider's CDN.
async fn start_fake_cdn() -> String {
    let app = axum::Router::new().route("/out/reply.mp3", get(|| async { FAKE_AUDIO }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/out/reply.mp3")
}

/// Build a gateway with fake providers and return its state, port and root dir.
async fn start_test_gateway(
    stt_fails: bool,
) -> (Arc<GatewayState>, u16, tempfile::TempDir) {
    let port = find_free_port();
    let root = tempfile::tempdir().unwrap();

    let config = Config {
        gateway: Some(GatewayConfig {
            port,
            bind: Some("127.0.0.1".into()),
            static_dir: Some(root.path().join("static").display().to_string()),
            upload_dir: Some(root.path().join("uploads").display().to_string()),
            max_upload_bytes: None,
            max_tracked_jobs: None,
        }),
        ..Default::default()
    };

    let providers = Providers {
        transcriber: Arc::new(FakeStt { fail: stt_fails }),
        chat: Arc::new(FakeChat),
        synthesizer: Arc::new(FakeTts {
            audio_url: start_fake_cdn().await,
        }),
    };

    let state = Arc::new(GatewayState::new(Arc::new(config), providers).unwrap());

    // Start gateway in background
    let state_clone = state.clone();
    tokio::spawn(async move {
        let _ = parley_gateway::start_gateway(state_clone, "127.0.0.1", port).await;
    });

    // Wait for gateway to be ready
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .is_ok()
        {
            break;
        }
    }

    (state, port, root)
}

fn upload_form(lang: &str, target_lang: &str) -> reqwest::multipart::Form {
    let wav = parley_media::wav::tone_wav(2.0, 440.0);
    let part = reqwest::multipart::Part::bytes(wav)
        .file_name("speech.wav")
        .mime_str("audio/wav")
        .unwrap();
    reqwest::multipart::Form::new()
        .part("file", part)
        .text("lang", lang.to_string())
        .text("target_lang", target_lang.to_string())
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_state, port, _root) = start_test_gateway(false).await;

    let body: Value = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["jobs_pending"], 0);
}

#[tokio::test]
async fn test_conversation_end_to_end() {
    let (state, port, root) = start_test_gateway(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://127.0.0.1:{port}/"))
        .multipart(upload_form("en", "fr"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["transcript"], "Good morning, I would like a coffee.");
    assert_eq!(
        body["reply_text"],
        "Reply for: Good morning, I would like a coffee."
    );

    let url = body["reply_audio_url"].as_str().unwrap().to_string();
    let id = url
        .strip_prefix("/static/tts_outputs/")
        .and_then(|rest| rest.strip_suffix(".mp3"))
        .expect("reply_audio_url should name an mp3 under /static/tts_outputs");
    assert!(uuid::Uuid::parse_str(id).is_ok());

    // The audio appears once the background job finishes.
    let mut served = None;
    for _ in 0..50 {
        let resp = client
            .get(format!("http://127.0.0.1:{port}{url}"))
            .send()
            .await
            .unwrap();
        if resp.status() == 200 {
            served = Some(resp.bytes().await.unwrap());
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(served.as_deref(), Some(FAKE_AUDIO));

    let job: Value = client
        .get(format!("http://127.0.0.1:{port}/jobs/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(job["state"], "done");
    assert_eq!(job["reply_audio_url"], url);

    assert!(dir_is_empty(&root.path().join("uploads")));
    assert_eq!(state.jobs.pending_count().await, 0);
}

#[tokio::test]
async fn test_pipeline_failure_is_generic_on_root() {
    let (_state, port, root) = start_test_gateway(true).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/"))
        .multipart(upload_form("auto", "en"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let text = resp.text().await.unwrap();
    assert_eq!(text, "Internal Server Error");
    assert!(!text.contains("upstream 503"));
    assert!(dir_is_empty(&root.path().join("uploads")));
}

#[tokio::test]
async fn test_pipeline_failure_is_structured_on_conversation() {
    let (_state, port, _root) = start_test_gateway(true).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/conversation"))
        .multipart(upload_form("en", "de"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["stage"], "stt");
    assert!(body["message"].as_str().unwrap().contains("upstream 503"));
}

#[tokio::test]
async fn test_missing_file_is_bad_request() {
    let (_state, port, _root) = start_test_gateway(false).await;

    let form = reqwest::multipart::Form::new().text("lang", "en");
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let (_state, port, _root) = start_test_gateway(false).await;

    let resp = reqwest::get(format!(
        "http://127.0.0.1:{port}/jobs/00000000-0000-4000-8000-000000000000"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
}
