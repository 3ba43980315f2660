//! Streamed download of synthesized audio to the output directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use parley_core::config::DownloadConfig;

/// Fetches remote audio chunk by chunk so memory stays bounded.
#[derive(Clone)]
pub struct AudioDownloader {
    client: reqwest::Client,
}

impl AudioDownloader {
    pub fn new(config: &DownloadConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// Data goes to `<dest>.part` first and is renamed into place once
    /// complete; on failure the partial file is removed and `dest` is never
    /// created.
    pub async fn download_to(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        let part = part_path(dest);
        match self.stream_into(url, &part).await {
            Ok(written) => {
                tokio::fs::rename(&part, dest).await?;
                info!(path = %dest.display(), bytes = written, "Audio saved");
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn stream_into(&self, url: &str, part: &Path) -> anyhow::Result<u64> {
        debug!(url, "Downloading audio");

        let resp = self.client.get(url).send().await?.error_for_status()?;

        if let Some(parent) = part.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(part).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| anyhow::anyhow!("audio stream error: {e}"))?;
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{http::StatusCode, routing::get, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/srv/out/abc.mp3")),
            PathBuf::from("/srv/out/abc.mp3.part")
        );
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let audio = vec![7u8; 100_000];
        let body = audio.clone();
        let base = serve(Router::new().route("/a.mp3", get(move || async move { body }))).await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tts_outputs").join("reply.mp3");
        let downloader = AudioDownloader::new(&DownloadConfig::default()).unwrap();

        let written = downloader
            .download_to(&format!("{base}/a.mp3"), &dest)
            .await
            .unwrap();
        assert_eq!(written, 100_000);
        assert_eq!(std::fs::read(&dest).unwrap(), audio);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_file() {
        let base = serve(Router::new().route(
            "/gone.mp3",
            get(|| async { StatusCode::NOT_FOUND }),
        ))
        .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("reply.mp3");
        let downloader = AudioDownloader::new(&DownloadConfig::default()).unwrap();

        let result = downloader
            .download_to(&format!("{base}/gone.mp3"), &dest)
            .await;
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_relative_reference_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("reply.mp3");
        let downloader = AudioDownloader::new(&DownloadConfig::default()).unwrap();

        assert!(downloader.download_to("reply_0001.wav", &dest).await.is_err());
        assert!(!dest.exists());
    }
}
