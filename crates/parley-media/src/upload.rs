//! Scoped storage for uploaded audio.
//!
//! The upload lives in a uniquely named `.wav` temp file for exactly as long
//! as the [`StagedUpload`] value does. Dropping it removes the file, which
//! covers early returns, errors, panics, and cancelled request futures.

use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::debug;

const UPLOAD_PREFIX: &str = "upload_";
const UPLOAD_SUFFIX: &str = ".wav";

pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Write `bytes` to a fresh temp file inside `dir`.
    pub async fn stage(dir: &Path, bytes: Bytes) -> std::io::Result<Self> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::stage_blocking(&dir, &bytes))
            .await
            .map_err(std::io::Error::other)?
    }

    fn stage_blocking(dir: &Path, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(UPLOAD_PREFIX)
            .suffix(UPLOAD_SUFFIX)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        debug!(path = %file.path().display(), bytes = bytes.len(), "Staged upload");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
