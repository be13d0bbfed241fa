use std::path::Path;

use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{PackError, PackResult};

/// Single-file downloader with optional SHA-1 validation.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`, optionally validating SHA-1.
    ///
    /// Creates parent directories as needed. The file is only written once
    /// the whole body has been received and validated.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> PackResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PackError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        if let Some(expected) = sha1_expected {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(PackError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.trim().to_string(),
                    actual,
                });
            }
        }

        // Handle dropped before returning so Windows releases the lock.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| PackError::io(dest, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| PackError::io(dest, e))?;
            file.flush().await.map_err(|e| PackError::io(dest, e))?;
        }

        debug!(url, dest = ?dest, bytes = bytes.len(), "downloaded");
        Ok(())
    }

    /// Fetch a small text document such as a `.sha1` sidecar.
    /// Returns `None` on any failure.
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
