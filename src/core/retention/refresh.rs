use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::core::error::{PackError, PackResult};
use crate::core::maven::MavenMetadata;
use crate::core::version::{ManifestFormat, TrackedManifest};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

/// Job C: keeps `manifests/` in sync with the upstream documents.
pub struct ManifestRefresher {
    client: Client,
    manifests: Vec<TrackedManifest>,
    cache_dir: PathBuf,
    timeout: Duration,
}

impl ManifestRefresher {
    pub fn new(client: Client, manifests: Vec<TrackedManifest>, cache_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            client,
            manifests,
            cache_dir,
            timeout,
        }
    }

    pub fn cached_path(&self, manifest: &TrackedManifest) -> PathBuf {
        self.cache_dir.join(manifest.file_name)
    }

    /// Refresh every tracked manifest. A failure leaves that manifest's
    /// previous cache untouched and does not stop the others.
    pub async fn refresh_all(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        for manifest in &self.manifests {
            match self.refresh(manifest).await {
                Ok(()) => {
                    info!(manifest = manifest.file_name, "Refreshed manifest");
                    summary.refreshed.push(manifest.file_name);
                }
                Err(e) => {
                    warn!(manifest = manifest.file_name, url = %manifest.url, error = %e, "Could not refresh manifest");
                    summary.failed.push((manifest.file_name, e.to_string()));
                }
            }
        }
        summary
    }

    async fn refresh(&self, manifest: &TrackedManifest) -> PackResult<()> {
        let body = tokio::time::timeout(self.timeout, self.fetch(&manifest.url))
            .await
            .map_err(|_| PackError::Other(format!("{} did not answer in time", manifest.url)))??;
        validate(manifest.format, &body)?;
        replace(&self.cached_path(manifest), &body).await
    }

    async fn fetch(&self, url: &str) -> PackResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PackError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

fn validate(format: ManifestFormat, body: &str) -> PackResult<()> {
    match format {
        ManifestFormat::Json => {
            serde_json::from_str::<serde_json::Value>(body)?;
        }
        ManifestFormat::Xml => {
            let metadata = MavenMetadata::parse(body)?;
            if metadata.versioning.versions.items.is_empty() {
                return Err(PackError::Other("maven metadata lists no versions".into()));
            }
        }
    }
    Ok(())
}

async fn replace(target: &Path, body: &str) -> PackResult<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PackError::io(parent, e))?;
    }
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| PackError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, target)
        .await
        .map_err(|e| PackError::io(target, e))
}
