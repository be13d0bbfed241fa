use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::model::{Artifact, NewArtifact};
use super::registry::{ArtifactRegistry, RegistryData};
use crate::core::error::{PackError, PackResult};

/// Registry persisted as one JSON document.
///
/// Every mutation rewrites the document through a temp file and a rename.
/// The in-memory copy only changes once the write succeeded.
pub struct JsonRegistry {
    path: PathBuf,
    data: Mutex<RegistryData>,
}

impl JsonRegistry {
    /// Open the registry at `path`, starting empty when the file is absent.
    pub async fn open(path: impl Into<PathBuf>) -> PackResult<Self> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str::<RegistryData>(&json)
                .map_err(|e| PackError::Registry(format!("{} is not a valid registry: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryData::default(),
            Err(e) => return Err(PackError::io(&path, e)),
        };
        info!(path = ?path, artifacts = data.list().len(), "Opened artifact registry");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Apply `change` to a copy of the registry, persist it, then publish it.
    async fn mutate<T>(&self, change: impl FnOnce(&mut RegistryData) -> PackResult<T>) -> PackResult<T> {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        let value = change(&mut next)?;
        save(&self.path, &next).await?;
        *guard = next;
        Ok(value)
    }
}

async fn save(path: &Path, data: &RegistryData) -> PackResult<()> {
    let json = serde_json::to_string_pretty(data)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PackError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| PackError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PackError::io(path, e))?;

    debug!(path = ?path, "Artifact registry saved");
    Ok(())
}

#[async_trait]
impl ArtifactRegistry for JsonRegistry {
    async fn list(&self) -> PackResult<Vec<Artifact>> {
        Ok(self.data.lock().await.list())
    }

    async fn get(&self, id: u64) -> PackResult<Artifact> {
        self.data.lock().await.get(id)
    }

    async fn delete(&self, id: u64) -> PackResult<()> {
        self.mutate(|data| data.delete(id)).await
    }

    async fn insert(&self, new: NewArtifact, now: DateTime<Utc>) -> PackResult<Artifact> {
        self.mutate(|data| Ok(data.insert(new, now))).await
    }

    async fn update(&self, artifact: Artifact) -> PackResult<Artifact> {
        self.mutate(|data| data.update(artifact)).await
    }

    async fn record_download(&self, id: u64) -> PackResult<u64> {
        self.mutate(|data| data.record_download(id)).await
    }
}
