use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::model::{Artifact, ArtifactStatus, NewArtifact};
use crate::core::error::{PackError, PackResult};

/// Persistence of hosted server-pack records.
///
/// The retention jobs only need `list`, `get` and `delete`; the hosted
/// pipeline also creates rows and moves them through their statuses.
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    async fn list(&self) -> PackResult<Vec<Artifact>>;

    /// `PackError::ArtifactNotFound` when `id` is unknown.
    async fn get(&self, id: u64) -> PackResult<Artifact>;

    /// `PackError::ArtifactNotFound` when `id` is unknown.
    async fn delete(&self, id: u64) -> PackResult<()>;

    async fn insert(&self, new: NewArtifact, now: DateTime<Utc>) -> PackResult<Artifact>;

    /// Replace the stored row. The stored download counter is kept.
    async fn update(&self, artifact: Artifact) -> PackResult<Artifact>;

    /// Increment the download counter and return the new value.
    async fn record_download(&self, id: u64) -> PackResult<u64>;

    async fn set_status(&self, id: u64, status: ArtifactStatus, now: DateTime<Utc>) -> PackResult<Artifact> {
        let mut artifact = self.get(id).await?;
        artifact.status = status;
        artifact.last_modified = now;
        self.update(artifact).await
    }
}

/// Registry contents shared by the in-memory and JSON implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct RegistryData {
    next_id: u64,
    artifacts: BTreeMap<u64, Artifact>,
}

impl RegistryData {
    pub(crate) fn list(&self) -> Vec<Artifact> {
        self.artifacts.values().cloned().collect()
    }

    pub(crate) fn get(&self, id: u64) -> PackResult<Artifact> {
        self.artifacts.get(&id).cloned().ok_or(PackError::ArtifactNotFound(id))
    }

    pub(crate) fn delete(&mut self, id: u64) -> PackResult<()> {
        self.artifacts
            .remove(&id)
            .map(|_| ())
            .ok_or(PackError::ArtifactNotFound(id))
    }

    pub(crate) fn insert(&mut self, new: NewArtifact, now: DateTime<Utc>) -> Artifact {
        self.next_id = self.next_id.max(self.artifacts.keys().next_back().copied().unwrap_or(0)) + 1;
        let artifact = new.into_artifact(self.next_id, now);
        self.artifacts.insert(artifact.id, artifact.clone());
        artifact
    }

    pub(crate) fn update(&mut self, mut artifact: Artifact) -> PackResult<Artifact> {
        let stored = self
            .artifacts
            .get_mut(&artifact.id)
            .ok_or(PackError::ArtifactNotFound(artifact.id))?;
        artifact.downloads = stored.downloads;
        *stored = artifact.clone();
        Ok(artifact)
    }

    pub(crate) fn record_download(&mut self, id: u64) -> PackResult<u64> {
        let stored = self.artifacts.get_mut(&id).ok_or(PackError::ArtifactNotFound(id))?;
        stored.downloads += 1;
        Ok(stored.downloads)
    }
}

/// Registry that lives only as long as the process.
#[derive(Default)]
pub struct MemoryRegistry {
    data: Mutex<RegistryData>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with `artifacts`, ids kept as given.
    pub fn with_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let artifacts: BTreeMap<u64, Artifact> = artifacts.into_iter().map(|a| (a.id, a)).collect();
        let next_id = artifacts.keys().next_back().copied().unwrap_or(0);
        Self {
            data: Mutex::new(RegistryData { next_id, artifacts }),
        }
    }
}

#[async_trait]
impl ArtifactRegistry for MemoryRegistry {
    async fn list(&self) -> PackResult<Vec<Artifact>> {
        Ok(self.data.lock().await.list())
    }

    async fn get(&self, id: u64) -> PackResult<Artifact> {
        self.data.lock().await.get(id)
    }

    async fn delete(&self, id: u64) -> PackResult<()> {
        self.data.lock().await.delete(id)
    }

    async fn insert(&self, new: NewArtifact, now: DateTime<Utc>) -> PackResult<Artifact> {
        Ok(self.data.lock().await.insert(new, now))
    }

    async fn update(&self, artifact: Artifact) -> PackResult<Artifact> {
        self.data.lock().await.update(artifact)
    }

    async fn record_download(&self, id: u64) -> PackResult<u64> {
        self.data.lock().await.record_download(id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use super::*;

    pub(crate) fn new_artifact(project_id: u32, file_id: u32) -> NewArtifact {
        NewArtifact {
            project_id,
            file_id,
            archive_path: PathBuf::from(format!("/out/{project_id}-{file_id}_fabric-1.18.2_server_pack.zip")),
            minecraft_version: "1.18.2".into(),
            mod_loader: "Fabric".into(),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let registry = MemoryRegistry::new();
        let now = Utc::now();

        let a = registry.insert(new_artifact(1, 2), now).await.unwrap();
        let b = registry.insert(new_artifact(1, 3), now).await.unwrap();

        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let registry = MemoryRegistry::new();
        assert!(matches!(registry.get(7).await, Err(PackError::ArtifactNotFound(7))));
        assert!(matches!(registry.delete(7).await, Err(PackError::ArtifactNotFound(7))));
        assert!(matches!(registry.record_download(7).await, Err(PackError::ArtifactNotFound(7))));
    }

    #[tokio::test]
    async fn update_keeps_download_counter() {
        let registry = MemoryRegistry::new();
        let now = Utc::now();
        let artifact = registry.insert(new_artifact(1, 2), now).await.unwrap();
        assert_eq!(registry.record_download(artifact.id).await.unwrap(), 1);

        let updated = registry
            .set_status(artifact.id, ArtifactStatus::Available, now)
            .await
            .unwrap();

        assert_eq!(updated.status, ArtifactStatus::Available);
        assert_eq!(updated.downloads, 1);
    }

    #[tokio::test]
    async fn seeded_registry_continues_ids() {
        let now = Utc::now();
        let seeded = new_artifact(5, 6).into_artifact(40, now);
        let registry = MemoryRegistry::with_artifacts([seeded]);

        let next = registry.insert(new_artifact(5, 7), now).await.unwrap();

        assert_eq!(next.id, 41);
    }
}
