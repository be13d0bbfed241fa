use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::packager::expanded_dir_for;

/// Lifecycle state of a hosted server pack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// Accepted, build still running.
    Generating,
    /// Archive written and downloadable.
    Available,
    /// The build failed.
    Failed,
}

/// Registry row for one generated server pack.
///
/// `downloads` only ever grows, through `ArtifactRegistry::record_download`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub id: u64,
    pub project_id: u32,
    pub file_id: u32,
    pub archive_path: PathBuf,
    pub status: ArtifactStatus,
    pub last_modified: DateTime<Utc>,
    pub downloads: u64,
    pub minecraft_version: String,
    pub mod_loader: String,
}

impl Artifact {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_modified
    }

    /// Unpacked pack root beside the archive.
    pub fn expanded_dir(&self) -> Option<PathBuf> {
        expanded_dir_for(&self.archive_path)
    }
}

/// Fields supplied when a hosted build is accepted. The registry assigns
/// the id, the timestamps and the `Generating` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtifact {
    pub project_id: u32,
    pub file_id: u32,
    pub archive_path: PathBuf,
    pub minecraft_version: String,
    pub mod_loader: String,
}

impl NewArtifact {
    pub fn into_artifact(self, id: u64, now: DateTime<Utc>) -> Artifact {
        Artifact {
            id,
            project_id: self.project_id,
            file_id: self.file_id,
            archive_path: self.archive_path,
            status: ArtifactStatus::Generating,
            last_modified: now,
            downloads: 0,
            minecraft_version: self.minecraft_version,
            mod_loader: self.mod_loader,
        }
    }
}
