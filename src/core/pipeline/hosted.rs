use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{BuildMode, BuildOutcome, PackBuilder};
use crate::core::artifact::{ArtifactRegistry, ArtifactStatus, NewArtifact};
use crate::core::config::PackConfiguration;
use crate::core::error::PackResult;
use crate::core::packager::{archive_path_for, pack_root_name};

/// One hosted build: a staged modpack and the configuration to build it with.
#[derive(Debug, Clone)]
pub struct HostedRequest {
    pub project_id: u32,
    pub file_id: u32,
    pub config: PackConfiguration,
}

/// Handle on an accepted hosted build.
pub struct BuildTicket {
    pub artifact_id: u64,
    pub handle: JoinHandle<PackResult<BuildOutcome>>,
}

/// Background builds recorded in an `ArtifactRegistry`.
pub struct PackService {
    builder: Arc<PackBuilder>,
    registry: Arc<dyn ArtifactRegistry>,
}

impl PackService {
    pub fn new(builder: Arc<PackBuilder>, registry: Arc<dyn ArtifactRegistry>) -> Self {
        Self { builder, registry }
    }

    /// Accept a build, record it as `Generating` and run it in the background.
    ///
    /// The modpack is read from `work/<project>/<file>`. The artifact becomes
    /// `Available` when the archive was written and `Failed` otherwise.
    /// Aborting the ticket's handle leaves it `Generating` until retention
    /// reaps it.
    pub async fn submit(&self, request: HostedRequest) -> PackResult<BuildTicket> {
        let HostedRequest {
            project_id,
            file_id,
            mut config,
        } = request;
        config.include_zip_creation = true;

        let paths = self.builder.paths();
        let source_dir = paths.staged_source(project_id, file_id);
        let pack_root = paths.server_packs_dir().join(pack_root_name(
            &format!("{project_id}-{file_id}"),
            &config.mod_loader,
            &config.minecraft_version,
        ));
        let lock = self.builder.lock(&pack_root)?;

        let artifact = self
            .registry
            .insert(
                NewArtifact {
                    project_id,
                    file_id,
                    archive_path: archive_path_for(&pack_root, &config.mod_loader, &config.minecraft_version),
                    minecraft_version: config.minecraft_version.clone(),
                    mod_loader: config.mod_loader.clone(),
                },
                Utc::now(),
            )
            .await?;
        let artifact_id = artifact.id;
        info!(id = artifact_id, project_id, file_id, "Accepted server pack build");

        let builder = self.builder.clone();
        let registry = self.registry.clone();
        let handle = tokio::spawn(async move {
            let result = builder.build(lock, &source_dir, &config, BuildMode::Hosted).await;
            let status = match &result {
                Ok(outcome) if outcome.archive.is_some() => ArtifactStatus::Available,
                Ok(_) => ArtifactStatus::Failed,
                Err(e) => {
                    error!(id = artifact_id, error = %e, "Server pack build failed");
                    ArtifactStatus::Failed
                }
            };
            if let Err(e) = registry.set_status(artifact_id, status, Utc::now()).await {
                error!(id = artifact_id, error = %e, "Could not record build result");
            }
            result
        });

        Ok(BuildTicket { artifact_id, handle })
    }
}
