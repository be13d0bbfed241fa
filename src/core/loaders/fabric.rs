use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::context::{InstallContext, InstallReport};
use super::installer::{run_java, ServerInstaller};
use super::ModLoader;
use crate::core::error::PackResult;
use crate::core::maven::{MavenCoordinate, MavenMetadata};

const INSTALLER_GROUP: &str = "net.fabricmc";
const INSTALLER_ARTIFACT: &str = "fabric-installer";

/// Installs a Fabric server with the latest released fabric-installer.
pub struct FabricInstaller {
    maven: String,
}

impl FabricInstaller {
    pub fn new(maven: String) -> Self {
        Self { maven }
    }

    async fn installer_version(&self, ctx: &InstallContext<'_>) -> PackResult<String> {
        let url = MavenCoordinate::metadata_url(&self.maven, INSTALLER_GROUP, INSTALLER_ARTIFACT);
        let xml = ctx
            .downloader
            .fetch_text(&url)
            .await
            .ok_or_else(|| ctx.error(ModLoader::Fabric, format!("could not fetch {url}")))?;
        let metadata = MavenMetadata::parse(&xml)
            .map_err(|e| ctx.error(ModLoader::Fabric, format!("invalid installer metadata: {e}")))?;
        metadata
            .release()
            .map(str::to_string)
            .ok_or_else(|| ctx.error(ModLoader::Fabric, "installer metadata lists no release"))
    }

    /// Download the latest released installer into the pack root and return
    /// its file name.
    async fn fetch_installer(&self, ctx: &InstallContext<'_>) -> PackResult<String> {
        let version = self.installer_version(ctx).await?;
        let coordinate = MavenCoordinate {
            group_id: INSTALLER_GROUP.into(),
            artifact_id: INSTALLER_ARTIFACT.into(),
            version,
            classifier: None,
        };
        let url = coordinate.url(&self.maven);
        let file_name = coordinate.file_name();
        let path = ctx.pack_root.join(&file_name);
        let checksum = ctx.downloader.fetch_text(&format!("{url}.sha1")).await;
        ctx.downloader
            .download_file(&url, &path, checksum.as_deref())
            .await
            .map_err(|e| ctx.error(ModLoader::Fabric, format!("could not download {url}: {e}")))?;
        Ok(file_name)
    }

    fn installer_args(installer_name: &str, minecraft_version: &str, loader_version: &str) -> Vec<String> {
        [
            "-jar",
            installer_name,
            "server",
            "-mcversion",
            minecraft_version,
            "-loader",
            loader_version,
            "-downloadMinecraft",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

#[async_trait]
impl ServerInstaller for FabricInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> PackResult<InstallReport> {
        info!(
            "Installing Fabric {} server for Minecraft {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let installer_name = match tokio::time::timeout(ctx.timeout, self.fetch_installer(&ctx)).await {
            Ok(result) => result?,
            Err(_) => return Err(ctx.error(ModLoader::Fabric, "installer download timed out")),
        };

        let args = Self::installer_args(&installer_name, ctx.minecraft_version, ctx.loader_version);
        run_java(&ctx, ModLoader::Fabric, &args).await?;

        let mut report = InstallReport {
            staged: vec![PathBuf::from(installer_name)],
            scripts: Vec::new(),
        };
        report.retain_existing(ctx.pack_root);

        info!("Fabric server installed");
        Ok(report)
    }
}
