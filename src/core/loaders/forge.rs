use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::context::{InstallContext, InstallReport};
use super::installer::{run_java, ServerInstaller};
use super::ModLoader;
use crate::core::error::PackResult;
use crate::core::maven::MavenCoordinate;

/// Installs a Forge server by running the official installer jar with
/// `--installServer` inside the pack root.
pub struct ForgeInstaller {
    maven: String,
}

impl ForgeInstaller {
    pub fn new(maven: String) -> Self {
        Self { maven }
    }

    /// `net.minecraftforge:forge:<mc>-<forge>:installer`
    pub fn installer_coordinate(minecraft_version: &str, forge_version: &str) -> MavenCoordinate {
        MavenCoordinate {
            group_id: "net.minecraftforge".into(),
            artifact_id: "forge".into(),
            version: format!("{minecraft_version}-{forge_version}"),
            classifier: Some("installer".into()),
        }
    }

    fn installer_args(installer_name: &str) -> Vec<String> {
        vec!["-jar".into(), installer_name.into(), "--installServer".into()]
    }
}

#[async_trait]
impl ServerInstaller for ForgeInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> PackResult<InstallReport> {
        info!(
            "Installing Forge {} server for Minecraft {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let coordinate = Self::installer_coordinate(ctx.minecraft_version, ctx.loader_version);
        let installer_name = coordinate.file_name();
        let installer_url = coordinate.url(&self.maven);
        let installer_path = ctx.pack_root.join(&installer_name);

        let download = async {
            let checksum = ctx.downloader.fetch_text(&format!("{installer_url}.sha1")).await;
            ctx.downloader
                .download_file(&installer_url, &installer_path, checksum.as_deref())
                .await
        };
        match tokio::time::timeout(ctx.timeout, download).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ctx.error(ModLoader::Forge, format!("could not download {installer_url}: {e}"))),
            Err(_) => return Err(ctx.error(ModLoader::Forge, format!("download of {installer_url} timed out"))),
        }

        run_java(&ctx, ModLoader::Forge, &Self::installer_args(&installer_name)).await?;

        let mut report = InstallReport {
            staged: vec![
                PathBuf::from(&installer_name),
                PathBuf::from(format!("{installer_name}.log")),
                PathBuf::from("installer.log"),
            ],
            scripts: Vec::new(),
        };
        report.retain_existing(ctx.pack_root);

        info!("Forge server installed");
        Ok(report)
    }
}
