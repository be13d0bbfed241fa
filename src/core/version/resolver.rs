use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{Endpoints, Lookup, VersionEntry, VersionManifest};
use crate::core::loaders::forge::ForgeInstaller;
use crate::core::loaders::ModLoader;
use crate::core::maven::{MavenCoordinate, MavenMetadata};

/// Server launch profile published by Fabric meta.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricServerProfile {
    pub id: String,
    pub inherits_from: String,
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<FabricLibrary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FabricLibrary {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderDetails {
    Fabric(FabricServerProfile),
    Forge { installer_url: String },
}

/// Read-only lookups against the upstream manifests.
///
/// One request per call, bounded by `timeout`, never retried. Every failure
/// becomes `Lookup::Unavailable`.
pub struct VersionResolver {
    client: Client,
    endpoints: Endpoints,
    timeout: Duration,
}

impl VersionResolver {
    pub fn new(client: Client, endpoints: Endpoints, timeout: Duration) -> Self {
        Self {
            client,
            endpoints,
            timeout,
        }
    }

    pub async fn resolve_loader_details(
        &self,
        loader: ModLoader,
        minecraft_version: &str,
        loader_version: &str,
    ) -> Lookup<LoaderDetails> {
        match loader {
            ModLoader::Fabric => {
                let url = format!(
                    "{}/v2/versions/loader/{minecraft_version}/{loader_version}/server/json",
                    self.endpoints.fabric_meta.trim_end_matches('/')
                );
                match self.fetch(&url).await {
                    Ok(body) => parse_fabric_profile(&body),
                    Err(reason) => Lookup::Unavailable(reason),
                }
            }
            ModLoader::Forge => {
                let url = MavenCoordinate::metadata_url(&self.endpoints.forge_maven, "net.minecraftforge", "forge");
                match self.fetch(&url).await {
                    Ok(body) => forge_details(&body, &self.endpoints.forge_maven, minecraft_version, loader_version),
                    Err(reason) => Lookup::Unavailable(reason),
                }
            }
        }
    }

    /// Entry of `minecraft_version` in Mojang's version manifest.
    pub async fn resolve_minecraft_version(&self, minecraft_version: &str) -> Lookup<VersionEntry> {
        let body = match self.fetch(&self.endpoints.minecraft_manifest).await {
            Ok(body) => body,
            Err(reason) => return Lookup::Unavailable(reason),
        };
        match serde_json::from_str::<VersionManifest>(&body) {
            Ok(manifest) => match manifest.find_version(minecraft_version) {
                Some(entry) => Lookup::Found(entry.clone()),
                None => Lookup::Unavailable(format!("Minecraft {minecraft_version} is not in the version manifest")),
            },
            Err(e) => Lookup::Unavailable(format!("invalid version manifest: {e}")),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        debug!(url, "Fetching manifest");
        let request = async {
            let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("{url} answered HTTP {}", status.as_u16()));
            }
            response.text().await.map_err(|e| e.to_string())
        };
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(format!("{url} did not answer within {}s", self.timeout.as_secs_f32())),
        }
    }
}

fn parse_fabric_profile(body: &str) -> Lookup<LoaderDetails> {
    match serde_json::from_str::<FabricServerProfile>(body) {
        Ok(profile) => Lookup::Found(LoaderDetails::Fabric(profile)),
        Err(e) => Lookup::Unavailable(format!("invalid Fabric server profile: {e}")),
    }
}

fn forge_details(xml: &str, maven: &str, minecraft_version: &str, forge_version: &str) -> Lookup<LoaderDetails> {
    let metadata = match MavenMetadata::parse(xml) {
        Ok(metadata) => metadata,
        Err(e) => return Lookup::Unavailable(format!("invalid Forge metadata: {e}")),
    };
    if !metadata.contains(&format!("{minecraft_version}-{forge_version}")) {
        return Lookup::Unavailable(format!(
            "Forge {forge_version} is not published for Minecraft {minecraft_version}"
        ));
    }
    let coordinate = ForgeInstaller::installer_coordinate(minecraft_version, forge_version);
    Lookup::Found(LoaderDetails::Forge {
        installer_url: coordinate.url(maven),
    })
}
