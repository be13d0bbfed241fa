// ─── Version Manifests ───
// Mojang's version manifest v2 and the list of upstream documents kept in
// the local manifest cache.

use serde::Deserialize;

use super::Endpoints;
use crate::core::maven::MavenCoordinate;

/// Top-level Mojang version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    #[serde(rename = "releaseTime")]
    pub release_time: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Xml,
}

/// One upstream document mirrored into `manifests/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedManifest {
    pub file_name: &'static str,
    pub url: String,
    pub format: ManifestFormat,
}

/// Minecraft versions, Forge versions, Fabric loaders and Fabric installers.
pub fn tracked_manifests(endpoints: &Endpoints) -> Vec<TrackedManifest> {
    vec![
        TrackedManifest {
            file_name: "minecraft-manifest.json",
            url: endpoints.minecraft_manifest.clone(),
            format: ManifestFormat::Json,
        },
        TrackedManifest {
            file_name: "forge-manifest.xml",
            url: MavenCoordinate::metadata_url(&endpoints.forge_maven, "net.minecraftforge", "forge"),
            format: ManifestFormat::Xml,
        },
        TrackedManifest {
            file_name: "fabric-loader-manifest.json",
            url: format!("{}/v2/versions/loader", endpoints.fabric_meta.trim_end_matches('/')),
            format: ManifestFormat::Json,
        },
        TrackedManifest {
            file_name: "fabric-installer-manifest.xml",
            url: MavenCoordinate::metadata_url(&endpoints.fabric_maven, "net.fabricmc", "fabric-installer"),
            format: ManifestFormat::Xml,
        },
    ]
}
