pub mod manifest;
pub mod resolver;

pub use manifest::{tracked_manifests, ManifestFormat, TrackedManifest, VersionEntry, VersionManifest};
pub use resolver::{FabricLibrary, FabricServerProfile, LoaderDetails, VersionResolver};

use crate::core::maven::{FABRIC_MAVEN, FORGE_MAVEN};

const MINECRAFT_MANIFEST_URL: &str = "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
const FABRIC_META_URL: &str = "https://meta.fabricmc.net";

/// Upstream hosts the resolver, installers and manifest refresher talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub minecraft_manifest: String,
    pub forge_maven: String,
    pub fabric_maven: String,
    pub fabric_meta: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            minecraft_manifest: MINECRAFT_MANIFEST_URL.into(),
            forge_maven: FORGE_MAVEN.into(),
            fabric_maven: FABRIC_MAVEN.into(),
            fabric_meta: FABRIC_META_URL.into(),
        }
    }
}

/// Outcome of an optional upstream lookup. Lookups never fail the caller:
/// anything that went wrong is carried as the `Unavailable` reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Unavailable(String),
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Unavailable(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}
