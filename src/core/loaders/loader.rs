use serde::{Deserialize, Serialize};

use crate::core::templates::{FABRIC_BAT, FABRIC_SH, FORGE_BAT, FORGE_SH};

/// Supported mod loaders. Anything else is rejected at dispatch time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModLoader {
    Forge,
    Fabric,
}

impl ModLoader {
    /// Exactly `Forge` or `Fabric`. Other spellings are unknown loaders.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Forge" => Some(ModLoader::Forge),
            "Fabric" => Some(ModLoader::Fabric),
            _ => None,
        }
    }

    /// Lowercase form used in file names.
    pub fn slug(self) -> &'static str {
        match self {
            ModLoader::Forge => "forge",
            ModLoader::Fabric => "fabric",
        }
    }

    /// `(windows, unix)` start scripts for this loader.
    pub fn start_scripts(self) -> [&'static str; 2] {
        match self {
            ModLoader::Forge => [FORGE_BAT, FORGE_SH],
            ModLoader::Fabric => [FABRIC_BAT, FABRIC_SH],
        }
    }
}

impl std::fmt::Display for ModLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModLoader::Forge => write!(f, "Forge"),
            ModLoader::Fabric => write!(f, "Fabric"),
        }
    }
}
