use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::loaders::ModLoader;

/// One server pack generation request, as read from `serverpackcreator.conf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackConfiguration {
    pub modpack_dir: PathBuf,
    /// File names of client-only mods, matched by name only.
    pub client_mods: Vec<String>,
    /// Relative directories to copy. A `saves/` prefix copies that world to
    /// the pack root instead of under `saves/`.
    pub copy_dirs: Vec<String>,
    pub include_server_installation: bool,
    /// Java executable, without a trailing `.exe`.
    pub java_path: String,
    pub minecraft_version: String,
    /// Kept verbatim so the file round-trips; see [`PackConfiguration::loader`].
    pub mod_loader: String,
    pub mod_loader_version: String,
    pub include_server_icon: bool,
    pub include_server_properties: bool,
    pub include_start_scripts: bool,
    pub include_zip_creation: bool,
}

const DEFAULT_CLIENT_MODS: [&str; 24] = [
    "AmbientSounds",
    "BackTools",
    "BetterAdvancement",
    "BetterPing",
    "cherished",
    "ClientTweaks",
    "Controlling",
    "DefaultOptions",
    "durability",
    "dynamic-fps",
    "itemzoom",
    "itemphysic",
    "jei-professions",
    "jeiintegration",
    "justenoughprofessions",
    "MouseTweaks",
    "Neat",
    "OldJavaWarning",
    "PackMenu",
    "preciseblockplacing",
    "SimpleDiscordRichPresence",
    "SpawnerFix",
    "TipTheScales",
    "WorldNameRandomizer",
];

impl Default for PackConfiguration {
    fn default() -> Self {
        Self {
            modpack_dir: PathBuf::from("./Some Modpack"),
            client_mods: DEFAULT_CLIENT_MODS.iter().map(|m| m.to_string()).collect(),
            copy_dirs: ["config", "mods", "scripts", "seeds", "defaultconfigs"]
                .into_iter()
                .map(String::from)
                .collect(),
            include_server_installation: true,
            java_path: "/usr/bin/java".into(),
            minecraft_version: "1.16.5".into(),
            mod_loader: "Forge".into(),
            mod_loader_version: "36.1.2".into(),
            include_server_icon: true,
            include_server_properties: true,
            include_start_scripts: true,
            include_zip_creation: true,
        }
    }
}

impl PackConfiguration {
    pub fn loader(&self) -> Option<ModLoader> {
        ModLoader::parse(&self.mod_loader)
    }

    /// Log the whole configuration so a failed run's log is self-describing.
    pub fn log_summary(&self) {
        info!("Your configuration is:");
        info!("Modpack directory:                {}", self.modpack_dir.display());
        info!("Client mods are:");
        for name in &self.client_mods {
            info!("    {name}");
        }
        info!("Directories to copy:");
        for dir in &self.copy_dirs {
            info!("    {dir}");
        }
        info!("Include server installation:      {}", self.include_server_installation);
        info!("Java Installation path:           {}", self.java_path);
        info!("Minecraft version:                {}", self.minecraft_version);
        info!("Modloader:                        {}", self.mod_loader);
        info!("Modloader Version:                {}", self.mod_loader_version);
        info!("Include server icon:              {}", self.include_server_icon);
        info!("Include server properties:        {}", self.include_server_properties);
        info!("Include start scripts:            {}", self.include_start_scripts);
        info!("Create zip-archive of serverpack: {}", self.include_zip_creation);
    }
}

/// Strip a trailing `.exe` so the same config works on every platform.
pub fn normalize_java_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let len = trimmed.len();
    if len >= 4 && trimmed.is_char_boundary(len - 4) && trimmed[len - 4..].eq_ignore_ascii_case(".exe") {
        trimmed[..len - 4].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Drop repeated entries, keeping the first occurrence.
pub(crate) fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_path_loses_exe_suffix() {
        assert_eq!(normalize_java_path("C:/Java/bin/java.exe"), "C:/Java/bin/java");
        assert_eq!(normalize_java_path("C:/Java/bin/JAVA.EXE"), "C:/Java/bin/JAVA");
        assert_eq!(normalize_java_path("/usr/bin/java"), "/usr/bin/java");
        assert_eq!(normalize_java_path(".exe"), "");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let items = vec!["mods".to_string(), "config".into(), "mods".into()];
        assert_eq!(dedup_preserving_order(items), vec!["mods", "config"]);
    }

    #[test]
    fn loader_is_parsed_from_raw_value() {
        let mut config = PackConfiguration::default();
        assert_eq!(config.loader(), Some(ModLoader::Forge));
        config.mod_loader = "LiteLoader".into();
        assert_eq!(config.loader(), None);
    }
}
