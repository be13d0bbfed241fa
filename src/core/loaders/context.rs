use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::downloader::Downloader;
use crate::core::error::PackError;

use super::ModLoader;

/// Everything an installer needs for one server installation.
pub struct InstallContext<'a> {
    pub minecraft_version: &'a str,
    pub loader_version: &'a str,
    pub pack_root: &'a Path,
    /// Normalized java executable (no `.exe`).
    pub java_path: &'a str,
    pub downloader: &'a Downloader,
    /// Upper bound for each external step (download, installer process).
    pub timeout: Duration,
}

impl InstallContext<'_> {
    pub fn error(&self, loader: ModLoader, message: impl Into<String>) -> PackError {
        PackError::Install {
            loader: loader.to_string(),
            version: format!("{} for Minecraft {}", self.loader_version, self.minecraft_version),
            message: message.into(),
        }
    }
}

/// Files an installer left in the pack root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Relative paths staged only to perform the installation (installer
    /// jars, installer logs). The packager can leave them out.
    pub staged: Vec<PathBuf>,
    /// Start scripts copied into the pack root.
    pub scripts: Vec<PathBuf>,
}

impl InstallReport {
    /// Keep only the staged entries that are actually on disk.
    pub fn retain_existing(&mut self, pack_root: &Path) {
        self.staged.retain(|p| pack_root.join(p).exists());
    }
}
