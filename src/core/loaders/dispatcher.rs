use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::context::{InstallContext, InstallReport};
use super::installer::{Installer, ServerInstaller};
use super::ModLoader;
use crate::core::downloader::Downloader;
use crate::core::error::{PackError, PackResult};
use crate::core::templates::bundled_server_file;
use crate::core::version::Endpoints;

/// Result of handing a pack root to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The loader's server runtime was installed (scripts listed in the report).
    Installed(InstallReport),
    /// Installation was skipped, only the start scripts were copied.
    ScriptsCopied(Vec<PathBuf>),
    /// The configured loader is neither Forge nor Fabric. Nothing was done.
    UnknownLoader(String),
}

/// Routes a pack to the installer of its mod loader and adds start scripts.
pub struct LoaderDispatcher {
    downloader: Downloader,
    server_files_dir: PathBuf,
    endpoints: Endpoints,
    timeout: Duration,
}

impl LoaderDispatcher {
    pub fn new(downloader: Downloader, server_files_dir: PathBuf, endpoints: Endpoints, timeout: Duration) -> Self {
        Self {
            downloader,
            server_files_dir,
            endpoints,
            timeout,
        }
    }

    /// Install the server runtime for `loader` into `pack_root`, then copy
    /// the start scripts when `include_scripts` is set.
    ///
    /// An installer failure or timeout is returned as an error and no
    /// scripts are copied.
    pub async fn install_and_script(
        &self,
        loader: &str,
        pack_root: &Path,
        minecraft_version: &str,
        loader_version: &str,
        java_path: &str,
        include_scripts: bool,
    ) -> PackResult<DispatchOutcome> {
        let Some(parsed) = ModLoader::parse(loader) else {
            warn!(loader, "Specified invalid modloader, skipping server installation");
            return Ok(DispatchOutcome::UnknownLoader(loader.to_string()));
        };

        let installer = Installer::new(parsed, &self.endpoints);
        let report = self
            .run_with(&installer, parsed, pack_root, minecraft_version, loader_version, java_path, include_scripts)
            .await?;
        Ok(DispatchOutcome::Installed(report))
    }

    /// Copy start scripts for a run that skips the server installation.
    pub fn scripts_only(&self, loader: &str, pack_root: &Path) -> PackResult<DispatchOutcome> {
        match ModLoader::parse(loader) {
            Some(parsed) => Ok(DispatchOutcome::ScriptsCopied(self.copy_start_scripts(parsed, pack_root)?)),
            None => {
                warn!(loader, "Specified invalid modloader, not copying start scripts");
                Ok(DispatchOutcome::UnknownLoader(loader.to_string()))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_with<I: ServerInstaller>(
        &self,
        installer: &I,
        loader: ModLoader,
        pack_root: &Path,
        minecraft_version: &str,
        loader_version: &str,
        java_path: &str,
        include_scripts: bool,
    ) -> PackResult<InstallReport> {
        let ctx = InstallContext {
            minecraft_version,
            loader_version,
            pack_root,
            java_path,
            downloader: &self.downloader,
            timeout: self.timeout,
        };
        let mut report = installer.install(ctx).await?;

        if include_scripts {
            report.scripts = self.copy_start_scripts(loader, pack_root)?;
        }
        Ok(report)
    }

    /// Copy `start-<loader>.bat` and `start-<loader>.sh` into `pack_root`,
    /// overwriting existing files. Falls back to the bundled script when the
    /// editable copy in `server_files/` is missing.
    pub fn copy_start_scripts(&self, loader: ModLoader, pack_root: &Path) -> PackResult<Vec<PathBuf>> {
        info!("Copying {loader} start scripts...");
        let mut copied = Vec::new();

        for name in loader.start_scripts() {
            let source = self.server_files_dir.join(name);
            let bytes = match std::fs::read(&source) {
                Ok(bytes) => bytes,
                Err(e) => {
                    let bundled = bundled_server_file(name).ok_or_else(|| PackError::io(&source, e))?;
                    warn!(file = ?source, "Start script missing from server_files, using bundled default");
                    bundled.to_vec()
                }
            };

            let target = pack_root.join(name);
            std::fs::write(&target, bytes).map_err(|e| PackError::io(&target, e))?;
            make_executable(&target)?;
            copied.push(PathBuf::from(name));
        }

        Ok(copied)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> PackResult<()> {
    use std::os::unix::fs::PermissionsExt;

    if path.extension().is_some_and(|ext| ext == "sh") {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| PackError::io(path, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> PackResult<()> {
    Ok(())
}
