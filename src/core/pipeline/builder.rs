use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::guard::{BuildLock, BuildLocks, PartialBuildGuard};
use super::{BuildMode, BuildOutcome, PipelineOptions};
use crate::core::config::PackConfiguration;
use crate::core::copy::{copy_directories_until, exclude_client_mods};
use crate::core::downloader::Downloader;
use crate::core::error::{PackError, PackResult};
use crate::core::loaders::{DispatchOutcome, LoaderDispatcher, ModLoader};
use crate::core::packager::{archive_path_for, ArchiveOptions, Packager};
use crate::core::paths::PackPaths;
use crate::core::templates::{bundled_server_file, SERVER_ICON, SERVER_PROPERTIES};
use crate::core::version::{Lookup, VersionResolver};

/// Assembles server packs. Shared by both pipelines.
pub struct PackBuilder {
    paths: Arc<PackPaths>,
    dispatcher: LoaderDispatcher,
    resolver: VersionResolver,
    locks: BuildLocks,
    options: PipelineOptions,
}

impl PackBuilder {
    pub fn new(paths: Arc<PackPaths>, client: Client, options: PipelineOptions) -> Self {
        let dispatcher = LoaderDispatcher::new(
            Downloader::new(client.clone()),
            paths.server_files_dir(),
            options.endpoints.clone(),
            options.installer_timeout,
        );
        let resolver = VersionResolver::new(client, options.endpoints.clone(), options.fetch_timeout);
        Self {
            paths,
            dispatcher,
            resolver,
            locks: BuildLocks::new(),
            options,
        }
    }

    pub fn paths(&self) -> &PackPaths {
        &self.paths
    }

    /// Claim `pack_root` for a build.
    pub fn lock(&self, pack_root: &Path) -> PackResult<BuildLock> {
        self.locks.acquire(pack_root)
    }

    /// Build the pack for `config` from `source_dir` into the locked pack root.
    ///
    /// Any error, or dropping the returned future, removes the partially
    /// built pack root.
    pub async fn build(
        &self,
        lock: BuildLock,
        source_dir: &Path,
        config: &PackConfiguration,
        mode: BuildMode,
    ) -> PackResult<BuildOutcome> {
        let pack_root = lock.pack_root().to_path_buf();
        let loader = config.loader();
        if loader.is_none() && mode == BuildMode::SingleShot {
            return Err(PackError::UnknownLoader(config.mod_loader.clone()));
        }

        config.log_summary();
        if !source_dir.is_dir() {
            return Err(PackError::config(
                "modpackDir",
                format!("{} is not a directory", source_dir.display()),
            ));
        }
        if let (Some(loader), true) = (loader, config.include_server_installation) {
            self.check_versions(loader, config).await;
        }

        remove_previous(&pack_root, config);
        let mut guard = PartialBuildGuard::begin(&pack_root)?;
        guard.hold(lock);

        let (copy, excluded) = {
            let phase = guard.phase();
            let source = source_dir.to_path_buf();
            let root = pack_root.clone();
            let dirs = config.copy_dirs.clone();
            let client_mods = config.client_mods.clone();
            tokio::task::spawn_blocking(move || {
                phase.run(|cancel| -> PackResult<_> {
                    let copy = copy_directories_until(&source, &root, &dirs, cancel)?;
                    let excluded = exclude_client_mods(&root.join("mods"), &client_mods);
                    Ok((copy, excluded))
                })
            })
            .await?
            .ok_or_else(cancelled)??
        };

        let dispatch = if config.include_server_installation {
            Some(
                self.dispatcher
                    .install_and_script(
                        &config.mod_loader,
                        &pack_root,
                        &config.minecraft_version,
                        &config.mod_loader_version,
                        &config.java_path,
                        config.include_start_scripts,
                    )
                    .await?,
            )
        } else if config.include_start_scripts {
            info!("Not installing modded server");
            Some(self.dispatcher.scripts_only(&config.mod_loader, &pack_root)?)
        } else {
            info!("Not installing modded server and not including start scripts");
            None
        };
        if let Some(DispatchOutcome::UnknownLoader(raw)) = &dispatch {
            warn!(loader = %raw, "Server pack built without a server runtime");
        }

        let server_files = copy_server_files(&self.paths.server_files_dir(), &pack_root, config)?;

        let archive = if config.include_zip_creation {
            let options = ArchiveOptions {
                exclude: match &dispatch {
                    Some(DispatchOutcome::Installed(report)) if self.options.exclude_installer_files => {
                        report.staged.clone()
                    }
                    _ => Vec::new(),
                },
            };
            guard.track(archive_path_for(&pack_root, &config.mod_loader, &config.minecraft_version));
            let phase = guard.phase();
            let root = pack_root.clone();
            let loader_name = config.mod_loader.clone();
            let minecraft_version = config.minecraft_version.clone();
            let archive = tokio::task::spawn_blocking(move || {
                phase.run(|_| Packager::archive(&root, &loader_name, &minecraft_version, &options))
            })
            .await?
            .ok_or_else(cancelled)??;
            Some(archive)
        } else {
            info!("Not creating zip archive of server pack");
            None
        };

        guard.disarm();
        info!(pack_root = ?pack_root, "Server pack available");

        Ok(BuildOutcome {
            pack_root,
            copy,
            excluded,
            dispatch,
            server_files,
            archive,
        })
    }

    /// Warn early when the configured versions cannot be confirmed upstream.
    /// The installer has the final word.
    async fn check_versions(&self, loader: ModLoader, config: &PackConfiguration) {
        match self.resolver.resolve_minecraft_version(&config.minecraft_version).await {
            Lookup::Found(entry) => debug!(id = %entry.id, kind = %entry.version_type, "Minecraft version confirmed"),
            Lookup::Unavailable(reason) => warn!(
                %reason,
                "Could not confirm Minecraft {}, continuing",
                config.minecraft_version
            ),
        }
        match self
            .resolver
            .resolve_loader_details(loader, &config.minecraft_version, &config.mod_loader_version)
            .await
        {
            Lookup::Found(details) => debug!(?details, "Loader version confirmed"),
            Lookup::Unavailable(reason) => warn!(
                %reason,
                "Could not confirm {loader} {} for Minecraft {}, continuing",
                config.mod_loader_version,
                config.minecraft_version
            ),
        }
    }
}

/// Remove the output of an earlier build of the same pack.
fn cancelled() -> PackError {
    PackError::Other("build cancelled".into())
}

fn remove_previous(pack_root: &Path, config: &PackConfiguration) {
    if pack_root.exists() {
        info!(pack_root = ?pack_root, "Deleting existing server pack");
        if let Err(e) = std::fs::remove_dir_all(pack_root) {
            warn!(pack_root = ?pack_root, error = %e, "Could not delete existing server pack");
        }
    }
    let archive = archive_path_for(pack_root, &config.mod_loader, &config.minecraft_version);
    if archive.exists() {
        info!(archive = ?archive, "Deleting existing zip archive");
        if let Err(e) = std::fs::remove_file(&archive) {
            warn!(archive = ?archive, error = %e, "Could not delete existing zip archive");
        }
    }
}

/// Copy the server icon and properties when the configuration asks for
/// them, preferring the editable copies in `server_files/`.
fn copy_server_files(server_files_dir: &Path, pack_root: &Path, config: &PackConfiguration) -> PackResult<Vec<PathBuf>> {
    let mut copied = Vec::new();
    for (wanted, name) in [
        (config.include_server_icon, SERVER_ICON),
        (config.include_server_properties, SERVER_PROPERTIES),
    ] {
        if !wanted {
            info!(file = name, "Not including");
            continue;
        }
        let source = server_files_dir.join(name);
        let bytes = match std::fs::read(&source) {
            Ok(bytes) => bytes,
            Err(e) => match bundled_server_file(name) {
                Some(bundled) => {
                    warn!(file = ?source, error = %e, "Using bundled default");
                    bundled.to_vec()
                }
                None => return Err(PackError::io(&source, e)),
            },
        };
        let target = pack_root.join(name);
        std::fs::write(&target, bytes).map_err(|e| PackError::io(&target, e))?;
        info!(file = name, "Copied to server pack");
        copied.push(PathBuf::from(name));
    }
    Ok(copied)
}
