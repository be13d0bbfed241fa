use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use super::{BuildMode, BuildOutcome, PackBuilder, PipelineOptions};
use crate::core::config;
use crate::core::error::{PackError, PackResult};
use crate::core::packager::pack_root_name;
use crate::core::paths::PackPaths;
use crate::core::templates::{BootstrapReport, Bootstrapper, FirstRunPolicy};

#[derive(Debug)]
pub enum SingleShotOutcome {
    /// Defaults were generated and the policy asked to stop so they can be
    /// customized first.
    FirstRun(BootstrapReport),
    Built(BuildOutcome),
}

/// One run of the tool: make sure defaults exist, read the configuration
/// and build its server pack into `server-packs/`.
pub async fn run_single_shot(
    paths: Arc<PackPaths>,
    client: Client,
    policy: FirstRunPolicy,
    options: PipelineOptions,
) -> PackResult<SingleShotOutcome> {
    let report = Bootstrapper::new(&paths).ensure_defaults();
    if report.any_generated() {
        let generated: Vec<&str> = report.generated().collect();
        warn!(?generated, "Default files were generated. Please customize them before building");
    }
    if report.should_halt(policy) {
        info!("Stopping so the generated files can be customized");
        return Ok(SingleShotOutcome::FirstRun(report));
    }

    let config = config::load(&paths.config_file())?;
    let Some(loader) = config.loader() else {
        return Err(PackError::UnknownLoader(config.mod_loader.clone()));
    };

    let source_dir = if config.modpack_dir.is_absolute() {
        config.modpack_dir.clone()
    } else {
        paths.base_dir().join(&config.modpack_dir)
    };
    let base = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PackError::config("modpackDir", "must name a directory"))?;
    let pack_root: PathBuf = paths
        .server_packs_dir()
        .join(pack_root_name(&base, loader.slug(), &config.minecraft_version));

    let builder = PackBuilder::new(paths, client, options);
    let lock = builder.lock(&pack_root)?;
    let outcome = builder.build(lock, &source_dir, &config, BuildMode::SingleShot).await?;
    Ok(SingleShotOutcome::Built(outcome))
}
