use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::core::config;
use crate::core::error::{PackError, PackResult};
use crate::core::http::build_http_client;
use crate::core::loaders::DispatchOutcome;
use crate::core::paths::PackPaths;
use crate::core::pipeline::{run_single_shot, BuildOutcome, HostedRequest, PipelineOptions, SingleShotOutcome};
use crate::core::retention::{cleanup_artifacts, sweep_orphans, RetentionPolicy};
use crate::core::state::{default_data_dir, AppState, ServiceSettings};
use crate::core::templates::{Bootstrapper, FirstRunPolicy};

#[derive(Debug, Parser)]
#[command(name = "packforge")]
#[command(about = "Builds server packs from Forge and Fabric modpacks", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory holding serverpackcreator.conf, server_files/ and server-packs/
    #[arg(long, global = true, env = "PACKFORGE_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate missing defaults, then build the configured server pack
    Run {
        /// Keep going with freshly generated defaults instead of stopping
        #[arg(long)]
        continue_on_first_run: bool,
    },

    /// Only generate missing default files
    Setup,

    /// Build the configured server pack, generating missing defaults on the way
    Build,

    /// Build a staged modpack from work/<project>/<file> as a hosted artifact
    Submit {
        #[command(flatten)]
        data: DataDirArgs,

        /// Project the staged modpack belongs to
        #[arg(long)]
        project_id: u32,

        /// File of the project that was staged
        #[arg(long)]
        file_id: u32,

        /// Configuration to build with, defaults to the one in the base directory
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the retention jobs on their intervals until interrupted
    Serve {
        #[command(flatten)]
        data: DataDirArgs,

        /// Seconds between artifact cleanups
        #[arg(long)]
        cleanup_every: Option<u64>,

        /// Seconds between orphan sweeps
        #[arg(long)]
        sweep_every: Option<u64>,

        /// Seconds between manifest refreshes
        #[arg(long)]
        refresh_every: Option<u64>,
    },

    /// Run artifact cleanup and the orphan sweep once
    Prune {
        #[command(flatten)]
        data: DataDirArgs,

        /// Also refresh the cached version manifests
        #[arg(long)]
        refresh_manifests: bool,
    },
}

#[derive(Debug, Args)]
pub struct DataDirArgs {
    /// Where the artifact registry and service settings live
    #[arg(long, env = "PACKFORGE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl DataDirArgs {
    fn resolve(self) -> PathBuf {
        self.data_dir.unwrap_or_else(default_data_dir)
    }
}

pub async fn handle(cli: Cli) -> PackResult<()> {
    let paths = match cli.base_dir {
        Some(dir) => PackPaths::new(dir),
        None => PackPaths::current_dir()?,
    };

    match cli.command {
        Commands::Run { continue_on_first_run } => {
            build(paths, FirstRunPolicy::from_halt_flag(!continue_on_first_run)).await
        }
        Commands::Setup => {
            let report = Bootstrapper::new(&paths).ensure_defaults();
            let generated: Vec<&str> = report.generated().collect();
            info!(?generated, base_dir = ?paths.base_dir(), "Defaults checked");
            Ok(())
        }
        Commands::Build => build(paths, FirstRunPolicy::Continue).await,
        Commands::Submit {
            data,
            project_id,
            file_id,
            config,
        } => submit(paths, data.resolve(), project_id, file_id, config).await,
        Commands::Serve {
            data,
            cleanup_every,
            sweep_every,
            refresh_every,
        } => serve(paths, data.resolve(), cleanup_every, sweep_every, refresh_every).await,
        Commands::Prune {
            data,
            refresh_manifests,
        } => prune(paths, data.resolve(), refresh_manifests).await,
    }
}

async fn build(paths: PackPaths, policy: FirstRunPolicy) -> PackResult<()> {
    let client = build_http_client()?;
    let outcome = run_single_shot(Arc::new(paths), client, policy, PipelineOptions::default()).await?;
    match outcome {
        SingleShotOutcome::FirstRun(_) => {
            info!("Edit the generated files and run again");
        }
        SingleShotOutcome::Built(built) => log_build(&built),
    }
    Ok(())
}

fn log_build(built: &BuildOutcome) {
    if !built.copy.failures.is_empty() {
        warn!(failures = built.copy.failures.len(), "Some files could not be copied");
    }
    match &built.dispatch {
        Some(DispatchOutcome::Installed(report)) => {
            info!(staged = report.staged.len(), scripts = report.scripts.len(), "Server installed")
        }
        Some(DispatchOutcome::ScriptsCopied(scripts)) => info!(scripts = scripts.len(), "Start scripts copied"),
        Some(DispatchOutcome::UnknownLoader(loader)) => warn!(%loader, "No server runtime was installed"),
        None => {}
    }
    info!(
        pack_root = ?built.pack_root,
        files = built.copy.files_copied,
        excluded = built.excluded.removed.len(),
        archive = ?built.archive,
        "Server pack ready"
    );
}

async fn submit(
    paths: PackPaths,
    data_dir: PathBuf,
    project_id: u32,
    file_id: u32,
    config_file: Option<PathBuf>,
) -> PackResult<()> {
    let config_file = config_file.unwrap_or_else(|| paths.config_file());
    let config = config::load(&config_file)?;
    let state = AppState::new(data_dir, paths).await?;

    let ticket = state
        .service
        .submit(HostedRequest {
            project_id,
            file_id,
            config,
        })
        .await?;
    info!(id = ticket.artifact_id, "Waiting for server pack build");

    let built = ticket.handle.await??;
    log_build(&built);
    let artifact = state.registry.get(ticket.artifact_id).await?;
    info!(id = artifact.id, status = ?artifact.status, archive = ?artifact.archive_path, "Artifact recorded");
    Ok(())
}

async fn serve(
    paths: PackPaths,
    data_dir: PathBuf,
    cleanup_every: Option<u64>,
    sweep_every: Option<u64>,
    refresh_every: Option<u64>,
) -> PackResult<()> {
    let mut state = AppState::new(data_dir, paths).await?;
    apply_overrides(&mut state.settings, cleanup_every, sweep_every, refresh_every);

    let handle = state.retention_scheduler().spawn(state.settings.schedule());
    info!(data_dir = ?state.data_dir, "packforge service running, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| PackError::Other(format!("waiting for Ctrl+C failed: {e}")))?;
    info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

fn apply_overrides(
    settings: &mut ServiceSettings,
    cleanup_every: Option<u64>,
    sweep_every: Option<u64>,
    refresh_every: Option<u64>,
) {
    if let Some(secs) = cleanup_every {
        settings.cleanup_interval_secs = secs;
    }
    if let Some(secs) = sweep_every {
        settings.sweep_interval_secs = secs;
    }
    if let Some(secs) = refresh_every {
        settings.refresh_interval_secs = secs;
    }
}

async fn prune(paths: PackPaths, data_dir: PathBuf, refresh_manifests: bool) -> PackResult<()> {
    let state = AppState::new(data_dir, paths).await?;
    let policy = RetentionPolicy::for_paths(&state.paths);

    let summary = cleanup_artifacts(state.registry.as_ref(), &policy, Utc::now()).await?;
    info!(
        examined = summary.examined,
        retained = summary.retained,
        deleted = summary.deletions.len(),
        "Artifact cleanup finished"
    );

    let sweep = tokio::task::spawn_blocking(move || sweep_orphans(&policy, Utc::now()))
        .await?;
    info!(removed = sweep.removed(), failures = sweep.failures.len(), "Orphan sweep finished");

    if refresh_manifests {
        let refreshed = state.manifest_refresher().refresh_all().await;
        info!(
            refreshed = refreshed.refreshed.len(),
            failed = refreshed.failed.len(),
            "Manifest refresh finished"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_base_dir() {
        let cli = Cli::try_parse_from(["packforge", "--base-dir", "/srv/packs", "run", "--continue-on-first-run"]).unwrap();
        assert_eq!(cli.base_dir, Some(PathBuf::from("/srv/packs")));
        assert!(matches!(cli.command, Commands::Run { continue_on_first_run: true }));
    }

    #[test]
    fn base_dir_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["packforge", "build", "--base-dir", "pack"]).unwrap();
        assert_eq!(cli.base_dir, Some(PathBuf::from("pack")));
        assert!(matches!(cli.command, Commands::Build));
    }

    #[test]
    fn serve_overrides_only_given_intervals() {
        let cli = Cli::try_parse_from(["packforge", "serve", "--data-dir", "data", "--sweep-every", "60"]).unwrap();
        let Commands::Serve {
            data,
            cleanup_every,
            sweep_every,
            refresh_every,
        } = cli.command
        else {
            panic!("expected serve");
        };
        assert_eq!(data.data_dir, Some(PathBuf::from("data")));

        let mut settings = ServiceSettings::default();
        apply_overrides(&mut settings, cleanup_every, sweep_every, refresh_every);
        assert_eq!(settings.sweep_interval_secs, 60);
        assert_eq!(settings.cleanup_interval_secs, ServiceSettings::default().cleanup_interval_secs);
    }

    #[tokio::test]
    async fn setup_generates_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            base_dir: Some(tmp.path().to_path_buf()),
            command: Commands::Setup,
        };

        handle(cli).await.unwrap();

        assert!(tmp.path().join("serverpackcreator.conf").is_file());
        assert!(tmp.path().join("server_files/start-forge.sh").is_file());
    }

    #[tokio::test]
    async fn prune_on_empty_layout_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            base_dir: Some(tmp.path().to_path_buf()),
            command: Commands::Prune {
                data: DataDirArgs {
                    data_dir: Some(tmp.path().join("data")),
                },
                refresh_manifests: false,
            },
        };

        handle(cli).await.unwrap();

        assert!(tmp.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn submit_records_an_available_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PackPaths::new(tmp.path());
        let mods = paths.staged_source(12, 60020).join("mods");
        std::fs::create_dir_all(&mods).unwrap();
        std::fs::write(mods.join("ModB.jar"), "b").unwrap();
        let config_file = tmp.path().join("hosted.conf");
        config::write(
            &config::PackConfiguration {
                copy_dirs: vec!["mods".into()],
                mod_loader: "Fabric".into(),
                minecraft_version: "1.18.2".into(),
                include_server_installation: false,
                ..config::PackConfiguration::default()
            },
            &config_file,
        )
        .unwrap();
        let data_dir = tmp.path().join("data");

        let cli = Cli::try_parse_from([
            "packforge",
            "--base-dir",
            tmp.path().to_str().unwrap(),
            "submit",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--project-id",
            "12",
            "--file-id",
            "60020",
            "--config",
            config_file.to_str().unwrap(),
        ])
        .unwrap();
        handle(cli).await.unwrap();

        let state = AppState::new(data_dir, paths).await.unwrap();
        let artifacts = state.registry.list().await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].status, crate::core::artifact::ArtifactStatus::Available);
        assert!(artifacts[0].archive_path.ends_with("12-60020_fabric-1.18.2_server_pack.zip"));
        assert!(artifacts[0].archive_path.is_file());
    }
}
