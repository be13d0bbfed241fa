use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::artifact::{ArtifactRegistry, JsonRegistry};
use crate::core::error::{PackError, PackResult};
use crate::core::http::build_http_client;
use crate::core::paths::PackPaths;
use crate::core::pipeline::{PackBuilder, PackService, PipelineOptions};
use crate::core::retention::{ManifestRefresher, RetentionPolicy, RetentionScheduler, Schedule};
use crate::core::version::{tracked_manifests, Endpoints};

const APP_DIR_NAME: &str = "packforge";
const SETTINGS_FILE: &str = "service_settings.json";
const REGISTRY_FILE: &str = "artifacts.json";

/// Tunables of the hosted service, persisted in the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub cleanup_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub installer_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub exclude_installer_files: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        let schedule = Schedule::default();
        let options = PipelineOptions::default();
        Self {
            cleanup_interval_secs: schedule.cleanup_every.as_secs(),
            sweep_interval_secs: schedule.sweep_every.as_secs(),
            refresh_interval_secs: schedule.refresh_every.as_secs(),
            installer_timeout_secs: options.installer_timeout.as_secs(),
            fetch_timeout_secs: options.fetch_timeout.as_secs(),
            exclude_installer_files: options.exclude_installer_files,
        }
    }
}

impl ServiceSettings {
    pub fn schedule(&self) -> Schedule {
        Schedule {
            cleanup_every: secs(self.cleanup_interval_secs),
            sweep_every: secs(self.sweep_interval_secs),
            refresh_every: secs(self.refresh_interval_secs),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            installer_timeout: secs(self.installer_timeout_secs),
            fetch_timeout: secs(self.fetch_timeout_secs),
            exclude_installer_files: self.exclude_installer_files,
            endpoints: Endpoints::default(),
        }
    }
}

/// Intervals of zero would make `tokio::time::interval` panic.
fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

/// Everything the hosted service shares between its build entry point and
/// the retention scheduler.
pub struct AppState {
    pub data_dir: PathBuf,
    pub paths: Arc<PackPaths>,
    pub http_client: Client,
    pub registry: Arc<dyn ArtifactRegistry>,
    pub service: PackService,
    pub settings: ServiceSettings,
}

impl AppState {
    /// State for packs laid out under `paths`, with the registry and settings
    /// kept in `data_dir`.
    pub async fn new(data_dir: PathBuf, paths: PackPaths) -> PackResult<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|e| PackError::io(&data_dir, e))?;
        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();
        Self::with_settings(data_dir, paths, settings).await
    }

    pub async fn with_settings(data_dir: PathBuf, paths: PackPaths, settings: ServiceSettings) -> PackResult<Self> {
        let paths = Arc::new(paths);
        let http_client = build_http_client()?;
        let registry: Arc<dyn ArtifactRegistry> = Arc::new(JsonRegistry::open(data_dir.join(REGISTRY_FILE)).await?);
        let builder = Arc::new(PackBuilder::new(
            paths.clone(),
            http_client.clone(),
            settings.pipeline_options(),
        ));
        let service = PackService::new(builder, registry.clone());

        info!(data_dir = ?data_dir, "Service state ready");
        Ok(Self {
            data_dir,
            paths,
            http_client,
            registry,
            service,
            settings,
        })
    }

    /// Job C over the tracked manifests, caching into `manifests/`.
    pub fn manifest_refresher(&self) -> ManifestRefresher {
        let options = self.settings.pipeline_options();
        ManifestRefresher::new(
            self.http_client.clone(),
            tracked_manifests(&options.endpoints),
            self.paths.manifests_dir(),
            options.fetch_timeout,
        )
    }

    /// Retention jobs over this state's registry and directories.
    pub fn retention_scheduler(&self) -> RetentionScheduler {
        RetentionScheduler::new(
            self.registry.clone(),
            RetentionPolicy::for_paths(&self.paths),
            self.manifest_refresher(),
        )
    }

    pub fn save_settings(&self) -> PackResult<()> {
        let path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&path, json).map_err(|e| PackError::io(&path, e))
    }
}

fn load_settings_from_disk(data_dir: &Path) -> Option<ServiceSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!(path = ?path, error = %e, "Ignoring unreadable service settings");
            None
        }
    }
}

/// `<platform data dir>/packforge`, or `./packforge` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn settings_round_trip_through_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        let paths = PackPaths::new(tmp.path());
        let mut state = AppState::new(data_dir.clone(), paths.clone()).await.unwrap();
        assert_eq!(state.settings, ServiceSettings::default());

        state.settings.cleanup_interval_secs = 120;
        state.save_settings().unwrap();

        assert!(data_dir.join(SETTINGS_FILE).is_file());
        let reloaded = AppState::new(data_dir, paths).await.unwrap();
        assert_eq!(reloaded.settings.cleanup_interval_secs, 120);
        assert_eq!(reloaded.settings.schedule().cleanup_every, Duration::from_secs(120));
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: ServiceSettings = serde_json::from_str(r#"{"fetch_timeout_secs": 5}"#).unwrap();
        assert_eq!(settings.fetch_timeout_secs, 5);
        assert_eq!(settings.installer_timeout_secs, ServiceSettings::default().installer_timeout_secs);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let settings = ServiceSettings {
            sweep_interval_secs: 0,
            ..ServiceSettings::default()
        };
        assert_eq!(settings.schedule().sweep_every, Duration::from_secs(1));
    }
}
