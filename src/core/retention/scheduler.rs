use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::{cleanup_artifacts, sweep_orphans, ManifestRefresher, RetentionPolicy};
use crate::core::artifact::ArtifactRegistry;

/// How often each retention job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub cleanup_every: Duration,
    pub sweep_every: Duration,
    pub refresh_every: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            cleanup_every: Duration::from_secs(60 * 60),
            sweep_every: Duration::from_secs(60 * 60),
            refresh_every: Duration::from_secs(6 * 60 * 60),
        }
    }
}

pub struct RetentionScheduler {
    registry: Arc<dyn ArtifactRegistry>,
    policy: Arc<RetentionPolicy>,
    refresher: Arc<ManifestRefresher>,
}

impl RetentionScheduler {
    pub fn new(registry: Arc<dyn ArtifactRegistry>, policy: RetentionPolicy, refresher: ManifestRefresher) -> Self {
        Self {
            registry,
            policy: Arc::new(policy),
            refresher: Arc::new(refresher),
        }
    }

    /// Start one task per job. Each job finishes before its task waits for
    /// the next tick, and ticks missed meanwhile are dropped.
    pub fn spawn(self, schedule: Schedule) -> SchedulerHandle {
        let (stop, stopped) = watch::channel(false);
        info!(?schedule, "Starting retention scheduler");

        let registry = self.registry;
        let policy = self.policy.clone();
        let cleanup = spawn_job("cleanup", schedule.cleanup_every, stopped.clone(), move || {
            let registry = registry.clone();
            let policy = policy.clone();
            async move {
                if let Err(e) = cleanup_artifacts(registry.as_ref(), &policy, Utc::now()).await {
                    error!(error = %e, "Registry cleanup failed, retrying next tick");
                }
            }
        });

        let policy = self.policy;
        let sweep = spawn_job("sweep", schedule.sweep_every, stopped.clone(), move || {
            let policy = policy.clone();
            async move {
                let swept = tokio::task::spawn_blocking(move || sweep_orphans(&policy, Utc::now())).await;
                if let Err(e) = swept {
                    error!(error = %e, "File cleanup task failed");
                }
            }
        });

        let refresher = self.refresher;
        let refresh = spawn_job("refresh", schedule.refresh_every, stopped, move || {
            let refresher = refresher.clone();
            async move {
                refresher.refresh_all().await;
            }
        });

        SchedulerHandle {
            stop,
            tasks: vec![cleanup, sweep, refresh],
        }
    }
}

fn spawn_job<F, Fut>(name: &'static str, every: Duration, mut stopped: watch::Receiver<bool>, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!(job = name, "Running retention job");
                    job().await;
                }
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(job = name, "Retention job stopped");
    })
}

pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal every job and wait for running ones to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!(error = %e, "Retention task ended abnormally");
            }
        }
        info!("Retention scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as Age;

    use super::*;
    use crate::core::artifact::{ArtifactStatus, MemoryRegistry, NewArtifact};

    #[tokio::test]
    async fn jobs_run_until_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = RetentionPolicy::new(tmp.path().join("work"), tmp.path().join("server-packs"));
        let mut stuck = NewArtifact {
            project_id: 1,
            file_id: 2,
            archive_path: policy.output_root.join("1-2_forge-1.16.5_server_pack.zip"),
            minecraft_version: "1.16.5".into(),
            mod_loader: "Forge".into(),
        }
        .into_artifact(1, Utc::now() - Age::hours(30));
        stuck.downloads = 1;
        assert_eq!(stuck.status, ArtifactStatus::Generating);

        let registry = Arc::new(MemoryRegistry::with_artifacts([stuck]));
        let refresher = ManifestRefresher::new(
            reqwest::Client::new(),
            Vec::new(),
            tmp.path().join("manifests"),
            Duration::from_secs(1),
        );
        let schedule = Schedule {
            cleanup_every: Duration::from_millis(20),
            sweep_every: Duration::from_millis(20),
            refresh_every: Duration::from_millis(20),
        };

        let handle = RetentionScheduler::new(registry.clone(), policy, refresher).spawn(schedule);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(registry.list().await.unwrap().is_empty());
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap();
    }
}
