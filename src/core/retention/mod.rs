// ─── Retention ───
// Periodic reaping of hosted server packs and repair of on-disk state.
//
//   cleanup    Job A: registry-driven deletion of unused or broken artifacts
//   orphans    Job B: filesystem sweep of leftovers the registry no longer knows
//   refresh    Job C: local mirror of the upstream version manifests
//   scheduler  one tokio task per job

mod cleanup;
mod orphans;
mod refresh;
mod scheduler;

use std::path::PathBuf;

use chrono::Duration;

use crate::core::paths::PackPaths;

pub use cleanup::{classify, cleanup_artifacts, delete_artifact, CleanupReason, CleanupSummary, DeletionReport, StepOutcome};
pub use orphans::{sweep_orphans, SweepReport};
pub use refresh::{ManifestRefresher, RefreshSummary};
pub use scheduler::{RetentionScheduler, Schedule, SchedulerHandle};

/// Thresholds and locations the retention jobs work with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Artifacts this old that were never downloaded are deleted.
    pub unused_after: Duration,
    /// Builds still `Generating` after this long are considered dead.
    pub stuck_after: Duration,
    /// Working copies of archives at or above these ids predate the
    /// `<work>/<project>/<file>` cleanup and are swept by Job B.
    pub legacy_min_project_id: u32,
    pub legacy_min_file_id: u32,
    /// Staged modpack sources, `<working_root>/<project>/<file>`.
    pub working_root: PathBuf,
    /// Where archives and expanded pack roots are written.
    pub output_root: PathBuf,
}

impl RetentionPolicy {
    pub fn new(working_root: PathBuf, output_root: PathBuf) -> Self {
        Self {
            unused_after: Duration::days(7),
            stuck_after: Duration::hours(24),
            legacy_min_project_id: 10,
            legacy_min_file_id: 60018,
            working_root,
            output_root,
        }
    }

    pub fn for_paths(paths: &PackPaths) -> Self {
        Self::new(paths.work_dir(), paths.server_packs_dir())
    }

    pub fn working_copy(&self, project_id: u32, file_id: u32) -> PathBuf {
        self.working_root
            .join(project_id.to_string())
            .join(file_id.to_string())
    }

    pub(crate) fn is_legacy(&self, project_id: u32, file_id: u32) -> bool {
        project_id >= self.legacy_min_project_id && file_id >= self.legacy_min_file_id
    }
}
