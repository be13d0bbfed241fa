use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::RetentionPolicy;
use crate::core::artifact::{Artifact, ArtifactRegistry, ArtifactStatus};
use crate::core::error::{PackError, PackResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// Old enough and never downloaded.
    Unused,
    /// Marked available but the archive is gone.
    MissingArchive,
    /// Build never finished.
    StuckGenerating,
}

/// What happened to one piece of an artifact during deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Removed,
    Absent,
    Failed(String),
}

impl StepOutcome {
    fn from_io(result: std::io::Result<()>) -> Self {
        match result {
            Ok(()) => StepOutcome::Removed,
            Err(e) if e.kind() == ErrorKind::NotFound => StepOutcome::Absent,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub artifact_id: u64,
    pub reason: CleanupReason,
    pub archive: StepOutcome,
    pub expanded_dir: StepOutcome,
    pub working_copy: StepOutcome,
    pub registry_row: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub examined: usize,
    pub retained: usize,
    pub deletions: Vec<DeletionReport>,
}

/// First matching deletion rule for `artifact`, `None` when it is kept.
pub async fn classify(artifact: &Artifact, policy: &RetentionPolicy, now: DateTime<Utc>) -> Option<CleanupReason> {
    let age = artifact.age(now);
    if age >= policy.unused_after && artifact.downloads == 0 {
        Some(CleanupReason::Unused)
    } else if artifact.status == ArtifactStatus::Available && !is_file(&artifact.archive_path).await {
        Some(CleanupReason::MissingArchive)
    } else if artifact.status == ArtifactStatus::Generating && age >= policy.stuck_after {
        Some(CleanupReason::StuckGenerating)
    } else {
        None
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// Job A: walk the registry and delete every artifact a rule matches.
///
/// Only a failing `list` is an error. Deletion problems are reported per
/// step in the summary and never stop the walk.
pub async fn cleanup_artifacts(
    registry: &dyn ArtifactRegistry,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> PackResult<CleanupSummary> {
    let artifacts = registry.list().await?;
    let mut summary = CleanupSummary {
        examined: artifacts.len(),
        ..CleanupSummary::default()
    };
    if artifacts.is_empty() {
        return Ok(summary);
    }

    info!(artifacts = artifacts.len(), "Cleaning artifact registry...");
    for artifact in &artifacts {
        match classify(artifact, policy, now).await {
            Some(reason) => summary
                .deletions
                .push(delete_artifact(registry, artifact, reason, policy).await),
            None => summary.retained += 1,
        }
    }

    if summary.deletions.is_empty() {
        info!("No registry entries to clean up");
    }
    info!(
        deleted = summary.deletions.len(),
        retained = summary.retained,
        "Registry cleanup completed"
    );
    Ok(summary)
}

/// Remove archive, expanded directory, working copy and finally the
/// registry row. Every step runs regardless of the ones before it.
pub async fn delete_artifact(
    registry: &dyn ArtifactRegistry,
    artifact: &Artifact,
    reason: CleanupReason,
    policy: &RetentionPolicy,
) -> DeletionReport {
    info!(id = artifact.id, ?reason, archive = ?artifact.archive_path, "Deleting server pack");

    let archive = StepOutcome::from_io(tokio::fs::remove_file(&artifact.archive_path).await);
    log_step(artifact.id, "archive", &artifact.archive_path, &archive);

    let expanded_dir = match artifact.expanded_dir() {
        Some(dir) => {
            let outcome = StepOutcome::from_io(tokio::fs::remove_dir_all(&dir).await);
            log_step(artifact.id, "expanded directory", &dir, &outcome);
            outcome
        }
        None => StepOutcome::Absent,
    };

    let work = policy.working_copy(artifact.project_id, artifact.file_id);
    let working_copy = StepOutcome::from_io(tokio::fs::remove_dir_all(&work).await);
    log_step(artifact.id, "working copy", &work, &working_copy);

    let registry_row = match registry.delete(artifact.id).await {
        Ok(()) => StepOutcome::Removed,
        Err(PackError::ArtifactNotFound(_)) => StepOutcome::Absent,
        Err(e) => StepOutcome::Failed(e.to_string()),
    };
    match &registry_row {
        StepOutcome::Failed(message) => warn!(id = artifact.id, error = %message, "Could not remove registry entry"),
        _ => info!(id = artifact.id, "Cleaned server pack from registry"),
    }

    DeletionReport {
        artifact_id: artifact.id,
        reason,
        archive,
        expanded_dir,
        working_copy,
        registry_row,
    }
}

fn log_step(id: u64, step: &str, path: &Path, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Removed => info!(id, step, path = ?path, "Deleted"),
        StepOutcome::Absent => {}
        StepOutcome::Failed(message) => warn!(id, step, path = ?path, error = %message, "Could not delete"),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::core::artifact::{MemoryRegistry, NewArtifact};

    struct Fixture {
        _tmp: tempfile::TempDir,
        policy: RetentionPolicy,
        now: DateTime<Utc>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let policy = RetentionPolicy::new(tmp.path().join("work"), tmp.path().join("server-packs"));
            std::fs::create_dir_all(&policy.output_root).unwrap();
            Self {
                _tmp: tmp,
                policy,
                now: Utc::now(),
            }
        }

        /// Artifact with an archive, expanded dir and working copy on disk.
        fn artifact(&self, id: u64, status: ArtifactStatus, age: Duration, downloads: u64) -> Artifact {
            let project_id = 100 + id as u32;
            let archive_path = self
                .policy
                .output_root
                .join(format!("{project_id}-5_forge-1.16.5_server_pack.zip"));
            let mut artifact = NewArtifact {
                project_id,
                file_id: 5,
                archive_path,
                minecraft_version: "1.16.5".into(),
                mod_loader: "Forge".into(),
            }
            .into_artifact(id, self.now - age);
            artifact.status = status;
            artifact.downloads = downloads;

            std::fs::write(&artifact.archive_path, "zip").unwrap();
            std::fs::create_dir_all(artifact.expanded_dir().unwrap().join("mods")).unwrap();
            std::fs::create_dir_all(self.policy.working_copy(project_id, 5)).unwrap();
            artifact
        }
    }

    #[tokio::test]
    async fn unused_rule_needs_age_and_zero_downloads() {
        let f = Fixture::new();
        let unused = f.artifact(1, ArtifactStatus::Available, Duration::days(8), 0);
        let downloaded = f.artifact(2, ArtifactStatus::Available, Duration::days(8), 3);
        let young = f.artifact(3, ArtifactStatus::Available, Duration::days(6), 0);

        assert_eq!(classify(&unused, &f.policy, f.now).await, Some(CleanupReason::Unused));
        assert_eq!(classify(&downloaded, &f.policy, f.now).await, None);
        assert_eq!(classify(&young, &f.policy, f.now).await, None);
    }

    #[tokio::test]
    async fn available_without_archive_is_deleted() {
        let f = Fixture::new();
        let artifact = f.artifact(1, ArtifactStatus::Available, Duration::hours(1), 2);
        std::fs::remove_file(&artifact.archive_path).unwrap();

        assert_eq!(classify(&artifact, &f.policy, f.now).await, Some(CleanupReason::MissingArchive));
    }

    #[tokio::test]
    async fn directory_in_place_of_archive_counts_as_missing() {
        let f = Fixture::new();
        let artifact = f.artifact(1, ArtifactStatus::Available, Duration::hours(1), 2);
        std::fs::remove_file(&artifact.archive_path).unwrap();
        std::fs::create_dir(&artifact.archive_path).unwrap();

        assert_eq!(classify(&artifact, &f.policy, f.now).await, Some(CleanupReason::MissingArchive));
    }

    #[tokio::test]
    async fn generating_is_stuck_only_after_a_day() {
        let f = Fixture::new();
        let stuck = f.artifact(1, ArtifactStatus::Generating, Duration::hours(25), 1);
        let running = f.artifact(2, ArtifactStatus::Generating, Duration::hours(23), 1);

        assert_eq!(classify(&stuck, &f.policy, f.now).await, Some(CleanupReason::StuckGenerating));
        assert_eq!(classify(&running, &f.policy, f.now).await, None);
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let f = Fixture::new();
        let artifact = f.artifact(1, ArtifactStatus::Generating, Duration::days(8), 0);
        assert_eq!(classify(&artifact, &f.policy, f.now).await, Some(CleanupReason::Unused));
    }

    #[tokio::test]
    async fn cleanup_removes_files_then_row() {
        let f = Fixture::new();
        let doomed = f.artifact(1, ArtifactStatus::Available, Duration::days(8), 0);
        let kept = f.artifact(2, ArtifactStatus::Available, Duration::days(8), 4);
        let registry = MemoryRegistry::with_artifacts([doomed.clone(), kept.clone()]);

        let summary = cleanup_artifacts(&registry, &f.policy, f.now).await.unwrap();

        assert_eq!(summary.examined, 2);
        assert_eq!(summary.retained, 1);
        let report = &summary.deletions[0];
        assert_eq!(report.artifact_id, 1);
        assert_eq!(report.reason, CleanupReason::Unused);
        assert_eq!(report.archive, StepOutcome::Removed);
        assert_eq!(report.expanded_dir, StepOutcome::Removed);
        assert_eq!(report.working_copy, StepOutcome::Removed);
        assert_eq!(report.registry_row, StepOutcome::Removed);

        assert!(!doomed.archive_path.exists());
        assert!(!doomed.expanded_dir().unwrap().exists());
        assert!(!f.policy.working_copy(doomed.project_id, 5).exists());
        assert!(kept.archive_path.exists());
        let remaining: Vec<u64> = registry.list().await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(remaining, vec![2]);
    }

    #[tokio::test]
    async fn absent_pieces_do_not_stop_deletion() {
        let f = Fixture::new();
        let artifact = f.artifact(1, ArtifactStatus::Available, Duration::hours(1), 1);
        std::fs::remove_file(&artifact.archive_path).unwrap();
        std::fs::remove_dir_all(f.policy.working_copy(artifact.project_id, 5)).unwrap();
        let registry = MemoryRegistry::with_artifacts([artifact.clone()]);

        let summary = cleanup_artifacts(&registry, &f.policy, f.now).await.unwrap();

        let report = &summary.deletions[0];
        assert_eq!(report.reason, CleanupReason::MissingArchive);
        assert_eq!(report.archive, StepOutcome::Absent);
        assert_eq!(report.expanded_dir, StepOutcome::Removed);
        assert_eq!(report.working_copy, StepOutcome::Absent);
        assert_eq!(report.registry_row, StepOutcome::Removed);
        assert!(registry.list().await.unwrap().is_empty());
    }

    struct BrokenRegistry;

    #[async_trait]
    impl ArtifactRegistry for BrokenRegistry {
        async fn list(&self) -> PackResult<Vec<Artifact>> {
            Err(PackError::Registry("connection refused".into()))
        }
        async fn get(&self, id: u64) -> PackResult<Artifact> {
            Err(PackError::ArtifactNotFound(id))
        }
        async fn delete(&self, id: u64) -> PackResult<()> {
            Err(PackError::ArtifactNotFound(id))
        }
        async fn insert(&self, _new: NewArtifact, _now: DateTime<Utc>) -> PackResult<Artifact> {
            Err(PackError::Registry("read only".into()))
        }
        async fn update(&self, artifact: Artifact) -> PackResult<Artifact> {
            Err(PackError::ArtifactNotFound(artifact.id))
        }
        async fn record_download(&self, id: u64) -> PackResult<u64> {
            Err(PackError::ArtifactNotFound(id))
        }
    }

    #[tokio::test]
    async fn list_failure_aborts_the_run() {
        let f = Fixture::new();
        let result = cleanup_artifacts(&BrokenRegistry, &f.policy, f.now).await;
        assert!(matches!(result, Err(PackError::Registry(_))));
    }

    #[tokio::test]
    async fn archive_without_suffix_has_no_expanded_dir() {
        let f = Fixture::new();
        let mut artifact = f.artifact(1, ArtifactStatus::Failed, Duration::days(9), 0);
        artifact.archive_path = f.policy.output_root.join("odd.zip");
        let registry = MemoryRegistry::with_artifacts([artifact.clone()]);

        let report = delete_artifact(&registry, &artifact, CleanupReason::Unused, &f.policy).await;

        assert_eq!(report.archive, StepOutcome::Absent);
        assert_eq!(report.expanded_dir, StepOutcome::Absent);
        assert!(!report.registry_row.is_failed());
    }

    #[tokio::test]
    async fn failed_step_does_not_stop_the_rest() {
        let f = Fixture::new();
        let artifact = f.artifact(1, ArtifactStatus::Available, Duration::hours(1), 1);
        std::fs::remove_file(&artifact.archive_path).unwrap();
        std::fs::create_dir_all(artifact.archive_path.join("nested")).unwrap();
        std::fs::write(artifact.archive_path.join("nested").join("file"), "x").unwrap();
        let registry = MemoryRegistry::with_artifacts([artifact.clone()]);

        let summary = cleanup_artifacts(&registry, &f.policy, f.now).await.unwrap();

        let report = &summary.deletions[0];
        assert_eq!(report.reason, CleanupReason::MissingArchive);
        assert!(matches!(report.archive, StepOutcome::Failed(_)));
        assert_eq!(report.expanded_dir, StepOutcome::Removed);
        assert_eq!(report.working_copy, StepOutcome::Removed);
        assert_eq!(report.registry_row, StepOutcome::Removed);
        assert!(artifact.archive_path.is_dir());
        assert!(!artifact.expanded_dir().unwrap().exists());
        assert!(registry.list().await.unwrap().is_empty());
    }
}
