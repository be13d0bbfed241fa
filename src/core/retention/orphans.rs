use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::RetentionPolicy;
use crate::core::packager::{expanded_dir_for, ARCHIVE_SUFFIX, BUILD_MARKER};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pack roots removed because their archive exists.
    pub expanded_dirs: Vec<PathBuf>,
    /// Working copies of legacy-numbered archives.
    pub working_copies: Vec<PathBuf>,
    /// Abandoned `.part` archives and unfinished pack roots.
    pub stale: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expanded_dirs.len() + self.working_copies.len() + self.stale.len()
    }
}

/// Job B: scan the output root for leftovers that no longer need to exist.
///
/// Blocking. The scheduler runs it on the blocking pool.
pub fn sweep_orphans(policy: &RetentionPolicy, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();
    let entries = match fs::read_dir(&policy.output_root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = ?policy.output_root, error = %e, "Nothing to sweep");
            return report;
        }
    };

    info!("Cleaning files...");
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    for path in &paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if path.is_file() && name.ends_with(".part") {
            if is_older_than(path, policy, now) {
                remove(path, &mut report.stale, &mut report.failures);
            }
        } else if path.is_dir() && path.join(BUILD_MARKER).exists() {
            if is_older_than(&path.join(BUILD_MARKER), policy, now) {
                remove(path, &mut report.stale, &mut report.failures);
            }
        } else if path.is_file() && name.ends_with(ARCHIVE_SUFFIX) {
            sweep_archive(path, name, policy, &mut report);
        }
    }

    if report.removed() == 0 && report.failures.is_empty() {
        info!("No files to clean up");
    }
    info!(removed = report.removed(), failed = report.failures.len(), "File cleanup completed");
    report
}

fn sweep_archive(archive: &Path, name: &str, policy: &RetentionPolicy, report: &mut SweepReport) {
    if let Some(dir) = expanded_dir_for(archive) {
        if dir.is_dir() && !dir.join(BUILD_MARKER).exists() {
            remove(&dir, &mut report.expanded_dirs, &mut report.failures);
            return;
        }
    }

    if let Some((project_id, file_id)) = parse_ids(name) {
        if policy.is_legacy(project_id, file_id) {
            let work = policy.working_copy(project_id, file_id);
            if work.exists() {
                remove(&work, &mut report.working_copies, &mut report.failures);
            }
        }
    }
}

/// `<project>-<file>_...` as produced by hosted builds.
fn parse_ids(name: &str) -> Option<(u32, u32)> {
    let (ids, _) = name.split_once('_')?;
    let (project, file) = ids.split_once('-')?;
    Some((project.parse().ok()?, file.parse().ok()?))
}

fn is_older_than(path: &Path, policy: &RetentionPolicy, now: DateTime<Utc>) -> bool {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    now - DateTime::<Utc>::from(modified) >= policy.stuck_after
}

fn remove(path: &Path, removed: &mut Vec<PathBuf>, failures: &mut Vec<(PathBuf, String)>) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => {
            info!(path = ?path, "Deleted");
            removed.push(path.to_path_buf());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = ?path, error = %e, "Could not delete");
            failures.push((path.to_path_buf(), e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn policy(tmp: &Path) -> RetentionPolicy {
        let policy = RetentionPolicy::new(tmp.join("work"), tmp.join("server-packs"));
        fs::create_dir_all(&policy.output_root).unwrap();
        policy
    }

    fn archive(policy: &RetentionPolicy, stem: &str) -> PathBuf {
        let path = policy.output_root.join(format!("{stem}{ARCHIVE_SUFFIX}"));
        fs::write(&path, "zip").unwrap();
        path
    }

    #[test]
    fn expanded_dir_beside_archive_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = policy(tmp.path());
        archive(&policy, "3-40_fabric-1.18.2");
        let dir = policy.output_root.join("3-40_fabric-1.18.2");
        fs::create_dir_all(dir.join("mods")).unwrap();
        let lonely = policy.output_root.join("no-archive_fabric-1.18.2");
        fs::create_dir_all(&lonely).unwrap();

        let report = sweep_orphans(&policy, Utc::now());

        assert_eq!(report.expanded_dirs, vec![dir.clone()]);
        assert!(!dir.exists());
        assert!(lonely.exists());
    }

    #[test]
    fn legacy_working_copy_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = policy(tmp.path());
        archive(&policy, "12-60020_forge-1.16.5");
        archive(&policy, "9-60020_forge-1.16.5");
        let legacy = policy.working_copy(12, 60020);
        let recent = policy.working_copy(9, 60020);
        fs::create_dir_all(&legacy).unwrap();
        fs::create_dir_all(&recent).unwrap();

        let report = sweep_orphans(&policy, Utc::now());

        assert_eq!(report.working_copies, vec![legacy.clone()]);
        assert!(!legacy.exists());
        assert!(recent.exists());
    }

    #[test]
    fn only_stale_partial_builds_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = policy(tmp.path());
        let part = policy.output_root.join(format!("1-2_forge-1.16.5{ARCHIVE_SUFFIX}.part"));
        fs::write(&part, "half").unwrap();
        let building = policy.output_root.join("1-3_forge-1.16.5");
        fs::create_dir_all(&building).unwrap();
        fs::write(building.join(BUILD_MARKER), "").unwrap();

        let fresh = sweep_orphans(&policy, Utc::now());
        assert!(fresh.stale.is_empty());
        assert!(part.exists() && building.exists());

        let later = sweep_orphans(&policy, Utc::now() + Duration::hours(25));
        assert_eq!(later.stale, vec![part.clone(), building.clone()]);
        assert!(!part.exists() && !building.exists());
    }

    #[test]
    fn directory_being_rebuilt_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = policy(tmp.path());
        archive(&policy, "3-40_fabric-1.18.2");
        let dir = policy.output_root.join("3-40_fabric-1.18.2");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(BUILD_MARKER), "").unwrap();

        let report = sweep_orphans(&policy, Utc::now());

        assert_eq!(report.removed(), 0);
        assert!(dir.exists());
    }

    #[test]
    fn ids_parse_from_archive_name() {
        assert_eq!(parse_ids("12-60020_forge-1.16.5_server_pack.zip"), Some((12, 60020)));
        assert_eq!(parse_ids("My Pack_forge-1.16.5_server_pack.zip"), None);
    }

    #[test]
    fn missing_output_root_is_empty_report() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = RetentionPolicy::new(tmp.path().join("w"), tmp.path().join("missing"));
        assert_eq!(sweep_orphans(&policy, Utc::now()), SweepReport::default());
    }
}
