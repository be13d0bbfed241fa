use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::error::{PackError, PackResult};

/// Marker prefix: `saves/<world>` lands at `<dest>/<world>`.
pub const SAVES_PREFIX: &str = "saves/";
const SAVES_DIR: &str = "saves";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub files_copied: usize,
    pub dirs_created: usize,
    /// Entries skipped because the destination was a non-empty directory.
    pub merge_skips: usize,
    pub failures: Vec<CopyFailure>,
    /// The walk stopped early because the build was abandoned.
    pub cancelled: bool,
}

impl CopyReport {
    fn fail(&mut self, path: impl Into<PathBuf>, message: impl Into<String>) {
        let failure = CopyFailure {
            path: path.into(),
            message: message.into(),
        };
        warn!(path = ?failure.path, error = %failure.message, "An error occurred copying files to the server pack");
        self.failures.push(failure);
    }
}

/// Where one `copyDirs` entry is read from and written to, both relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTarget {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl CopyTarget {
    /// Resolve one entry. `None` for entries that would escape either root
    /// and for a `saves/` entry that names no world.
    pub fn resolve(entry: &str) -> Option<Self> {
        let normalized = entry.trim().replace('\\', "/");
        let normalized = normalized.trim_end_matches('/');

        let destination = if normalized == SAVES_DIR {
            ""
        } else {
            normalized.strip_prefix(SAVES_PREFIX).unwrap_or(normalized)
        };

        if destination.is_empty() || !is_plain_relative(normalized) {
            return None;
        }

        Some(Self {
            source: PathBuf::from(normalized),
            destination: PathBuf::from(destination),
        })
    }
}

fn is_plain_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Copy each entry of `dirs` from `source_root` into `dest_root`.
///
/// Only failing to create `dest_root` is an error. Everything else is
/// recorded in the report and the walk carries on.
pub fn copy_directories(source_root: &Path, dest_root: &Path, dirs: &[String]) -> PackResult<CopyReport> {
    copy_directories_until(source_root, dest_root, dirs, &AtomicBool::new(false))
}

/// `copy_directories` that stops between files once `cancel` is set.
/// Nothing is created when `cancel` is already set on entry.
pub fn copy_directories_until(
    source_root: &Path,
    dest_root: &Path,
    dirs: &[String],
    cancel: &AtomicBool,
) -> PackResult<CopyReport> {
    let mut report = CopyReport::default();
    if cancel.load(Ordering::SeqCst) {
        report.cancelled = true;
        return Ok(report);
    }
    std::fs::create_dir_all(dest_root).map_err(|e| PackError::io(dest_root, e))?;

    for entry in dirs {
        if report.cancelled {
            break;
        }
        let Some(target) = CopyTarget::resolve(entry) else {
            report.fail(entry, "not a relative directory inside the modpack");
            continue;
        };

        let source = source_root.join(&target.source);
        let destination = dest_root.join(&target.destination);
        info!(from = ?source, to = ?destination, "Setting up files");

        if !source.is_dir() {
            report.fail(&source, "directory does not exist in the modpack");
            continue;
        }

        copy_tree(&source, &destination, cancel, &mut report);
    }

    if report.cancelled {
        warn!(dest = ?dest_root, files = report.files_copied, "Copy cancelled");
        return Ok(report);
    }
    info!(
        files = report.files_copied,
        failures = report.failures.len(),
        "Copied modpack directories"
    );
    Ok(report)
}

fn copy_tree(source: &Path, destination: &Path, cancel: &AtomicBool, report: &mut CopyReport) {
    for item in WalkDir::new(source).sort_by_file_name() {
        if cancel.load(Ordering::SeqCst) {
            report.cancelled = true;
            return;
        }
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
                report.fail(path, e.to_string());
                continue;
            }
        };

        let Ok(relative) = item.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);

        let result = if item.file_type().is_dir() {
            std::fs::create_dir_all(&target).map(|_| report.dirs_created += 1)
        } else {
            copy_file(item.path(), &target).map(|_| report.files_copied += 1)
        };

        match result {
            Ok(()) => debug!(file = ?item.path(), "Copying"),
            Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => report.merge_skips += 1,
            Err(e) => report.fail(item.path(), e.to_string()),
        }
    }
}

fn copy_file(source: &Path, target: &Path) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if target.is_dir() {
        // A file replacing a directory only works when that directory is empty.
        std::fs::remove_dir(target)?;
    }
    std::fs::copy(source, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn dirs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn relative_paths_are_preserved() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pack");
        let dst = tmp.path().join("out");
        touch(&src.join("config/a.toml"), "a");
        touch(&src.join("config/sub/b.toml"), "b");
        touch(&src.join("kubejs/server_scripts/x.js"), "x");

        let report = copy_directories(&src, &dst, &dirs(&["config", "kubejs/server_scripts"])).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.files_copied, 3);
        assert_eq!(std::fs::read_to_string(dst.join("config/a.toml")).unwrap(), "a");
        assert!(dst.join("config/sub/b.toml").is_file());
        assert!(dst.join("kubejs/server_scripts/x.js").is_file());
    }

    #[test]
    fn saves_entries_are_flattened() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pack");
        let dst = tmp.path().join("out");
        touch(&src.join("saves/world1/level.dat"), "level");
        touch(&src.join("saves/world1/region/r.0.0.mca"), "region");

        copy_directories(&src, &dst, &dirs(&["saves/world1"])).unwrap();

        assert!(dst.join("world1/level.dat").is_file());
        assert!(dst.join("world1/region/r.0.0.mca").is_file());
        assert!(!dst.join("saves").exists());
    }

    #[test]
    fn existing_files_are_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pack");
        let dst = tmp.path().join("out");
        touch(&src.join("config/a.toml"), "new");
        touch(&dst.join("config/a.toml"), "old");
        touch(&dst.join("config/keep.toml"), "keep");

        copy_directories(&src, &dst, &dirs(&["config"])).unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("config/a.toml")).unwrap(), "new");
        assert!(dst.join("config/keep.toml").is_file());
    }

    #[test]
    fn missing_directory_does_not_stop_other_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pack");
        let dst = tmp.path().join("out");
        touch(&src.join("mods/ModB.jar"), "b");

        let report = copy_directories(&src, &dst, &dirs(&["scripts", "mods"])).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("scripts"));
        assert!(dst.join("mods/ModB.jar").is_file());
    }

    #[test]
    fn file_over_non_empty_directory_is_a_merge_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pack");
        let dst = tmp.path().join("out");
        touch(&src.join("config/thing"), "file");
        touch(&dst.join("config/thing/inner.toml"), "dir");

        let report = copy_directories(&src, &dst, &dirs(&["config"])).unwrap();

        assert_eq!(report.merge_skips, 1);
        assert!(report.failures.is_empty());
        assert!(dst.join("config/thing/inner.toml").is_file());
    }

    #[test]
    fn escaping_entries_are_rejected() {
        assert_eq!(CopyTarget::resolve("../elsewhere"), None);
        assert_eq!(CopyTarget::resolve("/etc"), None);
        assert_eq!(CopyTarget::resolve("saves/"), None);
        assert_eq!(CopyTarget::resolve("saves"), None);
        assert_eq!(CopyTarget::resolve(" saves\\ "), None);
        assert_eq!(CopyTarget::resolve(""), None);
    }

    #[test]
    fn bare_saves_entry_copies_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pack");
        let dst = tmp.path().join("out");
        touch(&src.join("saves/world1/level.dat"), "level");

        let report = copy_directories(&src, &dst, &dirs(&["saves/"])).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.files_copied, 0);
        assert!(!dst.join("saves").exists());
    }

    #[test]
    fn cancelled_copy_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pack");
        let dst = tmp.path().join("out");
        touch(&src.join("mods/ModB.jar"), "b");

        let report = copy_directories_until(&src, &dst, &dirs(&["mods"]), &AtomicBool::new(true)).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.files_copied, 0);
        assert!(!dst.exists());
    }

    #[test]
    fn entries_are_normalized() {
        let target = CopyTarget::resolve("saves\\My World/").unwrap();
        assert_eq!(target.source, PathBuf::from("saves/My World"));
        assert_eq!(target.destination, PathBuf::from("My World"));
    }

    #[test]
    fn destination_root_failure_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let result = copy_directories(tmp.path(), &blocker.join("out"), &dirs(&["mods"]));

        assert!(matches!(result, Err(PackError::Io { .. })));
    }
}
