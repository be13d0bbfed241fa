use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionReport {
    pub removed: Vec<String>,
}

/// Delete every file in `mods_dir` whose name equals one of `client_mods`.
///
/// Matching is by file name only. Names that are not present are ignored,
/// so running this twice leaves the same set of files as running it once.
pub fn exclude_client_mods(mods_dir: &Path, client_mods: &[String]) -> ExclusionReport {
    let mut report = ExclusionReport::default();
    if !mods_dir.is_dir() {
        debug!(dir = ?mods_dir, "No mods directory, nothing to exclude");
        return report;
    }

    info!("Deleting client-side mods from server pack...");
    for name in client_mods {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            warn!(name, "Ignoring client mod entry that is not a plain file name");
            continue;
        }

        let candidate = mods_dir.join(name);
        if !candidate.is_file() {
            continue;
        }

        match std::fs::remove_file(&candidate) {
            Ok(()) => {
                info!(file = name, "Deleted client mod");
                report.removed.push(name.clone());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(file = ?candidate, error = %e, "Could not delete client mod"),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn listing(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn mods_dir_with(names: &[&str]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(tmp.path().join(name), name).unwrap();
        }
        tmp
    }

    #[test]
    fn only_listed_mod_is_removed() {
        let tmp = mods_dir_with(&["ModA.jar", "ModB.jar"]);

        let report = exclude_client_mods(tmp.path(), &["ModA.jar".to_string()]);

        assert_eq!(report.removed, vec!["ModA.jar"]);
        assert_eq!(listing(tmp.path()), BTreeSet::from(["ModB.jar".to_string()]));
    }

    #[test]
    fn exclusion_is_idempotent() {
        let tmp = mods_dir_with(&["ModA.jar", "ModB.jar", "ModC.jar"]);
        let list = vec!["ModA.jar".to_string(), "ModC.jar".to_string()];

        exclude_client_mods(tmp.path(), &list);
        let once = listing(tmp.path());
        let second = exclude_client_mods(tmp.path(), &list);

        assert!(second.removed.is_empty());
        assert_eq!(listing(tmp.path()), once);
    }

    #[test]
    fn absent_names_and_directory_are_noops() {
        let tmp = mods_dir_with(&["ModB.jar"]);
        let report = exclude_client_mods(tmp.path(), &["Missing.jar".to_string()]);
        assert!(report.removed.is_empty());

        let report = exclude_client_mods(&tmp.path().join("nope"), &["ModB.jar".to_string()]);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn path_like_names_are_ignored() {
        let tmp = mods_dir_with(&["ModB.jar"]);
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/ModB.jar"), "x").unwrap();

        let report = exclude_client_mods(tmp.path(), &["sub/ModB.jar".to_string()]);

        assert!(report.removed.is_empty());
        assert!(tmp.path().join("sub/ModB.jar").is_file());
    }
}
