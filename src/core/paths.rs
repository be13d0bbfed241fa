use std::path::{Path, PathBuf};

use crate::core::error::{PackError, PackResult};

pub const CONFIG_FILE_NAME: &str = "serverpackcreator.conf";
pub const LEGACY_CONFIG_FILE_NAME: &str = "creator.conf";

const SERVER_FILES_DIR: &str = "server_files";
const SERVER_PACKS_DIR: &str = "server-packs";
const WORK_DIR: &str = "work";
const MANIFESTS_DIR: &str = "manifests";

/// Fixed file-system layout of one packforge installation.
///
/// Built once at startup and handed to every component that touches disk.
/// Nothing here is mutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPaths {
    base_dir: PathBuf,
}

impl PackPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Layout rooted at the process working directory, the way the
    /// single-shot tool has always been run.
    pub fn current_dir() -> PackResult<Self> {
        let cwd = std::env::current_dir().map_err(|e| PackError::io(".", e))?;
        Ok(Self::new(cwd))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    pub fn legacy_config_file(&self) -> PathBuf {
        self.base_dir.join(LEGACY_CONFIG_FILE_NAME)
    }

    /// Editable copies of start scripts, icon and properties.
    pub fn server_files_dir(&self) -> PathBuf {
        self.base_dir.join(SERVER_FILES_DIR)
    }

    pub fn server_file(&self, name: &str) -> PathBuf {
        self.server_files_dir().join(name)
    }

    /// Where assembled packs and their archives are written.
    pub fn server_packs_dir(&self) -> PathBuf {
        self.base_dir.join(SERVER_PACKS_DIR)
    }

    /// Staged modpack sources of the hosted variant: `work/<project>/<file>`.
    pub fn work_dir(&self) -> PathBuf {
        self.base_dir.join(WORK_DIR)
    }

    pub fn staged_source(&self, project_id: u32, file_id: u32) -> PathBuf {
        self.work_dir()
            .join(project_id.to_string())
            .join(file_id.to_string())
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.base_dir.join(MANIFESTS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_source_nests_project_and_file() {
        let paths = PackPaths::new("/srv/packforge");
        assert_eq!(
            paths.staged_source(238222, 3652110),
            PathBuf::from("/srv/packforge/work/238222/3652110")
        );
    }

    #[test]
    fn legacy_and_canonical_config_share_directory() {
        let paths = PackPaths::new("/srv/packforge");
        assert_eq!(paths.config_file().parent(), paths.legacy_config_file().parent());
        assert_ne!(paths.config_file(), paths.legacy_config_file());
    }
}
