// ─── Packager ───
// Zips an assembled pack root into `<name>_server_pack.zip` next to it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::error::{PackError, PackResult};
use crate::core::loaders::ModLoader;

pub const ARCHIVE_SUFFIX: &str = "_server_pack.zip";

/// Marker file present in a pack root while it is being assembled.
pub const BUILD_MARKER: &str = ".packforge-building";

const PART_SUFFIX: &str = ".part";

/// Lowercase loader name used in file names. Unknown loaders keep their
/// configured spelling, lowercased.
pub fn loader_slug(loader: &str) -> String {
    match ModLoader::parse(loader) {
        Some(known) => known.slug().to_string(),
        None => loader.trim().to_lowercase(),
    }
}

/// `<base>_<loader>-<mc>`, the directory name every pipeline uses for a pack root.
pub fn pack_root_name(base: &str, loader: &str, minecraft_version: &str) -> String {
    format!("{base}_{}-{minecraft_version}", loader_slug(loader))
}

/// Archive written for `pack_root`.
///
/// A pack root already named `..._<loader>-<mc>` keeps its name, anything
/// else gets the loader and version appended first.
pub fn archive_path_for(pack_root: &Path, loader: &str, minecraft_version: &str) -> PathBuf {
    let name = pack_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tag = format!("{}-{minecraft_version}", loader_slug(loader));
    let stem = if name.ends_with(&tag) {
        name
    } else {
        format!("{name}_{tag}")
    };
    pack_root.with_file_name(format!("{stem}{ARCHIVE_SUFFIX}"))
}

/// Expanded directory that belongs to `archive`, if it carries the suffix.
pub fn expanded_dir_for(archive: &Path) -> Option<PathBuf> {
    let name = archive.file_name()?.to_str()?;
    let stem = name.strip_suffix(ARCHIVE_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(archive.with_file_name(stem))
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// Paths relative to the pack root left out of the archive. A directory
    /// excludes everything below it.
    pub exclude: Vec<PathBuf>,
}

impl ArchiveOptions {
    fn excludes(&self, relative: &Path) -> bool {
        relative == Path::new(BUILD_MARKER) || self.exclude.iter().any(|e| relative.starts_with(e))
    }
}

pub struct Packager;

impl Packager {
    /// Write the archive for `pack_root` and return its path.
    ///
    /// The archive is assembled under `<archive>.part` and renamed into place,
    /// so a half-written file never carries the final name.
    pub fn archive(
        pack_root: &Path,
        loader: &str,
        minecraft_version: &str,
        options: &ArchiveOptions,
    ) -> PackResult<PathBuf> {
        if !pack_root.is_dir() {
            return Err(PackError::io(
                pack_root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "pack root does not exist"),
            ));
        }

        let archive = archive_path_for(pack_root, loader, minecraft_version);
        let mut part = archive.clone().into_os_string();
        part.push(PART_SUFFIX);
        let part = PathBuf::from(part);

        info!(archive = ?archive, "Creating zip archive of server pack...");
        let display = ModLoader::parse(loader).map_or_else(|| loader.trim().to_string(), |l| l.to_string());
        let comment = format!("{display} {minecraft_version} server pack");
        if let Err(e) = write_archive(pack_root, &part, &comment, options) {
            if let Err(cleanup) = std::fs::remove_file(&part) {
                warn!(file = ?part, error = %cleanup, "Could not remove partial archive");
            }
            return Err(e);
        }

        std::fs::rename(&part, &archive).map_err(|e| PackError::io(&archive, e))?;
        info!(archive = ?archive, "Finished creating zip archive of server pack");
        Ok(archive)
    }
}

fn write_archive(pack_root: &Path, target: &Path, comment: &str, options: &ArchiveOptions) -> PackResult<()> {
    let file = File::create(target).map_err(|e| PackError::io(target, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let base_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = 0usize;

    let mut walker = WalkDir::new(pack_root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| pack_root.to_path_buf());
            PackError::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(pack_root) else {
            continue;
        };
        if options.excludes(relative) {
            debug!(path = ?relative, "Leaving out of archive");
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let name = entry_name(relative);
        if entry.file_type().is_dir() {
            zip.add_directory(name, base_options)?;
        } else if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(|e| PackError::io(entry.path(), e.into()))?;
            zip.start_file(name, with_mode(base_options, &metadata))?;
            let mut source = File::open(entry.path()).map_err(|e| PackError::io(entry.path(), e))?;
            std::io::copy(&mut source, &mut zip).map_err(|e| PackError::io(entry.path(), e))?;
        } else {
            continue;
        }
        entries += 1;
    }

    zip.set_comment(comment);
    let mut writer = zip.finish()?;
    writer.flush().map_err(|e| PackError::io(target, e))?;
    debug!(entries, "Archive written");
    Ok(())
}

/// Archive entry names always use `/`.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn with_mode(options: SimpleFileOptions, metadata: &std::fs::Metadata) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    options.unix_permissions(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn with_mode(options: SimpleFileOptions, _metadata: &std::fs::Metadata) -> SimpleFileOptions {
    options
}
