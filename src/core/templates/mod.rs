// ─── Default Files ───
// Bundled defaults extracted next to the binary on first run so they can be
// customized before anything is built.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::core::paths::{PackPaths, CONFIG_FILE_NAME};

pub const FORGE_SH: &str = "start-forge.sh";
pub const FORGE_BAT: &str = "start-forge.bat";
pub const FABRIC_SH: &str = "start-fabric.sh";
pub const FABRIC_BAT: &str = "start-fabric.bat";
pub const SERVER_PROPERTIES: &str = "server.properties";
pub const SERVER_ICON: &str = "server-icon.png";

macro_rules! resource {
    ($path:literal) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/", $path))
    };
}

const CONFIG_DEFAULT: &[u8] = resource!("serverpackcreator.conf");

/// Files living in `server_files/`, in extraction order.
const SERVER_FILE_DEFAULTS: [(&str, &[u8]); 6] = [
    (FABRIC_SH, resource!("server_files/start-fabric.sh")),
    (FABRIC_BAT, resource!("server_files/start-fabric.bat")),
    (FORGE_SH, resource!("server_files/start-forge.sh")),
    (FORGE_BAT, resource!("server_files/start-forge.bat")),
    (SERVER_PROPERTIES, resource!("server_files/server.properties")),
    (SERVER_ICON, resource!("server_files/server-icon.png")),
];

/// A bundled default and where it belongs on disk.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub name: &'static str,
    pub bytes: &'static [u8],
    pub target: PathBuf,
}

impl TemplateFile {
    pub fn exists(&self) -> bool {
        self.target.exists()
    }
}

/// What to do when defaults had to be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRunPolicy {
    /// Stop so the operator can edit the freshly generated files.
    Halt,
    /// Warn and keep going with the defaults.
    Continue,
}

impl FirstRunPolicy {
    pub fn from_halt_flag(halt_on_first_run: bool) -> Self {
        if halt_on_first_run {
            FirstRunPolicy::Halt
        } else {
            FirstRunPolicy::Continue
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub per_file: BTreeMap<String, bool>,
}

impl BootstrapReport {
    pub fn any_generated(&self) -> bool {
        self.per_file.values().any(|generated| *generated)
    }

    pub fn generated(&self) -> impl Iterator<Item = &str> {
        self.per_file
            .iter()
            .filter(|(_, generated)| **generated)
            .map(|(name, _)| name.as_str())
    }

    pub fn should_halt(&self, policy: FirstRunPolicy) -> bool {
        policy == FirstRunPolicy::Halt && self.any_generated()
    }
}

/// Makes sure every default file exists.
pub struct Bootstrapper<'a> {
    paths: &'a PackPaths,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(paths: &'a PackPaths) -> Self {
        Self { paths }
    }

    pub fn templates(&self) -> Vec<TemplateFile> {
        let mut templates = vec![TemplateFile {
            name: CONFIG_FILE_NAME,
            bytes: CONFIG_DEFAULT,
            target: self.paths.config_file(),
        }];
        templates.extend(SERVER_FILE_DEFAULTS.iter().map(|&(name, bytes)| TemplateFile {
            name,
            bytes,
            target: self.paths.server_file(name),
        }));
        templates
    }

    pub fn ensure_defaults(&self) -> BootstrapReport {
        info!("Checking for default files...");

        let server_files = self.paths.server_files_dir();
        if let Err(e) = std::fs::create_dir_all(&server_files) {
            error!(dir = ?server_files, error = %e, "Could not create server_files directory");
        }

        let mut report = BootstrapReport::default();
        for template in self.templates() {
            let generated = if template.name == CONFIG_FILE_NAME {
                self.ensure_config(&template)
            } else {
                ensure_template(&template)
            };
            report.per_file.insert(template.name.to_string(), generated);
        }

        if report.any_generated() {
            warn!("################################################################");
            warn!("#             ONE OR MORE DEFAULT FILE(S) GENERATED.           #");
            warn!("#               CUSTOMIZE THEM BEFORE CONTINUING!              #");
            warn!("################################################################");
            for name in report.generated() {
                warn!(file = name, "generated default file");
            }
        } else {
            info!("Setup completed.");
        }

        report
    }

    /// A legacy `creator.conf` wins over extracting the bundled template.
    fn ensure_config(&self, template: &TemplateFile) -> bool {
        let legacy = self.paths.legacy_config_file();
        if legacy.exists() {
            if template.exists() {
                warn!(
                    legacy = ?legacy,
                    "Both legacy and current config files exist, ignoring the legacy one"
                );
                return false;
            }
            migrate_legacy_config(&legacy, &template.target);
            return false;
        }
        ensure_template(template)
    }
}

fn migrate_legacy_config(legacy: &Path, target: &Path) {
    match std::fs::copy(legacy, target) {
        Ok(_) => match std::fs::remove_file(legacy) {
            Ok(()) => info!(from = ?legacy, to = ?target, "Migrated legacy config file"),
            Err(e) => warn!(file = ?legacy, error = %e, "Copied legacy config but could not delete it"),
        },
        Err(e) => error!(from = ?legacy, to = ?target, error = %e, "Could not migrate legacy config file"),
    }
}

/// Extract one template unless it already exists.
///
/// Returns `true` when the file was generated, or when extraction failed for
/// any reason other than the file already existing.
fn ensure_template(template: &TemplateFile) -> bool {
    if template.exists() {
        return false;
    }

    match extract(template) {
        Ok(()) => {
            info!(file = template.name, "Generated default file. Please customize if you intend on using it.");
            true
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
        Err(e) => {
            error!(file = template.name, target = ?template.target, error = %e, "Could not extract default file");
            true
        }
    }
}

fn extract(template: &TemplateFile) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&template.target)?;
    file.write_all(template.bytes)?;
    file.flush()
}

/// Bundled bytes for a `server_files/` entry.
pub fn bundled_server_file(name: &str) -> Option<&'static [u8]> {
    SERVER_FILE_DEFAULTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, bytes)| *bytes)
}
