// ─── Configuration Document ───
// `key = value` file with `#` comments, quoted strings and bracketed lists.
// The syntax is a subset of TOML, so parsing goes through the `toml` crate.

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::{debug, info, warn};

use super::model::{dedup_preserving_order, normalize_java_path, PackConfiguration};
use crate::core::error::{PackError, PackResult};
use crate::core::paths::LEGACY_CONFIG_FILE_NAME;

pub const KEY_MODPACK_DIR: &str = "modpackDir";
pub const KEY_CLIENT_MODS: &str = "clientMods";
pub const KEY_COPY_DIRS: &str = "copyDirs";
pub const KEY_INCLUDE_SERVER_INSTALLATION: &str = "includeServerInstallation";
pub const KEY_JAVA_PATH: &str = "javaPath";
pub const KEY_MINECRAFT_VERSION: &str = "minecraftVersion";
pub const KEY_MOD_LOADER: &str = "modLoader";
pub const KEY_MOD_LOADER_VERSION: &str = "modLoaderVersion";
pub const KEY_INCLUDE_SERVER_ICON: &str = "includeServerIcon";
pub const KEY_INCLUDE_SERVER_PROPERTIES: &str = "includeServerProperties";
pub const KEY_INCLUDE_START_SCRIPTS: &str = "includeStartScripts";
pub const KEY_INCLUDE_ZIP_CREATION: &str = "includeZipCreation";

/// Read and validate a configuration file.
pub fn load(path: &Path) -> PackResult<PackConfiguration> {
    info!(file = ?path, "Getting configuration...");
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PackError::config(path.display().to_string(), format!("cannot read file: {e}"))
    })?;
    parse(&raw).map_err(|e| match e {
        PackError::Other(message) => PackError::config(path.display().to_string(), message),
        other => other,
    })
}

/// Parse the document text. Errors name the offending key.
pub fn parse(raw: &str) -> PackResult<PackConfiguration> {
    let table: Table = raw
        .parse()
        .map_err(|e: toml::de::Error| PackError::Other(format!("malformed document: {}", e.message())))?;

    let client_mods = string_list(&table, KEY_CLIENT_MODS)?;
    let copy_dirs = string_list(&table, KEY_COPY_DIRS)?;

    Ok(PackConfiguration {
        modpack_dir: PathBuf::from(string(&table, KEY_MODPACK_DIR)?),
        client_mods: dedup_preserving_order(client_mods),
        copy_dirs: dedup_preserving_order(copy_dirs),
        include_server_installation: boolean(&table, KEY_INCLUDE_SERVER_INSTALLATION)?,
        java_path: normalize_java_path(&string(&table, KEY_JAVA_PATH)?),
        minecraft_version: string(&table, KEY_MINECRAFT_VERSION)?,
        mod_loader: string(&table, KEY_MOD_LOADER)?,
        mod_loader_version: string(&table, KEY_MOD_LOADER_VERSION)?,
        include_server_icon: boolean(&table, KEY_INCLUDE_SERVER_ICON)?,
        include_server_properties: boolean(&table, KEY_INCLUDE_SERVER_PROPERTIES)?,
        include_start_scripts: boolean(&table, KEY_INCLUDE_START_SCRIPTS)?,
        include_zip_creation: boolean(&table, KEY_INCLUDE_ZIP_CREATION)?,
    })
}

fn value<'t>(table: &'t Table, key: &str) -> PackResult<&'t Value> {
    table
        .get(key)
        .ok_or_else(|| PackError::config(key, "missing key"))
}

fn string(table: &Table, key: &str) -> PackResult<String> {
    match value(table, key)? {
        Value::String(s) => Ok(s.clone()),
        other => Err(PackError::config(
            key,
            format!("expected a quoted string, found {}", other.type_str()),
        )),
    }
}

fn boolean(table: &Table, key: &str) -> PackResult<bool> {
    match value(table, key)? {
        Value::Boolean(b) => Ok(*b),
        other => Err(PackError::config(
            key,
            format!("expected true or false, found {}", other.type_str()),
        )),
    }
}

fn string_list(table: &Table, key: &str) -> PackResult<Vec<String>> {
    let Value::Array(items) = value(table, key)? else {
        return Err(PackError::config(key, "expected a bracketed list"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(PackError::config(
                key,
                format!("entry {i} must be a quoted string, found {}", other.type_str()),
            )),
        })
        .collect()
}

/// Render the configuration as a commented document.
pub fn render(config: &PackConfiguration) -> String {
    let mut out = String::new();
    let mut entry = |comment: &[&str], key: &str, value: Value| {
        for line in comment {
            let _ = writeln!(out, "# {line}");
        }
        let _ = writeln!(out, "{key} = {value}\n");
    };

    entry(
        &[
            "Path to your modpack. Either relative to this file's directory or absolute.",
            "Example: \"./Some Modpack\" or \"C:/Minecraft/Some Modpack\"",
        ],
        KEY_MODPACK_DIR,
        Value::String(config.modpack_dir.to_string_lossy().into_owned()),
    );
    entry(
        &[
            "Client-only mods which must not ship in the server pack.",
            "Matched by file name only.",
        ],
        KEY_CLIENT_MODS,
        string_array(&config.client_mods),
    );
    entry(
        &[
            "Directories inside the modpack to copy into the server pack.",
            "Prefix an entry with \"saves/\" to copy that world to the root of the server pack.",
        ],
        KEY_COPY_DIRS,
        string_array(&config.copy_dirs),
    );
    entry(
        &[
            "Whether to install the modloader server into the server pack.",
            "Requires javaPath, minecraftVersion, modLoader and modLoaderVersion. Default: true",
        ],
        KEY_INCLUDE_SERVER_INSTALLATION,
        Value::Boolean(config.include_server_installation),
    );
    entry(
        &[
            "Path to the java executable used to run the modloader installer.",
            "A trailing \".exe\" is removed.",
        ],
        KEY_JAVA_PATH,
        Value::String(config.java_path.clone()),
    );
    entry(
        &["Minecraft version of the modpack."],
        KEY_MINECRAFT_VERSION,
        Value::String(config.minecraft_version.clone()),
    );
    entry(
        &["Modloader of the modpack. Either \"Forge\" or \"Fabric\"."],
        KEY_MOD_LOADER,
        Value::String(config.mod_loader.clone()),
    );
    entry(
        &["Version of the modloader."],
        KEY_MOD_LOADER_VERSION,
        Value::String(config.mod_loader_version.clone()),
    );
    entry(
        &["Whether to copy server_files/server-icon.png into the server pack. Default: true"],
        KEY_INCLUDE_SERVER_ICON,
        Value::Boolean(config.include_server_icon),
    );
    entry(
        &["Whether to copy server_files/server.properties into the server pack. Default: true"],
        KEY_INCLUDE_SERVER_PROPERTIES,
        Value::Boolean(config.include_server_properties),
    );
    entry(
        &["Whether to copy the start scripts for the modloader into the server pack. Default: true"],
        KEY_INCLUDE_START_SCRIPTS,
        Value::Boolean(config.include_start_scripts),
    );
    entry(
        &["Whether to create a zip archive of the server pack. Default: true"],
        KEY_INCLUDE_ZIP_CREATION,
        Value::Boolean(config.include_zip_creation),
    );

    out
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// Replace the file at `path` (and any legacy-named sibling) with `config`.
///
/// Existing files are deleted first; a failed delete is logged and the write
/// is still attempted.
pub fn write(config: &PackConfiguration, path: &Path) -> PackResult<()> {
    let legacy = path.with_file_name(LEGACY_CONFIG_FILE_NAME);
    for existing in [path, legacy.as_path()] {
        match std::fs::remove_file(existing) {
            Ok(()) => debug!(file = ?existing, "removed previous configuration"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(file = ?existing, error = %e, "Could not delete previous configuration"),
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
    }
    std::fs::write(path, render(config)).map_err(|e| PackError::io(path, e))?;

    info!(file = ?path, "Configuration written");
    Ok(())
}
