use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the pack builder.
/// Every module returns `Result<T, PackError>`.
#[derive(Debug, Error)]
pub enum PackError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Parsing ─────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    // ── Configuration ───────────────────────────────────
    #[error("Configuration error in `{key}`: {message}")]
    Config { key: String, message: String },

    // ── Loader ──────────────────────────────────────────
    #[error("Unknown modloader `{0}`. Must be either Forge or Fabric")]
    UnknownLoader(String),

    #[error("{loader} {version} installation failed: {message}")]
    Install {
        loader: String,
        version: String,
        message: String,
    },

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Artifacts ───────────────────────────────────────
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(u64),

    #[error("Artifact registry error: {0}")]
    Registry(String),

    #[error("A build for {0:?} is already running")]
    BuildInProgress(PathBuf),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type PackResult<T> = Result<T, PackError>;

impl PackError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        PackError::Config {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PackError {
    fn from(source: std::io::Error) -> Self {
        PackError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for PackError {
    fn from(value: tokio::task::JoinError) -> Self {
        PackError::Other(format!("background task failed: {value}"))
    }
}
