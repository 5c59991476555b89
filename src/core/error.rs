use std::path::{Path, PathBuf};
use thiserror::Error;

/// Central error type for the installation pipeline.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Transport ───────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    #[error("Malformed HTTP response from {host}: {reason}")]
    MalformedResponse { host: String, reason: String },

    #[error("Content-Length mismatch for {url}: expected {expected} bytes, got {actual}")]
    ContentLengthMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("Timed out after {seconds}s while {action}")]
    Timeout { action: String, seconds: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Destination already exists: {0:?}")]
    DestinationExists(PathBuf),

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── JSON / XML ──────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive {archive:?} has no entry named '{entry}'")]
    MissingArchiveEntry { archive: PathBuf, entry: String },

    // ── Install profile ─────────────────────────────────
    #[error("Install profile is missing required key '{0}'")]
    MissingProfileKey(String),

    #[error("Cannot resolve data value {key}={value}: {reason}")]
    UnresolvableToken {
        key: String,
        value: String,
        reason: String,
    },

    // ── Processors ──────────────────────────────────────
    #[error("Main-Class missing in processor jar {0:?}")]
    MissingMainClass(PathBuf),

    #[error(
        "Processor #{index} ({}) exited with code {code:?}: {stderr_tail}",
        .task.as_deref().unwrap_or("unnamed")
    )]
    ProcessorFailed {
        index: usize,
        task: Option<String>,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error(
        "Processor #{index} ({}) could not be started: {source}",
        .task.as_deref().unwrap_or("unnamed")
    )]
    ProcessorSpawn {
        index: usize,
        task: Option<String>,
        source: std::io::Error,
    },

    // ── Cache ───────────────────────────────────────────
    #[error("Cache index at {path:?} is unusable: {reason}")]
    CacheIndex { path: PathBuf, reason: String },

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    // ── Task ────────────────────────────────────────────
    #[error("Task cancelled")]
    Cancelled,

    #[error("Stage {to} cannot follow {from}")]
    StageRegression { from: String, to: String },

    #[error("Mod-loader install failed: {source}")]
    LoaderInstall {
        loader: String,
        source: Box<LauncherError>,
    },

    #[error("Game install failed for {version}: {source}")]
    GameInstall {
        version: String,
        source: Box<LauncherError>,
    },

    #[error("Modpack install failed: {name}, {source}")]
    ModpackInstall {
        name: String,
        source: Box<LauncherError>,
    },

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// Attach a path to a raw IO error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True when this error (or the cause it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            LauncherError::Cancelled => true,
            LauncherError::LoaderInstall { source, .. }
            | LauncherError::GameInstall { source, .. }
            | LauncherError::ModpackInstall { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
