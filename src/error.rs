use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to open {path:?}: {reason}")]
    ContainerOpen { path: PathBuf, reason: String },

    #[error("Unknown AppImage format")]
    UnknownFormat,

    #[error("Malformed ELF header: {0}")]
    InvalidElf(String),

    #[error("Unsupported payload encoding: {0}")]
    UnsupportedPayload(String),

    #[error("Payload iteration failed: {0}")]
    PayloadIterator(String),

    #[error("Entry not found in payload: {0}")]
    NotFound(String),

    #[error("Links loop found while resolving {requested} (revisited {revisited})")]
    CycleDetected { requested: String, revisited: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Desktop integration failed: {0}")]
    Integration(String),
}

impl AppImageError {
    /// Wrap any failure raised while opening `path` into `ContainerOpen`
    pub fn container_open(path: impl Into<PathBuf>, err: AppImageError) -> Self {
        match err {
            AppImageError::ContainerOpen { .. } => err,
            other => AppImageError::ContainerOpen {
                path: path.into(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AppImageError>;
