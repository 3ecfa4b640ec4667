use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot access {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path already indexed: {0}")]
    Conflict(PathBuf),

    #[error("Cannot watch {path}: {reason}")]
    WatchUnavailable { path: PathBuf, reason: String },

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Canonicalizes a path, returning the original if canonicalization fails.
pub fn canonicalize_existing_path(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path).unwrap_or(path)
}

/// Validates an operator-supplied root path and turns it into the absolute
/// form used as a natural key.
///
/// Rejects empty input before touching the filesystem. Existing paths are
/// canonicalized; missing ones are made absolute against the working
/// directory so they can still be tracked.
pub fn normalize_root_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(IndexError::InvalidInput("path must not be empty".to_string()));
    }
    let absolute = std::path::absolute(path).map_err(|error| {
        IndexError::InvalidInput(format!("unable to resolve {}: {error}", path.display()))
    })?;
    Ok(canonicalize_existing_path(absolute))
}
