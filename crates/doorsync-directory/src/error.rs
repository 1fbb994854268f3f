use std::path::PathBuf;
use thiserror::Error;

/// Failures loading the personnel directory.
///
/// All of these are fatal for a run: without a source there is nothing to
/// reconcile against. Individual malformed entries are not errors; they are
/// reported in [`DirectorySnapshot::skipped`](crate::DirectorySnapshot::skipped).
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Snapshot file could not be read
    #[error("Failed to read directory snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Feed request failed before a response arrived
    #[error("Directory feed request failed: {0}")]
    Http(String),

    /// Feed answered with a non-success status
    #[error("Directory feed returned HTTP {status}")]
    Status { status: u16 },

    /// Feed did not answer in time
    #[error("Directory feed timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Document is not JSON
    #[error("Directory document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Document is JSON but neither an object map nor an array
    #[error("Directory document must be a JSON object or array, got {0}")]
    Format(String),

    /// Source misconfigured
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DirectoryError {
    /// Create a read error for the given file.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

/// Specialized result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;
