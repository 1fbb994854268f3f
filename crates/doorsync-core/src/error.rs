use thiserror::Error;

/// Response body fragments the terminal uses when the addressed record does
/// not exist. Matched case-insensitively.
const NOT_FOUND_MARKERS: &[&str] = &["notexist", "not exist", "nomatch", "no match", "notfound"];

#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    // Device errors
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Device rejected request (HTTP {status}): {body}")]
    DeviceRejected { status: u16, body: String },

    #[error("Invalid device response: {0}")]
    InvalidResponse(String),

    // Record errors
    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    // Local resource errors
    #[error("Failed to remove temporary file {path}: {message}")]
    ResourceCleanup { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a new device rejection carrying the raw response body.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::DeviceRejected {
            status,
            body: body.into(),
        }
    }

    /// Create a new malformed record error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Create a new cleanup failure for a staged file.
    pub fn cleanup(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceCleanup {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for Digest challenge or credential failures.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns `true` for network level failures, timeouts included.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// Returns `true` when the device refused the request because the
    /// addressed record does not exist.
    ///
    /// ```
    /// use doorsync_core::Error;
    ///
    /// assert!(Error::rejected(404, "").is_not_found());
    /// assert!(Error::rejected(400, r#"{"subStatusCode":"noMatch"}"#).is_not_found());
    /// assert!(!Error::rejected(500, "badJsonFormat").is_not_found());
    /// ```
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::DeviceRejected { status: 404, .. } => true,
            Self::DeviceRejected { body, .. } => {
                let body = body.to_ascii_lowercase();
                NOT_FOUND_MARKERS.iter().any(|marker| body.contains(marker))
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
