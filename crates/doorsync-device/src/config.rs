use doorsync_core::constants::{
    DEFAULT_DEVICE_TIMEOUT_MS, DEFAULT_FACE_LIBRARY_ID, DEFAULT_FACE_LIBRARY_TYPE,
    DEFAULT_PAGE_SIZE, DEFAULT_VALID_BEGIN, DEFAULT_VALID_END,
};
use doorsync_core::{Error, Result};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Connection settings for one access control terminal.
///
/// Built once by the process and handed to [`IsapiClient::new`]; the client
/// never reads configuration from the environment on its own.
///
/// The password is redacted from `Debug` output.
///
/// # Example
///
/// ```
/// use doorsync_device::DeviceConfig;
/// use std::time::Duration;
///
/// let config = DeviceConfig::new("http://192.168.1.64", "admin", "secret")
///     .dev_index("8D6A4F1E-1E2B-4C3D-9F00-0123456789AB")
///     .timeout(Duration::from_secs(5))
///     .page_size(30);
///
/// assert!(!format!("{config:?}").contains("secret"));
/// ```
///
/// [`IsapiClient::new`]: crate::IsapiClient::new
#[derive(Clone)]
pub struct DeviceConfig {
    /// Base URL of the terminal, e.g. `http://192.168.1.64`
    pub base_url: String,

    /// Digest username
    pub username: String,

    /// Digest password (never logged)
    pub password: String,

    /// Device index for terminals reached through an NVR
    pub dev_index: Option<String>,

    /// Timeout for each HTTP request
    pub timeout: Duration,

    /// Users requested per search page
    pub page_size: u32,

    /// Face library identifier (`FDID`)
    pub face_library_id: String,

    /// Face library type (`faceLibType`)
    pub face_library_type: String,

    /// Validity window start written on user creation
    pub valid_begin: String,

    /// Validity window end written on user creation
    pub valid_end: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            dev_index: None,
            timeout: Duration::from_millis(DEFAULT_DEVICE_TIMEOUT_MS),
            page_size: DEFAULT_PAGE_SIZE,
            face_library_id: DEFAULT_FACE_LIBRARY_ID.to_string(),
            face_library_type: DEFAULT_FACE_LIBRARY_TYPE.to_string(),
            valid_begin: DEFAULT_VALID_BEGIN.to_string(),
            valid_end: DEFAULT_VALID_END.to_string(),
        }
    }
}

impl DeviceConfig {
    /// Create a configuration with the given endpoint and credentials
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Set the NVR device index
    pub fn dev_index(mut self, dev_index: impl Into<String>) -> Self {
        self.dev_index = Some(dev_index.into());
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the search page size
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the face library identifier and type
    pub fn face_library(mut self, id: impl Into<String>, library_type: impl Into<String>) -> Self {
        self.face_library_id = id.into();
        self.face_library_type = library_type.into();
        self
    }

    /// Set the validity window written on user creation
    pub fn validity(mut self, begin: impl Into<String>, end: impl Into<String>) -> Self {
        self.valid_begin = begin.into();
        self.valid_end = end.into();
        self
    }

    /// Check the configuration and return the parsed base URL.
    ///
    /// # Errors
    /// Returns `Error::Config` if the base URL is not an absolute http(s) URL,
    /// the username is empty, or the page size is zero.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid device base_url {:?}: {e}", self.base_url)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "device base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.username.is_empty() {
            return Err(Error::Config("device username is empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("device page_size must be at least 1".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("device timeout must be positive".to_string()));
        }

        Ok(url)
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dev_index", &self.dev_index)
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .field("face_library_id", &self.face_library_id)
            .field("face_library_type", &self.face_library_type)
            .field("valid_begin", &self.valid_begin)
            .field("valid_end", &self.valid_end)
            .finish()
    }
}
