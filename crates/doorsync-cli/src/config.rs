//! `doorsync.toml` loading.
//!
//! ```toml
//! [device]
//! base_url = "http://192.168.1.64"
//! username = "admin"
//! password_env = "DOORSYNC_DEVICE_PASSWORD"
//!
//! [directory]
//! url = "https://hr.example.com/doors/users.json"
//! token_env = "DOORSYNC_DIRECTORY_TOKEN"
//!
//! [faces]
//! enabled = true
//!
//! [run]
//! concurrency = 4
//! report_path = "last-run.json"
//! ```
//!
//! Secrets can be written inline (`password`) or read from the environment
//! (`password_env`, `token_env`). Environment lookups go through a closure so
//! resolution can be tested without touching the process environment.

use doorsync_core::constants::{
    DEFAULT_DEVICE_TIMEOUT_MS, DEFAULT_FACE_LIBRARY_ID, DEFAULT_FACE_LIBRARY_TYPE,
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_PHOTO_BYTES, DEFAULT_PAGE_SIZE, DEFAULT_VALID_BEGIN,
    DEFAULT_VALID_END,
};
use doorsync_device::DeviceConfig;
use doorsync_directory::{AnySource, FeedSource, SnapshotSource};
use doorsync_engine::{FetchConfig, RunOptions, StagingConfig};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DIRECTORY_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Environment variable {name} is not set")]
    MissingEnv { name: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Top-level `doorsync.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub device: DeviceSection,
    pub directory: DirectorySection,

    #[serde(default)]
    pub faces: FacesSection,

    #[serde(default)]
    pub run: RunSection,
}

/// `[device]`
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSection {
    pub base_url: String,
    pub username: String,

    /// Inline password; prefer `password_env`
    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(default)]
    pub dev_index: Option<String>,

    #[serde(default = "default_device_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_face_library_id")]
    pub face_library_id: String,

    #[serde(default = "default_face_library_type")]
    pub face_library_type: String,

    #[serde(default = "default_valid_begin")]
    pub valid_begin: String,

    #[serde(default = "default_valid_end")]
    pub valid_end: String,
}

impl fmt::Debug for DeviceSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSection")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .field("dev_index", &self.dev_index)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// `[directory]`: exactly one of `path` or `url`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorySection {
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub url: Option<String>,

    /// Environment variable holding a bearer token for `url`
    #[serde(default)]
    pub token_env: Option<String>,

    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[faces]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacesSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Accept `file://` and plain path photo references
    #[serde(default)]
    pub allow_local_paths: bool,

    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: u64,
}

impl Default for FacesSection {
    fn default() -> Self {
        Self {
            enabled: true,
            staging_dir: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            allow_local_paths: false,
            max_photo_bytes: default_max_photo_bytes(),
        }
    }
}

/// `[run]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            report_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_device_timeout_secs() -> u64 {
    DEFAULT_DEVICE_TIMEOUT_MS / 1000
}

fn default_directory_timeout_secs() -> u64 {
    DEFAULT_DIRECTORY_TIMEOUT_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS / 1000
}

fn default_max_photo_bytes() -> u64 {
    DEFAULT_MAX_PHOTO_BYTES
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_face_library_id() -> String {
    DEFAULT_FACE_LIBRARY_ID.to_string()
}

fn default_face_library_type() -> String {
    DEFAULT_FACE_LIBRARY_TYPE.to_string()
}

fn default_valid_begin() -> String {
    DEFAULT_VALID_BEGIN.to_string()
}

fn default_valid_end() -> String {
    DEFAULT_VALID_END.to_string()
}

fn default_concurrency() -> usize {
    1
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Config {
    /// Read and validate a config file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file is unreadable, malformed or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot express.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.directory.path, &self.directory.url) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    "[directory] must set either path or url, not both",
                ));
            }
            (None, None) => {
                return Err(ConfigError::invalid("[directory] must set path or url"));
            }
            _ => {}
        }
        if self.directory.token_env.is_some() && self.directory.url.is_none() {
            return Err(ConfigError::invalid("[directory] token_env requires url"));
        }
        if self.device.password.is_some() && self.device.password_env.is_some() {
            return Err(ConfigError::invalid(
                "[device] must set either password or password_env, not both",
            ));
        }
        if self.device.timeout_secs == 0 {
            return Err(ConfigError::invalid("[device] timeout_secs must be at least 1"));
        }
        if self.directory.timeout_secs == 0 {
            return Err(ConfigError::invalid("[directory] timeout_secs must be at least 1"));
        }
        if self.faces.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid("[faces] fetch_timeout_secs must be at least 1"));
        }
        if self.faces.max_photo_bytes == 0 {
            return Err(ConfigError::invalid("[faces] max_photo_bytes must be at least 1"));
        }
        if self.run.concurrency == 0 {
            return Err(ConfigError::invalid("[run] concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Device settings with the password resolved from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the password variable is unset or the
    /// device settings are invalid.
    pub fn device_config(&self) -> Result<DeviceConfig, ConfigError> {
        self.device_config_with(process_env)
    }

    /// Device settings, resolving `password_env` through `lookup`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the password variable is unset or the
    /// device settings are invalid.
    pub fn device_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<DeviceConfig, ConfigError> {
        let device = &self.device;
        let password = match (&device.password, &device.password_env) {
            (Some(password), _) => password.clone(),
            (None, Some(name)) => lookup(name).ok_or_else(|| ConfigError::MissingEnv { name: name.clone() })?,
            (None, None) => String::new(),
        };

        let mut config = DeviceConfig::new(&device.base_url, &device.username, password)
            .timeout(Duration::from_secs(device.timeout_secs))
            .page_size(device.page_size)
            .face_library(&device.face_library_id, &device.face_library_type)
            .validity(&device.valid_begin, &device.valid_end);
        if let Some(dev_index) = &device.dev_index {
            config = config.dev_index(dev_index);
        }

        config
            .validate()
            .map_err(|e| ConfigError::invalid(e.to_string()))?;
        Ok(config)
    }

    /// Directory source with the token resolved from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the token variable is unset or the feed URL
    /// is invalid.
    pub fn directory_source(&self) -> Result<AnySource, ConfigError> {
        self.directory_source_with(process_env)
    }

    /// Directory source, resolving `token_env` through `lookup`.
    ///
    /// Relative snapshot paths are taken as-is, relative to the working
    /// directory.
    ///
    /// # Errors
    /// Returns `ConfigError` if the token variable is unset or the feed URL
    /// is invalid.
    pub fn directory_source_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<AnySource, ConfigError> {
        let directory = &self.directory;
        match (&directory.path, &directory.url) {
            (Some(path), None) => Ok(AnySource::Snapshot(SnapshotSource::new(path))),
            (None, Some(url)) => {
                let token = directory
                    .token_env
                    .as_ref()
                    .map(|name| lookup(name).ok_or_else(|| ConfigError::MissingEnv { name: name.clone() }))
                    .transpose()?;
                let feed = FeedSource::new(url, token, Duration::from_secs(directory.timeout_secs))
                    .map_err(|e| ConfigError::invalid(e.to_string()))?;
                Ok(AnySource::Feed(feed))
            }
            _ => Err(ConfigError::invalid("[directory] must set exactly one of path or url")),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.faces.fetch_timeout_secs),
            allow_local_paths: self.faces.allow_local_paths,
            max_bytes: self.faces.max_photo_bytes,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            faces: self.faces.enabled,
            concurrency: self.run.concurrency,
            staging: StagingConfig {
                dir: self.faces.staging_dir.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [device]
        base_url = "http://10.0.0.5"
        username = "admin"
        password = "pw"

        [directory]
        path = "users.json"
    "#;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert!(config.faces.enabled);
        assert_eq!(config.faces.fetch_timeout_secs, 15);
        assert_eq!(config.run.concurrency, 1);
        assert_eq!(config.device.timeout_secs, 10);
        assert_eq!(config.device.page_size, 30);
        assert!(config.run.report_path.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("\"pw\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = format!("{MINIMAL}\n[run]\nparallelism = 3\n");
        assert!(toml::from_str::<Config>(&toml).is_err());
    }
}
