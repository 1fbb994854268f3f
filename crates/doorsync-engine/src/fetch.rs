//! Photo retrieval.

#![allow(async_fn_in_trait)]

use bytes::{Bytes, BytesMut};
use doorsync_core::constants::{DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_PHOTO_BYTES};
use doorsync_core::{Error, Result};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Reads the bytes behind a photo reference.
pub trait PhotoFetcher: Send + Sync {
    async fn fetch(&self, photo_ref: &str) -> Result<Bytes>;
}

/// Settings for [`HttpPhotoFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for each photo download
    pub timeout: Duration,

    /// Accept `file://` URLs and plain paths. Off by default, since photo
    /// references come from the remote directory.
    pub allow_local_paths: bool,

    /// Photos larger than this are refused
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            allow_local_paths: false,
            max_bytes: DEFAULT_MAX_PHOTO_BYTES,
        }
    }
}

/// Fetches `http(s)://` references over HTTP. `file://` URLs and plain
/// paths are read from the local filesystem when
/// [`FetchConfig::allow_local_paths`] is set.
#[derive(Debug, Clone)]
pub struct HttpPhotoFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpPhotoFetcher {
    /// # Errors
    /// Returns `Error::Config` if the HTTP client cannot be built.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build photo HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn fetch_http(&self, url: Url) -> Result<Bytes> {
        let mut response = self.http.get(url).send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(format!("photo server returned HTTP {}", status.as_u16())));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.request_error(e))? {
            body.extend_from_slice(&chunk);
            self.check_size(body.len() as u64)?;
        }
        Ok(body.freeze())
    }

    async fn read_local(&self, path: PathBuf) -> Result<Bytes> {
        let read = async {
            let length = tokio::fs::metadata(&path).await?.len();
            self.check_size(length)?;
            Ok::<_, Error>(Bytes::from(tokio::fs::read(&path).await?))
        };
        tokio::time::timeout(self.config.timeout, read)
            .await
            .map_err(|_| Error::timeout(self.config.timeout.as_millis() as u64))?
    }

    fn check_size(&self, length: u64) -> Result<()> {
        if length > self.config.max_bytes {
            return Err(Error::InvalidResponse(format!(
                "photo exceeds {} bytes",
                self.config.max_bytes
            )));
        }
        Ok(())
    }

    fn request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::timeout(self.config.timeout.as_millis() as u64)
        } else {
            Error::transport(error.without_url().to_string())
        }
    }
}

impl PhotoFetcher for HttpPhotoFetcher {
    async fn fetch(&self, photo_ref: &str) -> Result<Bytes> {
        let location = PhotoLocation::parse(photo_ref)?;
        debug!(?location, "Fetching photo");

        let bytes = match location {
            PhotoLocation::Remote(url) => self.fetch_http(url).await?,
            PhotoLocation::Local(_) if !self.config.allow_local_paths => {
                return Err(Error::malformed("local photo references are disabled"));
            }
            PhotoLocation::Local(path) => self.read_local(path).await?,
        };

        if bytes.is_empty() {
            warn!("Photo reference resolved to an empty body");
        }
        Ok(bytes)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PhotoLocation {
    Remote(Url),
    Local(PathBuf),
}

impl PhotoLocation {
    fn parse(photo_ref: &str) -> Result<Self> {
        match Url::parse(photo_ref) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| Error::malformed(format!("invalid file URL {photo_ref}"))),
            // Drive letters parse as one-letter schemes.
            Ok(url) if url.scheme().len() > 1 => Err(Error::malformed(format!(
                "unsupported photo scheme {}",
                url.scheme()
            ))),
            _ => Ok(Self::Local(PathBuf::from(photo_ref))),
        }
    }
}
