use crate::error::{DirectoryError, DirectoryResult};
use crate::parse::{DirectorySnapshot, parse_document};
use crate::source::DirectorySource;
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Directory served over HTTP(S).
///
/// Issues a `GET` per load, with an optional bearer token. The token is
/// redacted from `Debug` output and never logged.
#[derive(Clone)]
pub struct FeedSource {
    http: Client,
    url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl FeedSource {
    /// Create a feed source.
    ///
    /// # Errors
    /// Returns `DirectoryError::Configuration` for a non-http(s) URL or if
    /// the HTTP client cannot be built.
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> DirectoryResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| DirectoryError::Configuration(format!("invalid directory url {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DirectoryError::Configuration(format!(
                "directory url must be http or https, got {}",
                url.scheme()
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url,
            token,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request_error(&self, error: reqwest::Error) -> DirectoryError {
        if error.is_timeout() {
            warn!(url = %self.url, "Directory feed timeout after {}ms", self.timeout.as_millis());
            DirectoryError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            DirectoryError::Http(error.without_url().to_string())
        }
    }
}

impl DirectorySource for FeedSource {
    async fn load(&self) -> DirectoryResult<DirectorySnapshot> {
        let mut request = self.http.get(self.url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(url = %self.url, authenticated = self.token.is_some(), "Fetching directory feed");
        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| self.request_error(e))?;
        let snapshot = parse_document(&text)?;
        info!(
            url = %self.url,
            users = snapshot.users.len(),
            skipped = snapshot.skipped.len(),
            "Loaded directory feed"
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("feed {}", self.url)
    }
}

impl fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSource")
            .field("url", &self.url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
