//! ISAPI HTTP client with Digest authentication.
//!
//! # Architecture
//!
//! ```text
//! SyncRun
//!     │
//!     ├─> PlanExecutor ──┐
//!     │                  ├─> IsapiClient ───(HTTP + Digest)───> Terminal
//!     └─> FaceSync ──────┘       │
//!                                └─> DigestSession (cached challenge, nc)
//! ```
//!
//! # Authentication Flow
//!
//! 1. The first request goes out without credentials.
//! 2. The terminal answers `401` with a Digest challenge.
//! 3. The challenge is cached and the request is sent again once, with an
//!    `Authorization` header.
//! 4. Later requests reuse the cached challenge preemptively. When the
//!    terminal rotates its nonce it answers `401` again and step 3 repeats.
//!
//! A `401` on the authenticated retry is reported as `Error::Auth`.
//!
//! # Design Principles
//!
//! Same as the rest of the transport layer:
//! - **No automatic retry** beyond the Digest round trip
//! - **No envelope validation**: non-2xx becomes `DeviceRejected` with the raw body
//! - **Deliberate timeouts** on every request

use crate::config::DeviceConfig;
use crate::digest::{Challenge, DigestSession};
use crate::traits::{Ack, DeviceClient};
use crate::wire::{
    CreateUserRequest, DeleteFaceRequest, DeleteUserRequest, FaceDataRecord, ModifyUserRequest,
    SearchRequest, SearchResponse,
};
use bytes::Bytes;
use doorsync_core::constants::{
    FACE_DELETE_PATH, FACE_RECORD_PATH, SEARCH_STATUS_MORE, USER_DELETE_PATH, USER_MODIFY_PATH,
    USER_RECORD_PATH, USER_SEARCH_PATH,
};
use doorsync_core::{Error, Result, UserRecord};
use rand::RngCore;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info, trace, warn};
use url::Url;

/// HTTP client for a single access control terminal.
///
/// Cheap to share by reference: all methods take `&self`, and the only mutable
/// state is the Digest session behind a mutex.
///
/// # Example
///
/// ```no_run
/// use doorsync_device::{DeviceClient, DeviceConfig, IsapiClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DeviceConfig::new("http://192.168.1.64", "admin", "secret");
/// let client = IsapiClient::new(config)?;
///
/// for user in client.list_users().await? {
///     println!("{user}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IsapiClient {
    http: Client,
    base_url: Url,
    config: DeviceConfig,
    session: DigestSession,
}

impl IsapiClient {
    /// Create a client for the configured terminal.
    ///
    /// No request is sent until the first operation.
    ///
    /// # Errors
    /// Returns `Error::Config` if the configuration is invalid, or
    /// `Error::Transport` if the HTTP client cannot be built.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let base_url = config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}")))?;

        debug!(
            base_url = %base_url,
            username = %config.username,
            dev_index = ?config.dev_index,
            "Creating ISAPI client"
        );

        Ok(Self {
            http,
            base_url,
            config,
            session: DigestSession::new(),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Build an endpoint URL with `format=json`, the optional `devIndex`,
    /// and any extra query parameters.
    ///
    /// `path` is appended to the base URL path, so a terminal behind a
    /// reverse proxy prefix keeps that prefix.
    fn endpoint(&self, path: &str, extra: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
        url.set_query(None);
        url.set_fragment(None);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "json");
            if let Some(dev_index) = &self.config.dev_index {
                query.append_pair("devIndex", dev_index);
            }
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Send a request, completing the Digest round trip when challenged.
    ///
    /// `build` attaches the body and is called once per attempt, because
    /// multipart bodies cannot be cloned.
    async fn send<F>(&self, method: Method, url: Url, build: F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder>,
    {
        let uri = digest_uri(&url);

        let preemptive = self.authorize(&method, &uri);
        let response = self.attempt(&method, &url, &build, preemptive.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = Challenge::from_header_values(
            response
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )?;
        if preemptive.is_some() {
            debug!(stale = challenge.stale, "Cached digest challenge rejected, renewing");
        } else {
            trace!(realm = %challenge.realm, algorithm = %challenge.algorithm, "Received digest challenge");
        }
        self.session.update(challenge);

        let authorization = self
            .authorize(&method, &uri)
            .ok_or_else(|| Error::auth("digest session not primed after challenge"))?;
        let response = self.attempt(&method, &url, &build, Some(&authorization)).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.clear();
            warn!(username = %self.config.username, "Device rejected digest credentials");
            return Err(Error::auth(format!(
                "credentials for user {} rejected by device",
                self.config.username
            )));
        }

        Ok(response)
    }

    fn authorize(&self, method: &Method, uri: &str) -> Option<String> {
        self.session
            .authorize(&self.config.username, &self.config.password, method.as_str(), uri)
    }

    async fn attempt<F>(
        &self,
        method: &Method,
        url: &Url,
        build: &F,
        authorization: Option<&str>,
    ) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder>,
    {
        let mut request = build(self.http.request(method.clone(), url.clone()))?;
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        trace!(method = %method, path = url.path(), authenticated = authorization.is_some(), "Sending request");

        request.send().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            warn!("Request timeout after {}ms", self.config.timeout.as_millis());
            Error::timeout(self.config.timeout.as_millis() as u64)
        } else {
            let error = error.without_url();
            warn!("Request failed: {}", error);
            Error::transport(error.to_string())
        }
    }

    /// Map a response to `Ack`, or `DeviceRejected` for non-2xx.
    async fn ack_from(&self, response: Response) -> Result<Ack> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            Ok(Ack {
                status: status.as_u16(),
                body,
            })
        } else {
            debug!(status = status.as_u16(), body = %body, "Device rejected request");
            Err(Error::rejected(status.as_u16(), body))
        }
    }

    async fn send_json<T: Serialize>(&self, method: Method, url: Url, body: &T) -> Result<Ack> {
        let response = self.send(method, url, |request| Ok(request.json(body))).await?;
        self.ack_from(response).await
    }

    async fn search_page(&self, search_id: &str, position: u32) -> Result<SearchResponse> {
        let url = self.endpoint(USER_SEARCH_PATH, &[])?;
        let request = SearchRequest::page(search_id, position, self.config.page_size);
        let ack = self.send_json(Method::POST, url, &request).await?;

        serde_json::from_str(&ack.body).map_err(|e| {
            Error::InvalidResponse(format!("user search response is not valid JSON: {e}"))
        })
    }
}

impl DeviceClient for IsapiClient {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let search_id = random_search_id();
        let mut users = Vec::new();
        let mut position = 0u32;

        loop {
            let page = self.search_page(&search_id, position).await?.result;
            let received = page.users.len() as u32;

            trace!(
                position,
                received,
                total = page.total_matches,
                status = %page.status,
                "Received user search page"
            );

            users.extend(page.users.into_iter().map(UserRecord::from));
            position += received;

            // A terminal answering MORE with an empty page would loop forever.
            if page.status != SEARCH_STATUS_MORE || received == 0 {
                break;
            }
        }

        info!(count = users.len(), "Listed device users");
        Ok(users)
    }

    async fn create_user(&self, user: &UserRecord) -> Result<Ack> {
        debug!(employee_no = %user.employee_no, "Creating user");
        let url = self.endpoint(USER_RECORD_PATH, &[])?;
        let body = CreateUserRequest::new(user, &self.config.valid_begin, &self.config.valid_end);
        self.send_json(Method::POST, url, &body).await
    }

    async fn update_user(&self, user: &UserRecord) -> Result<Ack> {
        debug!(employee_no = %user.employee_no, "Updating user");
        let url = self.endpoint(USER_MODIFY_PATH, &[])?;
        self.send_json(Method::PUT, url, &ModifyUserRequest::new(user))
            .await
    }

    async fn delete_user(&self, employee_no: &str) -> Result<Ack> {
        debug!(employee_no, "Deleting user");
        let url = self.endpoint(USER_DELETE_PATH, &[])?;
        self.send_json(Method::PUT, url, &DeleteUserRequest::new(employee_no))
            .await
    }

    async fn delete_face(&self, employee_no: &str) -> Result<Ack> {
        debug!(employee_no, "Deleting face");
        let url = self.endpoint(
            FACE_DELETE_PATH,
            &[
                ("FDID", self.config.face_library_id.as_str()),
                ("faceLibType", self.config.face_library_type.as_str()),
            ],
        )?;
        self.send_json(Method::PUT, url, &DeleteFaceRequest::new(employee_no))
            .await
    }

    async fn upload_face(&self, employee_no: &str, image: Bytes, mime: &str) -> Result<Ack> {
        debug!(employee_no, mime, size = image.len(), "Uploading face");
        let url = self.endpoint(FACE_RECORD_PATH, &[])?;
        let metadata = serde_json::to_string(&FaceDataRecord {
            face_lib_type: &self.config.face_library_type,
            fdid: &self.config.face_library_id,
            fpid: employee_no,
        })?;
        let file_name = format!("{employee_no}.{}", file_extension(mime));

        let response = self
            .send(Method::POST, url, |request| {
                let metadata = Part::text(metadata.clone())
                    .mime_str("application/json")
                    .map_err(|e| Error::transport(format!("invalid metadata part: {e}")))?;
                let image = Part::bytes(image.to_vec())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| Error::transport(format!("invalid media type {mime}: {e}")))?;

                Ok(request.multipart(
                    Form::new()
                        .part("FaceDataRecord", metadata)
                        .part("img", image),
                ))
            })
            .await?;

        self.ack_from(response).await
    }
}

/// Search sessions are keyed by an opaque ID the client picks; reusing it
/// across pages keeps the terminal's cursor.
fn random_search_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The `uri` directive: path plus query, exactly as sent on the request line.
fn digest_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn file_extension(mime: &str) -> &str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        _ => "jpg",
    }
}
