//! The device capability set.
//!
//! [`DeviceClient`] is the only seam between the sync engine and the
//! terminal. It uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), so it is consumed through generics rather than `dyn`.

#![allow(async_fn_in_trait)]

use bytes::Bytes;
use doorsync_core::{Result, UserRecord};

/// Successful device response.
///
/// The client does not interpret the terminal's JSON envelope; the raw body is
/// kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// HTTP status code
    pub status: u16,

    /// Raw response body
    pub body: String,
}

impl Ack {
    /// Acknowledgement with status 200 and the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Directory and face library operations of an access control terminal.
///
/// Every method maps to exactly one logical device operation. Failures are
/// returned, never retried here: retry policy belongs to the caller.
///
/// # Examples
///
/// ```no_run
/// use doorsync_device::DeviceClient;
/// use doorsync_core::Result;
///
/// async fn count_disabled<D: DeviceClient>(device: &D) -> Result<usize> {
///     let users = device.list_users().await?;
///     Ok(users.iter().filter(|u| !u.enabled).count())
/// }
/// ```
pub trait DeviceClient: Send + Sync {
    /// Read every user enrolled in the terminal, following pagination.
    async fn list_users(&self) -> Result<Vec<UserRecord>>;

    /// Enroll a new user.
    async fn create_user(&self, user: &UserRecord) -> Result<Ack>;

    /// Overwrite name, enable flag and PIN of an existing user.
    async fn update_user(&self, user: &UserRecord) -> Result<Ack>;

    /// Remove a user and its credentials.
    async fn delete_user(&self, employee_no: &str) -> Result<Ack>;

    /// Remove the enrolled face of a user.
    async fn delete_face(&self, employee_no: &str) -> Result<Ack>;

    /// Enroll a face image for a user.
    async fn upload_face(&self, employee_no: &str, image: Bytes, mime: &str) -> Result<Ack>;
}
