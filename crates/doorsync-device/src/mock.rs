//! In-memory terminal for testing and development.
//!
//! [`MockDevice`] keeps a user directory and a face library in memory and
//! records every call made against it, so engine tests can assert both the
//! resulting device state and the exact operation sequence. Failures can be
//! injected per operation and employee number.
//!
//! # Examples
//!
//! ```
//! use doorsync_device::DeviceClient;
//! use doorsync_device::mock::{DeviceCall, MockDevice, MockFailure, Operation};
//! use doorsync_core::UserRecord;
//!
//! #[tokio::main]
//! async fn main() {
//!     let device = MockDevice::with_users(vec![UserRecord::new("1001", "Ana", true)]);
//!     device.fail_on(Operation::DeleteUser, "1001", MockFailure::Rejected(500));
//!
//!     assert!(device.delete_user("1001").await.is_err());
//!     assert_eq!(device.calls(), vec![DeviceCall::DeleteUser("1001".to_string())]);
//!     assert_eq!(device.users().len(), 1);
//! }
//! ```

use crate::traits::{Ack, DeviceClient};
use bytes::Bytes;
use doorsync_core::{Error, Result, UserRecord};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Device operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListUsers,
    CreateUser,
    UpdateUser,
    DeleteUser,
    DeleteFace,
    UploadFace,
}

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    ListUsers,
    CreateUser(String),
    UpdateUser(String),
    DeleteUser(String),
    DeleteFace(String),
    UploadFace {
        employee_no: String,
        mime: String,
        size: usize,
    },
}

impl DeviceCall {
    /// Employee number the call addressed, if any.
    pub fn employee_no(&self) -> Option<&str> {
        match self {
            Self::ListUsers => None,
            Self::CreateUser(no)
            | Self::UpdateUser(no)
            | Self::DeleteUser(no)
            | Self::DeleteFace(no) => Some(no),
            Self::UploadFace { employee_no, .. } => Some(employee_no),
        }
    }
}

/// Failure the mock should return instead of performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// `DeviceRejected` with the given status
    Rejected(u16),
    /// `Auth`, as after a rejected Digest retry
    Auth,
    /// `Timeout`
    Timeout,
    /// `Transport`, as for an unreachable device
    Unreachable,
}

impl MockFailure {
    fn to_error(self, operation: Operation) -> Error {
        match self {
            Self::Rejected(status) => {
                Error::rejected(status, format!(r#"{{"statusString":"{operation:?} failed"}}"#))
            }
            Self::Auth => Error::auth("mock credentials rejected"),
            Self::Timeout => Error::timeout(100),
            Self::Unreachable => Error::transport("mock device unreachable"),
        }
    }
}

/// Enrolled face image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFace {
    pub image: Bytes,
    pub mime: String,
}

#[derive(Debug, Default)]
struct MockState {
    users: Vec<UserRecord>,
    faces: HashMap<String, StoredFace>,
    calls: Vec<DeviceCall>,
    failures: HashMap<(Operation, String), MockFailure>,
    blanket_failures: HashMap<Operation, MockFailure>,
}

impl MockState {
    fn failure(&self, operation: Operation, employee_no: &str) -> Option<Error> {
        self.failures
            .get(&(operation, employee_no.to_string()))
            .or_else(|| self.blanket_failures.get(&operation))
            .map(|failure| failure.to_error(operation))
    }

    fn position(&self, employee_no: &str) -> Option<usize> {
        self.users.iter().position(|u| u.employee_no == employee_no)
    }
}

/// In-memory [`DeviceClient`].
///
/// Semantics follow the terminal: creating an existing user, or updating,
/// deleting or removing the face of a missing one, is rejected with a
/// not-found or already-exists body.
#[derive(Debug, Default)]
pub struct MockDevice {
    state: Mutex<MockState>,
}

impl MockDevice {
    /// Create an empty device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a device with the given directory.
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        let device = Self::new();
        device.lock().users = users;
        device
    }

    /// Enroll a face without recording a call.
    pub fn enroll_face(&self, employee_no: &str, image: impl Into<Bytes>, mime: &str) {
        self.lock().faces.insert(
            employee_no.to_string(),
            StoredFace {
                image: image.into(),
                mime: mime.to_string(),
            },
        );
    }

    /// Fail `operation` for one employee number.
    pub fn fail_on(&self, operation: Operation, employee_no: &str, failure: MockFailure) {
        self.lock()
            .failures
            .insert((operation, employee_no.to_string()), failure);
    }

    /// Fail `operation` for every employee number.
    pub fn fail_all(&self, operation: Operation, failure: MockFailure) {
        self.lock().blanket_failures.insert(operation, failure);
    }

    /// Fail every operation, as an unreachable or misconfigured device would.
    pub fn fail_everything(&self, failure: MockFailure) {
        let mut state = self.lock();
        for operation in [
            Operation::ListUsers,
            Operation::CreateUser,
            Operation::UpdateUser,
            Operation::DeleteUser,
            Operation::DeleteFace,
            Operation::UploadFace,
        ] {
            state.blanket_failures.insert(operation, failure);
        }
    }

    /// Current directory, in enrollment order.
    pub fn users(&self) -> Vec<UserRecord> {
        self.lock().users.clone()
    }

    /// Enrolled face of a user.
    pub fn face(&self, employee_no: &str) -> Option<StoredFace> {
        self.lock().faces.get(employee_no).cloned()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    /// Calls that addressed one employee number.
    pub fn calls_for(&self, employee_no: &str) -> Vec<DeviceCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.employee_no() == Some(employee_no))
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DeviceClient for MockDevice {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::ListUsers);
        if let Some(error) = state.blanket_failures.get(&Operation::ListUsers) {
            return Err(error.to_error(Operation::ListUsers));
        }
        // The terminal never returns PINs.
        Ok(state
            .users
            .iter()
            .map(|u| UserRecord::new(u.employee_no.clone(), u.name.clone(), u.enabled))
            .collect())
    }

    async fn create_user(&self, user: &UserRecord) -> Result<Ack> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::CreateUser(user.employee_no.clone()));
        if let Some(error) = state.failure(Operation::CreateUser, &user.employee_no) {
            return Err(error);
        }
        if state.position(&user.employee_no).is_some() {
            return Err(Error::rejected(
                400,
                r#"{"statusString":"Invalid Content","subStatusCode":"employeeNoAlreadyExist"}"#,
            ));
        }
        state.users.push(user.clone());
        Ok(Ack::ok(r#"{"statusCode":1,"statusString":"OK"}"#))
    }

    async fn update_user(&self, user: &UserRecord) -> Result<Ack> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::UpdateUser(user.employee_no.clone()));
        if let Some(error) = state.failure(Operation::UpdateUser, &user.employee_no) {
            return Err(error);
        }
        let index = state
            .position(&user.employee_no)
            .ok_or_else(|| not_found("employeeNoNotExist"))?;
        state.users[index] = user.clone();
        Ok(Ack::ok(r#"{"statusCode":1,"statusString":"OK"}"#))
    }

    async fn delete_user(&self, employee_no: &str) -> Result<Ack> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::DeleteUser(employee_no.to_string()));
        if let Some(error) = state.failure(Operation::DeleteUser, employee_no) {
            return Err(error);
        }
        let index = state
            .position(employee_no)
            .ok_or_else(|| not_found("employeeNoNotExist"))?;
        state.users.remove(index);
        state.faces.remove(employee_no);
        Ok(Ack::ok(r#"{"statusCode":1,"statusString":"OK"}"#))
    }

    async fn delete_face(&self, employee_no: &str) -> Result<Ack> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::DeleteFace(employee_no.to_string()));
        if let Some(error) = state.failure(Operation::DeleteFace, employee_no) {
            return Err(error);
        }
        state
            .faces
            .remove(employee_no)
            .ok_or_else(|| not_found("noMatch"))?;
        Ok(Ack::ok(r#"{"statusCode":1,"statusString":"OK"}"#))
    }

    async fn upload_face(&self, employee_no: &str, image: Bytes, mime: &str) -> Result<Ack> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::UploadFace {
            employee_no: employee_no.to_string(),
            mime: mime.to_string(),
            size: image.len(),
        });
        if let Some(error) = state.failure(Operation::UploadFace, employee_no) {
            return Err(error);
        }
        state.faces.insert(
            employee_no.to_string(),
            StoredFace {
                image,
                mime: mime.to_string(),
            },
        );
        Ok(Ack::ok(r#"{"statusCode":1,"statusString":"OK"}"#))
    }
}

fn not_found(sub_status: &str) -> Error {
    Error::rejected(
        400,
        format!(r#"{{"statusString":"Invalid Content","subStatusCode":"{sub_status}"}}"#),
    )
}
