//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use doorsync_core::{Error, Result, UserRecord};
use doorsync_device::{Ack, DeviceClient, MockDevice};
use doorsync_engine::PhotoFetcher;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00fake-jpeg-body";
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDRfake";

pub fn user(employee_no: &str, name: &str, enabled: bool) -> UserRecord {
    UserRecord::new(employee_no, name, enabled)
}

pub fn with_photo(employee_no: &str, photo_ref: &str) -> UserRecord {
    UserRecord::new(employee_no, format!("User {employee_no}"), true).with_photo_ref(photo_ref)
}

/// Number of entries in a staging directory.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Fetcher serving canned responses by photo reference.
#[derive(Debug, Default)]
pub struct StubFetcher {
    photos: HashMap<String, std::result::Result<Bytes, String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, photo_ref: &str, bytes: &'static [u8]) -> Self {
        self.photos.insert(photo_ref.to_string(), Ok(Bytes::from_static(bytes)));
        self
    }

    pub fn fail(mut self, photo_ref: &str, message: &str) -> Self {
        self.photos.insert(photo_ref.to_string(), Err(message.to_string()));
        self
    }
}

impl PhotoFetcher for StubFetcher {
    async fn fetch(&self, photo_ref: &str) -> Result<Bytes> {
        match self.photos.get(photo_ref) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(message)) => Err(Error::transport(message.clone())),
            None => Err(Error::transport(format!("no photo at {photo_ref}"))),
        }
    }
}

/// Device that empties the staging directory right before each upload, so
/// removing the staged file afterwards fails.
pub struct StagingSaboteur {
    pub inner: MockDevice,
    pub staging: PathBuf,
}

impl DeviceClient for StagingSaboteur {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.inner.list_users().await
    }

    async fn create_user(&self, user: &UserRecord) -> Result<Ack> {
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: &UserRecord) -> Result<Ack> {
        self.inner.update_user(user).await
    }

    async fn delete_user(&self, employee_no: &str) -> Result<Ack> {
        self.inner.delete_user(employee_no).await
    }

    async fn delete_face(&self, employee_no: &str) -> Result<Ack> {
        self.inner.delete_face(employee_no).await
    }

    async fn upload_face(&self, employee_no: &str, image: Bytes, mime: &str) -> Result<Ack> {
        for entry in std::fs::read_dir(&self.staging)? {
            std::fs::remove_file(entry?.path())?;
        }
        self.inner.upload_face(employee_no, image, mime).await
    }
}
