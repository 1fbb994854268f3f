//! Face enrollment.
//!
//! For every directory user the enrolled face is deleted first, then the
//! directory photo (if any) is fetched, staged in a temporary file and
//! uploaded. Face sync is keyed by the presence of a photo reference, not by
//! plan membership, so unchanged users get their face refreshed too.
//!
//! ```text
//! delete_face ──> photo_ref? ──no──> SkippedNoPhoto
//!                     │
//!                    yes
//!                     │
//!        fetch ──> stage ──> detect type ──> upload_face ──> Uploaded
//!          │         │                           │
//!          └─────────┴───────────────────────────┴─────────> UploadFailed
//! ```
//!
//! The staged file is removed on every path. Failing to remove it is
//! recorded and logged but does not change the outcome.

use crate::fetch::PhotoFetcher;
use crate::media::detect_media_type;
use crate::outcome::ErrorClass;
use crate::reconcile::collapse_source;
use bytes::Bytes;
use doorsync_core::constants::STAGED_IMAGE_PREFIX;
use doorsync_core::{Error, Result, UserRecord};
use doorsync_device::DeviceClient;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Result of the face deletion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FaceDeleteStatus {
    /// Removed, or there was nothing to remove
    Deleted,
    DeleteFailed,
}

/// Result of the enrollment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FaceSyncResult {
    Uploaded,
    UploadFailed,
    SkippedNoPhoto,
}

/// Flat outcome kind, one per reported fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FaceOutcomeKind {
    FaceDeleted,
    FaceDeleteFailed,
    FaceUploaded,
    FaceUploadFailed,
    SkippedNoPhoto,
}

impl fmt::Display for FaceOutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FaceDeleted => "faceDeleted",
            Self::FaceDeleteFailed => "faceDeleteFailed",
            Self::FaceUploaded => "faceUploaded",
            Self::FaceUploadFailed => "faceUploadFailed",
            Self::SkippedNoPhoto => "skippedNoPhoto",
        };
        f.write_str(name)
    }
}

/// Step of the face pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FaceStep {
    Delete,
    Fetch,
    Stage,
    Upload,
    Cleanup,
}

/// Error recorded during one face sync iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceStepError {
    pub step: FaceStep,
    pub class: ErrorClass,
    pub message: String,
}

impl FaceStepError {
    fn new(step: FaceStep, error: &Error) -> Self {
        Self {
            step,
            class: ErrorClass::of(error),
            message: error.to_string(),
        }
    }
}

/// What happened to one user's face.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceSyncOutcome {
    pub employee_no: String,
    pub delete: FaceDeleteStatus,
    pub result: FaceSyncResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FaceStepError>,
}

impl FaceSyncOutcome {
    /// Outcome kinds in pipeline order: the delete kind, then the result kind.
    pub fn kinds(&self) -> [FaceOutcomeKind; 2] {
        let delete = match self.delete {
            FaceDeleteStatus::Deleted => FaceOutcomeKind::FaceDeleted,
            FaceDeleteStatus::DeleteFailed => FaceOutcomeKind::FaceDeleteFailed,
        };
        let result = match self.result {
            FaceSyncResult::Uploaded => FaceOutcomeKind::FaceUploaded,
            FaceSyncResult::UploadFailed => FaceOutcomeKind::FaceUploadFailed,
            FaceSyncResult::SkippedNoPhoto => FaceOutcomeKind::SkippedNoPhoto,
        };
        [delete, result]
    }

    /// Returns `true` when the staged file could not be removed.
    pub fn cleanup_failed(&self) -> bool {
        self.errors.iter().any(|e| e.step == FaceStep::Cleanup)
    }
}

/// Where staged images are written.
#[derive(Debug, Clone, Default)]
pub struct StagingConfig {
    /// Directory for staged images; the system temp dir when `None`
    pub dir: Option<PathBuf>,
}

impl StagingConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Deletes and re-enrolls faces for directory users.
///
/// # Example
///
/// ```no_run
/// use doorsync_device::{DeviceConfig, IsapiClient};
/// use doorsync_engine::{FaceSyncPipeline, FetchConfig, HttpPhotoFetcher, StagingConfig};
///
/// # async fn example(users: Vec<doorsync_core::UserRecord>) -> Result<(), Box<dyn std::error::Error>> {
/// let device = IsapiClient::new(DeviceConfig::new("http://192.168.1.64", "admin", "secret"))?;
/// let fetcher = HttpPhotoFetcher::new(FetchConfig::default())?;
///
/// let outcomes = FaceSyncPipeline::new(&device, &fetcher)
///     .staging(StagingConfig::in_dir("/var/tmp/doorsync"))
///     .sync_faces(&users)
///     .await;
/// println!("{} faces processed", outcomes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FaceSyncPipeline<'a, D, P> {
    device: &'a D,
    fetcher: &'a P,
    staging: StagingConfig,
    concurrency: usize,
}

impl<'a, D: DeviceClient, P: PhotoFetcher> FaceSyncPipeline<'a, D, P> {
    pub fn new(device: &'a D, fetcher: &'a P) -> Self {
        Self {
            device,
            fetcher,
            staging: StagingConfig::default(),
            concurrency: 1,
        }
    }

    pub fn staging(mut self, staging: StagingConfig) -> Self {
        self.staging = staging;
        self
    }

    /// Maximum users processed at once (at least 1).
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sync faces for every eligible directory user.
    ///
    /// Duplicate employee numbers collapse to the last record, so no user is
    /// processed twice. Users with an empty employee number produce no
    /// outcome.
    pub async fn sync_faces(&self, source: &[UserRecord]) -> Vec<FaceSyncOutcome> {
        let collapsed = collapse_source(source);

        let outcomes: Vec<FaceSyncOutcome> = stream::iter(collapsed.records)
            .map(|user| self.sync_one(user))
            .buffered(self.concurrency)
            .collect()
            .await;

        let uploaded = outcomes
            .iter()
            .filter(|o| o.result == FaceSyncResult::Uploaded)
            .count();
        info!(
            users = outcomes.len(),
            uploaded,
            failed = outcomes.iter().filter(|o| o.result == FaceSyncResult::UploadFailed).count(),
            "Face sync finished"
        );

        outcomes
    }

    async fn sync_one(&self, user: &UserRecord) -> FaceSyncOutcome {
        let employee_no = user.employee_no.as_str();
        let mut errors = Vec::new();

        let delete = match self.device.delete_face(employee_no).await {
            Ok(_) => FaceDeleteStatus::Deleted,
            Err(e) if e.is_not_found() => {
                debug!(employee_no, "No face enrolled");
                FaceDeleteStatus::Deleted
            }
            Err(e) => {
                warn!(employee_no, error = %e, "Face deletion failed");
                errors.push(FaceStepError::new(FaceStep::Delete, &e));
                FaceDeleteStatus::DeleteFailed
            }
        };

        let result = match user.photo_ref() {
            None => {
                debug!(employee_no, "No photo in directory");
                FaceSyncResult::SkippedNoPhoto
            }
            Some(photo_ref) => match self.enroll(employee_no, photo_ref, &mut errors).await {
                Ok(()) => FaceSyncResult::Uploaded,
                Err(step_error) => {
                    warn!(employee_no, step = ?step_error.step, error = %step_error.message, "Face upload failed");
                    errors.push(step_error);
                    FaceSyncResult::UploadFailed
                }
            },
        };

        FaceSyncOutcome {
            employee_no: employee_no.to_string(),
            delete,
            result,
            errors,
        }
    }

    /// Fetch, stage and upload one photo. Cleanup failures are pushed to
    /// `errors`; the returned error is the step that stopped enrollment.
    async fn enroll(
        &self,
        employee_no: &str,
        photo_ref: &str,
        errors: &mut Vec<FaceStepError>,
    ) -> std::result::Result<(), FaceStepError> {
        let photo = self
            .fetcher
            .fetch(photo_ref)
            .await
            .map_err(|e| FaceStepError::new(FaceStep::Fetch, &e))?;
        if photo.is_empty() {
            return Err(FaceStepError::new(
                FaceStep::Fetch,
                &Error::InvalidResponse("photo body is empty".to_string()),
            ));
        }

        let staged = StagedImage::write(&self.staging.dir(), &photo)
            .map_err(|e| FaceStepError::new(FaceStep::Stage, &e))?;

        let uploaded = match staged.read().await {
            Ok(image) => {
                let mime = detect_media_type(&image, photo_ref);
                debug!(employee_no, mime, size = image.len(), "Uploading staged face");
                self.device
                    .upload_face(employee_no, image, mime)
                    .await
                    .map(|_| ())
                    .map_err(|e| FaceStepError::new(FaceStep::Upload, &e))
            }
            Err(e) => Err(FaceStepError::new(FaceStep::Stage, &e)),
        };

        if let Err(e) = staged.remove() {
            warn!(employee_no, error = %e, "Failed to remove staged face image");
            errors.push(FaceStepError::new(FaceStep::Cleanup, &e));
        }

        uploaded
    }
}

/// Photo bytes written to a uniquely named temporary file.
///
/// Dropping without [`remove`](Self::remove) still deletes the file, which
/// covers cancellation; `remove` exists to observe the failure.
struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    fn write(dir: &std::path::Path, bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(STAGED_IMAGE_PREFIX)
            .suffix(".img")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    async fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(self.file.path()).await?))
    }

    fn remove(self) -> Result<()> {
        let path = self.file.path().display().to_string();
        self.file
            .close()
            .map_err(|e| Error::cleanup(path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_order() {
        let outcome = FaceSyncOutcome {
            employee_no: "1".into(),
            delete: FaceDeleteStatus::DeleteFailed,
            result: FaceSyncResult::SkippedNoPhoto,
            errors: Vec::new(),
        };
        assert_eq!(
            outcome.kinds(),
            [FaceOutcomeKind::FaceDeleteFailed, FaceOutcomeKind::SkippedNoPhoto]
        );
        assert_eq!(FaceOutcomeKind::FaceUploadFailed.to_string(), "faceUploadFailed");
    }

    #[test]
    fn test_staged_image_lifecycle() {
        let dir = tempfile::TempDir::new().unwrap();
        let staged = StagedImage::write(dir.path(), b"\xff\xd8\xff").unwrap();

        let name = staged.file.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(STAGED_IMAGE_PREFIX));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        staged.remove().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_reports_cleanup_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let staged = StagedImage::write(dir.path(), b"x").unwrap();
        std::fs::remove_file(staged.file.path()).unwrap();

        let error = staged.remove().unwrap_err();
        assert!(matches!(error, Error::ResourceCleanup { .. }));
    }
}
