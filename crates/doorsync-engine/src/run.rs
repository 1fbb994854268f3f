//! One synchronization run.
//!
//! [`SyncRun`] wires the pieces together:
//!
//! ```text
//! DirectorySource.load ──┐
//!                        ├──> plan ──> PlanExecutor ──┐
//! DeviceClient.list ─────┘                            ├──> RunSummary
//!                       FaceSyncPipeline (optional) ──┘
//! ```
//!
//! Loading either side is fatal for the run. Everything after that is
//! recorded in the summary.

use crate::executor::{ExecutionSummary, PlanExecutor, all_auth};
use crate::faces::{FaceDeleteStatus, FaceSyncOutcome, FaceSyncPipeline, FaceSyncResult, StagingConfig};
use crate::fetch::PhotoFetcher;
use crate::outcome::ErrorClass;
use crate::reconcile::{ReconciliationPlan, SkippedRecord, plan};
use chrono::{DateTime, Utc};
use doorsync_core::UserRecord;
use doorsync_device::DeviceClient;
use doorsync_directory::{DirectoryError, DirectorySource, SkippedEntry};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Failures that stop a run before any device mutation.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to load directory: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Failed to read device users: {0}")]
    DeviceList(#[source] doorsync_core::Error),
}

impl RunError {
    /// Returns `true` when the device refused the configured credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::DeviceList(e) if e.is_auth())
    }
}

/// Options for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run the face pipeline after the plan
    pub faces: bool,

    /// Maximum device operations in flight within a phase
    pub concurrency: usize,

    pub staging: StagingConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            faces: true,
            concurrency: 1,
            staging: StagingConfig::default(),
        }
    }
}

/// Plan computed without touching the device directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPreview {
    pub source: String,
    pub source_count: usize,
    pub device_count: usize,
    pub directory_skipped: Vec<SkippedEntry>,
    pub plan: ReconciliationPlan,
}

/// Everything a run did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Directory location, without credentials
    pub source: String,
    pub source_count: usize,
    pub device_count: usize,

    /// Directory entries that could not be parsed
    pub directory_skipped: Vec<SkippedEntry>,

    /// Records left out of reconciliation
    pub skipped: Vec<SkippedRecord>,

    pub execution: ExecutionSummary,

    /// Face outcomes, `None` when face sync was disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faces: Option<Vec<FaceSyncOutcome>>,
}

impl RunSummary {
    /// Returns `true` when something was attempted and every failure, with no
    /// success at all, was an authentication failure.
    ///
    /// That pattern means the credentials are wrong rather than individual
    /// records being rejected.
    pub fn systemic_auth_failure(&self) -> bool {
        let mut successes = self.execution.succeeded();
        let mut classes: Vec<ErrorClass> = self.execution.failures.iter().map(|f| f.class).collect();

        for outcome in self.faces.iter().flatten() {
            if outcome.delete == FaceDeleteStatus::Deleted {
                successes += 1;
            }
            if outcome.result == FaceSyncResult::Uploaded {
                successes += 1;
            }
            classes.extend(
                outcome
                    .errors
                    .iter()
                    .filter(|e| e.class != ErrorClass::Cleanup)
                    .map(|e| e.class),
            );
        }

        successes == 0 && all_auth(&classes)
    }

    /// Number of failed plan actions and failed face uploads or deletions.
    pub fn failure_count(&self) -> usize {
        let face_failures = self
            .faces
            .iter()
            .flatten()
            .filter(|o| {
                o.delete == FaceDeleteStatus::DeleteFailed || o.result == FaceSyncResult::UploadFailed
            })
            .count();
        self.execution.failures.len() + face_failures
    }
}

/// A single directory-to-terminal synchronization.
///
/// # Example
///
/// ```
/// use doorsync_core::UserRecord;
/// use doorsync_device::MockDevice;
/// use doorsync_directory::MemorySource;
/// use doorsync_engine::{FetchConfig, HttpPhotoFetcher, RunOptions, SyncRun};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = MemorySource::new(vec![UserRecord::new("1", "Ana", true)]);
/// let device = MockDevice::new();
/// let fetcher = HttpPhotoFetcher::new(FetchConfig::default())?;
///
/// let summary = SyncRun::new(&source, &device, &fetcher, RunOptions::default())
///     .execute()
///     .await?;
/// assert_eq!(summary.execution.created, vec!["1"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SyncRun<'a, S, D, P> {
    source: &'a S,
    device: &'a D,
    fetcher: &'a P,
    options: RunOptions,
}

impl<'a, S, D, P> SyncRun<'a, S, D, P>
where
    S: DirectorySource,
    D: DeviceClient,
    P: PhotoFetcher,
{
    pub fn new(source: &'a S, device: &'a D, fetcher: &'a P, options: RunOptions) -> Self {
        Self {
            source,
            device,
            fetcher,
            options,
        }
    }

    /// Load both sides and compute the plan without applying it.
    ///
    /// # Errors
    /// Returns `RunError` if either side cannot be read.
    pub async fn preview(&self) -> Result<PlanPreview, RunError> {
        let (snapshot_skipped, source_users, device_users) = self.load().await?;
        let plan = plan(&source_users, &device_users);

        Ok(PlanPreview {
            source: self.source.describe(),
            source_count: source_users.len(),
            device_count: device_users.len(),
            directory_skipped: snapshot_skipped,
            plan,
        })
    }

    /// Run the full synchronization.
    ///
    /// # Errors
    /// Returns `RunError` if either side cannot be read. Failures after that
    /// are recorded in the summary.
    pub async fn execute(&self) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        async {
            info!(source = %self.source.describe(), faces = self.options.faces, "Starting sync run");

            let (directory_skipped, source_users, device_users) = self.load().await?;
            let plan = plan(&source_users, &device_users);
            info!(
                create = plan.to_create.len(),
                update = plan.to_update.len(),
                delete = plan.to_delete.len(),
                skipped = plan.skipped.len(),
                "Reconciliation plan ready"
            );

            let execution = PlanExecutor::new(self.device)
                .concurrency(self.options.concurrency)
                .execute(&plan)
                .await;

            let faces = if self.options.faces {
                Some(
                    FaceSyncPipeline::new(self.device, self.fetcher)
                        .staging(self.options.staging.clone())
                        .concurrency(self.options.concurrency)
                        .sync_faces(&source_users)
                        .await,
                )
            } else {
                None
            };

            let summary = RunSummary {
                run_id,
                started_at,
                finished_at: Utc::now(),
                source: self.source.describe(),
                source_count: source_users.len(),
                device_count: device_users.len(),
                directory_skipped,
                skipped: plan.skipped,
                execution,
                faces,
            };

            if summary.systemic_auth_failure() {
                error!("Every device operation was refused for authentication; check credentials");
            }
            info!(failures = summary.failure_count(), "Sync run finished");

            Ok::<_, RunError>(summary)
        }
        .instrument(info_span!("sync_run", %run_id))
        .await
    }

    async fn load(&self) -> Result<(Vec<SkippedEntry>, Vec<UserRecord>, Vec<UserRecord>), RunError> {
        let snapshot = self.source.load().await?;
        let device_users = self.device.list_users().await.map_err(|e| {
            error!(error = %e, "Failed to read device users");
            RunError::DeviceList(e)
        })?;
        Ok((snapshot.skipped, snapshot.users, device_users))
    }
}
