//! Synchronization engine for doorsync
//!
//! Computes the difference between the personnel directory and the users
//! enrolled in an access control terminal, applies it, and refreshes the
//! terminal's face library from directory photos.
//!
//! # Components
//!
//! - [`reconcile::plan`]: pure diff of directory and terminal users
//! - [`PlanExecutor`]: applies a plan, recording every outcome
//! - [`FaceSyncPipeline`]: deletes and re-enrolls faces
//! - [`SyncRun`]: one end-to-end run producing a [`RunSummary`]
//! - [`Reporter`]: log and JSON output of a summary
//!
//! # Example
//!
//! ```no_run
//! use doorsync_device::{DeviceConfig, IsapiClient};
//! use doorsync_directory::SnapshotSource;
//! use doorsync_engine::{FetchConfig, HttpPhotoFetcher, Reporter, RunOptions, SyncRun, TracingReporter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SnapshotSource::new("users.json");
//! let device = IsapiClient::new(DeviceConfig::new("http://192.168.1.64", "admin", "secret"))?;
//! let fetcher = HttpPhotoFetcher::new(FetchConfig::default())?;
//!
//! let summary = SyncRun::new(&source, &device, &fetcher, RunOptions::default())
//!     .execute()
//!     .await?;
//! TracingReporter.report(&summary)?;
//! # Ok(())
//! # }
//! ```

pub mod executor;
pub mod faces;
pub mod fetch;
pub mod media;
pub mod outcome;
pub mod reconcile;
pub mod report;
pub mod run;

pub use executor::{ActionFailure, ActionKind, ExecutionSummary, PlanExecutor};
pub use faces::{
    FaceDeleteStatus, FaceOutcomeKind, FaceSyncOutcome, FaceSyncPipeline, FaceSyncResult,
    StagingConfig,
};
pub use fetch::{FetchConfig, HttpPhotoFetcher, PhotoFetcher};
pub use media::detect_media_type;
pub use outcome::ErrorClass;
pub use reconcile::{ReconciliationPlan, RecordSide, SkippedRecord};
pub use report::{JsonReporter, Reporter, TracingReporter};
pub use run::{PlanPreview, RunError, RunOptions, RunSummary, SyncRun};
