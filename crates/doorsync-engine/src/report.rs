//! Run reporting.
//!
//! Reports never contain PINs: [`UserRecord`](doorsync_core::UserRecord)
//! skips the PIN when serialized, and summaries only carry employee numbers
//! and error text.

use crate::faces::FaceSyncResult;
use crate::run::RunSummary;
use doorsync_core::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Receives the summary at the end of a run.
pub trait Reporter {
    fn report(&self, summary: &RunSummary) -> Result<()>;
}

/// Writes the summary as structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, summary: &RunSummary) -> Result<()> {
        let execution = &summary.execution;

        info!(
            run_id = %summary.run_id,
            source = %summary.source,
            source_count = summary.source_count,
            device_count = summary.device_count,
            created = execution.created.len(),
            updated = execution.updated.len(),
            deleted = execution.deleted.len(),
            failed = execution.failures.len(),
            "Run summary"
        );

        for entry in &summary.directory_skipped {
            warn!(position = entry.position, employee_no = ?entry.employee_no, reason = %entry.reason, "Directory entry skipped");
        }
        for skipped in &summary.skipped {
            warn!(side = %skipped.side, position = skipped.position, reason = %skipped.reason, "Record skipped");
        }
        for failure in &execution.failures {
            warn!(
                kind = %failure.kind,
                employee_no = %failure.employee_no,
                class = ?failure.class,
                error = %failure.error,
                "Action failed"
            );
        }

        if let Some(faces) = &summary.faces {
            let count = |result: FaceSyncResult| faces.iter().filter(|o| o.result == result).count();
            info!(
                uploaded = count(FaceSyncResult::Uploaded),
                upload_failed = count(FaceSyncResult::UploadFailed),
                no_photo = count(FaceSyncResult::SkippedNoPhoto),
                cleanup_failed = faces.iter().filter(|o| o.cleanup_failed()).count(),
                "Face summary"
            );
            for outcome in faces.iter().filter(|o| !o.errors.is_empty()) {
                let [delete, result] = outcome.kinds();
                for error in &outcome.errors {
                    warn!(
                        employee_no = %outcome.employee_no,
                        %delete,
                        %result,
                        step = ?error.step,
                        error = %error.message,
                        "Face step failed"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Writes the summary as pretty JSON.
///
/// The file is replaced atomically: the report is written to a temporary
/// file in the same directory, then renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reporter for JsonReporter {
    fn report(&self, summary: &RunSummary) -> Result<()> {
        let json = serde_json::to_vec_pretty(summary)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&json)?;
        file.write_all(b"\n")?;
        file.persist(&self.path).map_err(|e| e.error)?;

        info!(path = %self.path.display(), "Wrote run report");
        Ok(())
    }
}
