use crate::error::{DirectoryError, DirectoryResult};
use crate::parse::{DirectorySnapshot, parse_document};
use crate::source::DirectorySource;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory exported to a JSON file.
///
/// The file is re-read on every [`load`](DirectorySource::load), so an
/// exporter can replace it between runs.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectorySource for SnapshotSource {
    async fn load(&self) -> DirectoryResult<DirectorySnapshot> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DirectoryError::read(&self.path, e))?;

        let snapshot = parse_document(&text)?;
        info!(
            path = %self.path.display(),
            users = snapshot.users.len(),
            skipped = snapshot.skipped.len(),
            "Loaded directory snapshot"
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
