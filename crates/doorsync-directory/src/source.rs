#![allow(async_fn_in_trait)]

use crate::error::DirectoryResult;
use crate::feed::FeedSource;
use crate::parse::DirectorySnapshot;
use crate::snapshot::SnapshotSource;
use doorsync_core::UserRecord;

/// Source of truth for who should be enrolled.
///
/// A source is read once per run. Implementations return every readable
/// record in source order, duplicates included; deduplication is the
/// engine's job.
pub trait DirectorySource: Send + Sync {
    /// Load the current directory.
    async fn load(&self) -> DirectoryResult<DirectorySnapshot>;

    /// Human readable location for logs, without credentials.
    fn describe(&self) -> String;
}

/// Fixed in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    snapshot: DirectorySnapshot,
}

impl MemorySource {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self {
            snapshot: DirectorySnapshot::from_users(users),
        }
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        Self { snapshot }
    }
}

impl DirectorySource for MemorySource {
    async fn load(&self) -> DirectoryResult<DirectorySnapshot> {
        Ok(self.snapshot.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} users)", self.snapshot.users.len())
    }
}

/// Enum wrapper for directory source dispatch.
///
/// Native `async fn` traits are not object safe, so the binary picks a
/// source at runtime through this enum instead of `Box<dyn DirectorySource>`.
#[derive(Debug)]
pub enum AnySource {
    Snapshot(SnapshotSource),
    Feed(FeedSource),
    Memory(MemorySource),
}

impl DirectorySource for AnySource {
    async fn load(&self) -> DirectoryResult<DirectorySnapshot> {
        match self {
            Self::Snapshot(source) => source.load().await,
            Self::Feed(source) => source.load().await,
            Self::Memory(source) => source.load().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Snapshot(source) => source.describe(),
            Self::Feed(source) => source.describe(),
            Self::Memory(source) => source.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_source_dispatches() {
        let source = AnySource::Memory(MemorySource::new(vec![UserRecord::new("1", "Ana", true)]));
        let snapshot = source.load().await.unwrap();
        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(source.describe(), "memory (1 users)");
    }
}
