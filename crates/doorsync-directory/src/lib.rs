//! Personnel directory sources for doorsync
//!
//! The directory is the source of truth the terminal is reconciled
//! against. It is read once per run from a JSON file ([`SnapshotSource`]) or
//! an HTTP feed ([`FeedSource`]) and parsed leniently: malformed entries are
//! skipped and reported, never fatal.
//!
//! # Example
//!
//! ```no_run
//! use doorsync_directory::{DirectorySource, SnapshotSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SnapshotSource::new("users.json");
//! let snapshot = source.load().await?;
//!
//! for entry in &snapshot.skipped {
//!     eprintln!("skipped entry {}: {}", entry.position, entry.reason);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod feed;
pub mod parse;
mod snapshot;
mod source;

pub use error::{DirectoryError, DirectoryResult};
pub use feed::FeedSource;
pub use parse::{DirectorySnapshot, SkippedEntry, parse_document};
pub use snapshot::SnapshotSource;
pub use source::{AnySource, DirectorySource, MemorySource};
