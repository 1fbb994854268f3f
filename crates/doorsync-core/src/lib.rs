//! Shared vocabulary for the doorsync workspace.
//!
//! Every other crate speaks in terms of [`UserRecord`] and reports failures
//! through [`Error`]. Keeping both here lets the device client, the directory
//! loaders and the sync engine agree on one error taxonomy without depending
//! on each other.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
