//! Access control terminal layer for doorsync
//!
//! This crate talks to the terminal over ISAPI, the HTTP+JSON API of Hikvision
//! access control devices. It handles Digest authentication, search paging,
//! and the multipart face upload.
//!
//! # Components
//!
//! - **DeviceClient**: the operation set the sync engine depends on
//! - **IsapiClient**: HTTP implementation with Digest authentication
//! - **MockDevice**: in-memory implementation for tests and dry runs
//!
//! # Example
//!
//! ```no_run
//! use doorsync_device::{DeviceClient, DeviceConfig, IsapiClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DeviceConfig::new("http://192.168.1.64", "admin", "secret")
//!     .timeout(Duration::from_secs(10));
//!
//! let client = IsapiClient::new(config)?;
//! let users = client.list_users().await?;
//! println!("{} users enrolled", users.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod digest;
pub mod mock;
mod traits;
pub mod wire;

pub use client::IsapiClient;
pub use config::DeviceConfig;
pub use mock::MockDevice;
pub use traits::{Ack, DeviceClient};
