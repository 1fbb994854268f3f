//! Support library for the `doorsync` binary: configuration file loading
//! and logging setup.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError};
