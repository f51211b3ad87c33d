//! Detection configuration.

mod config;

pub use config::{ConfigError, DetectConfig};
