//! KEV Sync Common - Shared utilities: configuration, logging, log redaction
//!
//! This crate provides common functionality used by the KEV sync binary and
//! library crates.

pub mod config;
pub mod logging;
pub mod redact;

pub use config::{Config, ConfigBuilder};
pub use logging::{init_logging, init_logging_to, LogFormat, LogSettings};
pub use redact::redact_credentials;
