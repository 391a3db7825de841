//! KEV Sync Feed - Upstream catalog retrieval, validation, and normalization
//!
//! This crate provides:
//! - Scheme-restricted HTTP(S) retrieval of the KEV feed and its schema
//! - JSON Schema validation plus the reported-vs-actual count check
//! - Normalization of raw feed entries into canonical `KevRecord`s

pub mod fetch;
pub mod normalize;
pub mod schema;

pub use fetch::{check_scheme, FeedFetcher};
pub use normalize::normalize;
pub use schema::{check_count, CountCheck, SchemaValidator};
