//! KEV Sync Core - Foundation types, persistence trait, and error handling
//!
//! This crate provides the core abstractions shared by the KEV sync crates:
//! - `FeedDocument` / `FeedEntry`: the upstream catalog as published
//! - `KevRecord`: the canonical record kept in the local store
//! - `KevStore`: the persistence boundary the reconciliation engine writes through
//! - `EntryPolicy`: skip-or-abort handling of entries without an identifier
//! - `SyncReport`: aggregate counts for one run
//! - `Error`: the error taxonomy for fetch, validation, and persistence

pub mod error;
pub mod feed;
pub mod policy;
pub mod record;
pub mod report;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, Result, WriteOp};
pub use feed::{
    FeedDocument, FeedEntry, ALLOWED_URL_SCHEMES, DEFAULT_KEV_SCHEMA_URL, DEFAULT_KEV_URL,
};
pub use policy::EntryPolicy;
pub use record::KevRecord;
pub use report::{PersistFailure, SyncReport};
pub use store::KevStore;
