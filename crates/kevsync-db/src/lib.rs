//! KEV Sync DB - Stores for the local KEV collection
//!
//! This crate provides two `KevStore` implementations:
//! - `SqliteKevStore`: the persistent store used by the `kevsync` binary
//! - `MemoryKevStore`: an in-process store with write-failure injection

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKevStore;
pub use sqlite::SqliteKevStore;
