//! KEV Sync - Feed reconciliation engine and sync orchestration
//!
//! This crate provides:
//! - `Reconciler`: the create/update/delete diff between feed and store,
//!   applied record by record
//! - `KevSync`: fetch, validate, reconcile, and report for one run
//! - `SyncObserver`: progress reporting hooks for long reconciliations
//! - `RetryPolicy`: bounded retries for transient retrieval failures

pub mod observer;
pub mod reconcile;
pub mod retry;
pub mod sync;

pub use kevsync_core::EntryPolicy;
pub use observer::{NoopObserver, Progress, RecordOutcome, SyncObserver, SyncPhase, TracingObserver};
pub use reconcile::{Reconciler, Reconciliation};
pub use retry::RetryPolicy;
pub use sync::{KevSync, SyncOptions};
pub use tokio_util::sync::CancellationToken;
