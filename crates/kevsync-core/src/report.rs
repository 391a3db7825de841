//! Aggregate outcome of a sync run

use crate::error::WriteOp;
use serde::{Deserialize, Serialize};

/// A single record that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistFailure {
    pub id: String,
    pub operation: WriteOp,
    pub message: String,
}

/// Counts reported at the end of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Entries excluded because they had no usable identifier
    pub skipped: usize,
    /// Repeated identifiers within the same feed
    pub duplicates: usize,
    pub failures: Vec<PersistFailure>,
    /// Records in the store once the run finished
    pub stored_total: u64,
    /// Set when the feed's `count` disagreed with its entry list
    pub count_mismatch: bool,
}

impl SyncReport {
    /// True when every planned write succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Identifiers that failed to persist
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} updated={} unchanged={} deleted={} skipped={} failed={} total={}",
            self.created,
            self.updated,
            self.unchanged,
            self.deleted,
            self.skipped,
            self.failures.len(),
            self.stored_total
        )
    }
}
