//! Progress reporting hooks for a sync run

use tracing::{debug, info};

/// Stage of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Fetching,
    Validating,
    /// Walking the feed; carries the number of entries
    Reconciling { entries: usize },
    /// Removing records absent from the feed; carries how many
    Deleting { stale: usize },
    Finished,
}

/// What happened to one feed entry or stale record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// Entry had no usable identifier
    Skipped,
    /// Identifier already seen earlier in the same feed
    Duplicate,
    /// The store rejected the write
    Failed,
}

/// Counts so far within the current pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Items handled in the current phase
    pub processed: usize,
    /// Items in the current phase
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Receives phase changes and per-record progress.
///
/// Both hooks default to doing nothing.
pub trait SyncObserver: Send + Sync {
    fn on_phase(&self, _phase: SyncPhase) {}

    fn on_progress(&self, _outcome: RecordOutcome, _progress: &Progress) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// Observer that logs phases and periodic progress through `tracing`
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    /// Log a progress line every this many items
    every: usize,
}

impl TracingObserver {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(500)
    }
}

impl SyncObserver for TracingObserver {
    fn on_phase(&self, phase: SyncPhase) {
        match phase {
            SyncPhase::Fetching => info!("Fetching KEV feed"),
            SyncPhase::Validating => info!("Validating KEV feed against schema"),
            SyncPhase::Reconciling { entries } => {
                info!("Reconciling {} feed entries", entries)
            }
            SyncPhase::Deleting { stale } => info!("Deleting {} stale KEV records", stale),
            SyncPhase::Finished => debug!("Sync finished"),
        }
    }

    fn on_progress(&self, _outcome: RecordOutcome, progress: &Progress) {
        if progress.processed % self.every == 0 || progress.processed == progress.total {
            info!(
                "Processed {}/{} (created={} updated={} deleted={} failed={})",
                progress.processed,
                progress.total,
                progress.created,
                progress.updated,
                progress.deleted,
                progress.failed
            );
        }
    }
}
