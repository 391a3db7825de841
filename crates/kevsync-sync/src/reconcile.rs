//! Reconciliation of the local KEV collection against the feed
//!
//! The current store contents are loaded once into a map keyed by id. Each
//! feed entry pops its id from that map: a hit is compared and saved only if
//! the ransomware flag changed, a miss is inserted. Whatever is left in the
//! map afterwards is no longer in the feed and gets deleted. One pass over
//! the feed plus one over the snapshot, no per-entry existence queries.
//!
//! Writes are applied one record at a time. A rejected write is recorded and
//! the pass carries on; callers get every failure back in
//! [`Reconciliation::failures`].

use crate::observer::{NoopObserver, Progress, RecordOutcome, SyncObserver, SyncPhase};
use kevsync_core::{
    EntryPolicy, Error, FeedEntry, KevRecord, KevStore, PersistFailure, Result, SyncReport,
    WriteOp,
};
use kevsync_feed::normalize;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Inserted records, in feed order
    pub created: Vec<KevRecord>,
    /// Records whose flag changed, in feed order
    pub updated: Vec<KevRecord>,
    /// Removed records, in store order
    pub deleted: Vec<KevRecord>,
    pub unchanged: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failures: Vec<PersistFailure>,
}

impl Reconciliation {
    /// True when nothing was written or needed writing
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.failures.is_empty()
    }

    /// Collapse into the counts reported for a run
    pub fn into_report(self, stored_total: u64, count_mismatch: bool) -> SyncReport {
        SyncReport {
            created: self.created.len(),
            updated: self.updated.len(),
            unchanged: self.unchanged,
            deleted: self.deleted.len(),
            skipped: self.skipped,
            duplicates: self.duplicates,
            failures: self.failures,
            stored_total,
            count_mismatch,
        }
    }
}

/// Applies the feed-vs-store diff through a [`KevStore`]
pub struct Reconciler<'a> {
    store: &'a dyn KevStore,
    policy: EntryPolicy,
    observer: &'a dyn SyncObserver,
    cancel: Option<CancellationToken>,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn KevStore) -> Self {
        Self {
            store,
            policy: EntryPolicy::default(),
            observer: &NoopObserver,
            cancel: None,
        }
    }

    /// Set the handling of entries without an identifier
    pub fn policy(mut self, policy: EntryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn observer(mut self, observer: &'a dyn SyncObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Checked between records; never mid-record
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |t| t.is_cancelled())
    }

    /// Load the current store contents and reconcile `entries` against them
    pub fn reconcile_store(&self, entries: &[FeedEntry]) -> Result<Reconciliation> {
        let snapshot = self.store.find_all()?;
        debug!("Loaded {} existing KEV records", snapshot.len());
        self.reconcile(entries, snapshot)
    }

    /// Reconcile `entries` against `snapshot`, the store contents at the
    /// start of the pass.
    ///
    /// Under [`EntryPolicy::Abort`] the first entry without an identifier
    /// stops the pass; writes already made stay in place and nothing is
    /// deleted. Cancellation likewise skips the deletion phase.
    pub fn reconcile(
        &self,
        entries: &[FeedEntry],
        snapshot: Vec<KevRecord>,
    ) -> Result<Reconciliation> {
        let store_order: Vec<String> = snapshot.iter().map(|r| r.id.clone()).collect();
        let mut working: HashMap<String, KevRecord> = snapshot
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());

        let mut result = Reconciliation::default();
        let mut progress = Progress {
            total: entries.len(),
            ..Default::default()
        };

        self.observer.on_phase(SyncPhase::Reconciling {
            entries: entries.len(),
        });

        for (position, entry) in entries.iter().enumerate() {
            if self.is_cancelled() {
                warn!(
                    "Reconciliation cancelled after {} of {} entries",
                    position,
                    entries.len()
                );
                return Err(Error::Cancelled {
                    processed: position,
                });
            }

            let outcome = match normalize(entry) {
                Ok(record) if !seen.insert(record.id.clone()) => {
                    warn!(
                        "Duplicate cveID {} at feed entry #{}; keeping the first occurrence",
                        record.id, position
                    );
                    result.duplicates += 1;
                    RecordOutcome::Duplicate
                }
                Ok(record) => self.apply_entry(record, &mut working, &mut result),
                Err(Error::MissingIdentifier { vulnerability, .. }) => {
                    let err = Error::MissingIdentifier {
                        position,
                        vulnerability,
                    };
                    match self.policy {
                        EntryPolicy::Skip => {
                            warn!("Skipping feed entry: {}", err);
                            result.skipped += 1;
                            RecordOutcome::Skipped
                        }
                        EntryPolicy::Abort => {
                            error!("Aborting reconciliation: {}", err);
                            return Err(err);
                        }
                    }
                }
                Err(e) => return Err(e),
            };

            progress.processed = position + 1;
            self.observe(outcome, &mut progress);
        }

        let stale: Vec<KevRecord> = store_order
            .iter()
            .filter_map(|id| working.remove(id))
            .collect();

        self.observer.on_phase(SyncPhase::Deleting { stale: stale.len() });
        progress.processed = 0;
        progress.total = stale.len();

        for record in stale {
            if self.is_cancelled() {
                warn!(
                    "Reconciliation cancelled during deletion ({} of {} removed)",
                    result.deleted.len(),
                    progress.total
                );
                return Err(Error::Cancelled {
                    processed: entries.len(),
                });
            }

            let outcome = match self.store.delete(&record) {
                Ok(()) => {
                    info!("Deleted KEV record with id: {}", record.id);
                    result.deleted.push(record);
                    RecordOutcome::Deleted
                }
                Err(e) => self.fail(&mut result, &record.id, WriteOp::Delete, e),
            };

            progress.processed += 1;
            self.observe(outcome, &mut progress);
        }

        info!(
            "Reconciliation complete: {} created, {} updated, {} unchanged, {} deleted, {} skipped, {} failed",
            result.created.len(),
            result.updated.len(),
            result.unchanged,
            result.deleted.len(),
            result.skipped,
            result.failures.len()
        );

        Ok(result)
    }

    fn apply_entry(
        &self,
        record: KevRecord,
        working: &mut HashMap<String, KevRecord>,
        result: &mut Reconciliation,
    ) -> RecordOutcome {
        match working.remove(&record.id) {
            Some(mut existing) if existing.known_ransomware != record.known_ransomware => {
                existing.known_ransomware = record.known_ransomware;
                match self.store.save(&existing) {
                    Ok(()) => {
                        info!("Updated KEV record with id: {}", existing.id);
                        result.updated.push(existing);
                        RecordOutcome::Updated
                    }
                    Err(e) => self.fail(result, &existing.id, WriteOp::Update, e),
                }
            }
            Some(_) => {
                result.unchanged += 1;
                RecordOutcome::Unchanged
            }
            None => match self.store.save(&record) {
                Ok(()) => {
                    debug!("Created KEV record with id: {}", record.id);
                    result.created.push(record);
                    RecordOutcome::Created
                }
                Err(e) => self.fail(result, &record.id, WriteOp::Insert, e),
            },
        }
    }

    fn fail(
        &self,
        result: &mut Reconciliation,
        id: &str,
        operation: WriteOp,
        err: Error,
    ) -> RecordOutcome {
        let failure = Error::PersistenceFailure {
            id: id.to_string(),
            operation,
            message: err.to_string(),
        };
        error!("{}", failure);

        result.failures.push(PersistFailure {
            id: id.to_string(),
            operation,
            message: err.to_string(),
        });
        RecordOutcome::Failed
    }

    fn observe(&self, outcome: RecordOutcome, progress: &mut Progress) {
        match outcome {
            RecordOutcome::Created => progress.created += 1,
            RecordOutcome::Updated => progress.updated += 1,
            RecordOutcome::Unchanged => progress.unchanged += 1,
            RecordOutcome::Deleted => progress.deleted += 1,
            RecordOutcome::Skipped | RecordOutcome::Duplicate => progress.skipped += 1,
            RecordOutcome::Failed => progress.failed += 1,
        }
        self.observer.on_progress(outcome, progress);
    }
}
