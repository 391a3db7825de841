//! KEV sync orchestration
//!
//! Fetch (feed and schema in parallel) -> validate -> reconcile -> report.
//! This is the only place that decides whether a failure ends the run.

use crate::observer::{SyncObserver, SyncPhase, TracingObserver};
use crate::reconcile::Reconciler;
use crate::retry::RetryPolicy;
use kevsync_common::config::KevSyncConfig;
use kevsync_core::{EntryPolicy, Error, FeedDocument, KevStore, Result, SyncReport, DEFAULT_KEV_URL};
use kevsync_feed::{FeedFetcher, SchemaValidator};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Settings for one sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub json_url: String,
    /// Validation is skipped when unset
    pub schema_url: Option<String>,
    pub entry_policy: EntryPolicy,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            json_url: String::from(DEFAULT_KEV_URL),
            schema_url: None,
            entry_policy: EntryPolicy::Skip,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&KevSyncConfig> for SyncOptions {
    fn from(config: &KevSyncConfig) -> Self {
        Self {
            json_url: config.json_url.clone(),
            schema_url: config.schema_url.clone(),
            entry_policy: config.on_missing_identifier,
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                backoff: config.retry_backoff(),
            },
            request_timeout: config.request_timeout(),
        }
    }
}

/// Synchronizes a [`KevStore`] with the upstream KEV feed
pub struct KevSync<S> {
    fetcher: FeedFetcher,
    store: S,
    options: SyncOptions,
    observer: Arc<dyn SyncObserver>,
    cancel: CancellationToken,
}

impl<S: KevStore> KevSync<S> {
    /// Create a synchronizer with an HTTP client bounded by the configured timeout
    pub fn new(store: S, options: SyncOptions) -> Result<Self> {
        let fetcher = FeedFetcher::new(options.request_timeout)?;

        Ok(Self {
            fetcher,
            store,
            options,
            observer: Arc::new(TracingObserver::default()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Token that stops the run between records when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one complete sync.
    ///
    /// Retrieval, decode, and schema errors end the run before anything is
    /// written. Rejected writes do not: the pass completes and then fails
    /// with [`Error::PartialSync`] carrying the full report.
    pub async fn run(&self) -> Result<SyncReport> {
        info!("Starting KEV sync from {}", self.options.json_url);
        self.observer.on_phase(SyncPhase::Fetching);

        let (feed, validator) = tokio::select! {
            fetched = self.fetch() => fetched?,
            _ = self.cancel.cancelled() => {
                return Err(Error::Cancelled { processed: 0 });
            }
        };

        info!(
            "Retrieved KEV catalog {} with {} entries",
            feed.catalog_version.as_deref().unwrap_or("(unversioned)"),
            feed.len()
        );

        let mut count_mismatch = false;
        match validator {
            Some(validator) => {
                self.observer.on_phase(SyncPhase::Validating);
                let check = validator.validate(&feed)?;
                count_mismatch = !check.matches();
            }
            None => info!("No schema URL configured; skipping KEV feed validation"),
        }

        let reconciliation = Reconciler::new(&self.store)
            .policy(self.options.entry_policy)
            .observer(self.observer.as_ref())
            .cancel_token(self.cancel.clone())
            .reconcile_store(&feed.vulnerabilities)?;

        let stored_total = self.store.count()?;
        let report = reconciliation.into_report(stored_total, count_mismatch);
        self.observer.on_phase(SyncPhase::Finished);

        if !report.is_clean() {
            error!(
                "KEV sync finished with {} failed write(s): {}",
                report.failures.len(),
                report.failed_ids().join(", ")
            );
            return Err(Error::PartialSync(Box::new(report)));
        }

        info!("KEV sync complete: {}", report);
        Ok(report)
    }

    /// Fetch the feed and, when configured, the schema concurrently
    async fn fetch(&self) -> Result<(FeedDocument, Option<SchemaValidator>)> {
        let retry = self.options.retry;
        let json_url = self.options.json_url.as_str();

        let feed = retry.run("KEV feed retrieval", || self.fetcher.fetch_feed(json_url));

        match self.options.schema_url.as_deref() {
            Some(schema_url) => {
                let schema = retry.run("KEV schema retrieval", || {
                    SchemaValidator::fetch(&self.fetcher, schema_url)
                });
                let (feed, validator) = tokio::try_join!(feed, schema)?;
                Ok((feed, Some(validator)))
            }
            None => Ok((feed.await?, None)),
        }
    }
}
