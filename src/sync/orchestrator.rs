//! Sync orchestrator: plan, purge, walk, and store each collection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use super::planner::{SyncAction, SyncPlan, SyncPlanEntry, plan};
use crate::fetch::PageFetcher;
use crate::parser::PageParser;
use crate::record::field_union;
use crate::store::{CollectionRepository, PurgeCounts, StoreError};
use crate::walker::{DEFAULT_MAX_PAGES, PaginationWalker, WalkError};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 16;

/// Default number of collections processed at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Failures that stop a run before any collection is processed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// Stored sync state could not be read.
    #[error("failed to read sync state: {0}")]
    Store(#[from] StoreError),
}

/// Why one collection failed. Other collections are unaffected.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Removing the stored copy failed; nothing was fetched.
    #[error("purge failed: {0}")]
    Purge(#[source] StoreError),

    /// Fetching or parsing a page failed; nothing was stored.
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// Every page parsed but none held a row; nothing was stored.
    #[error("collection {external_id} yielded no records over {pages} pages")]
    Empty {
        /// Remote collection id.
        external_id: i64,
        /// Pages walked.
        pages: u32,
    },

    /// Storing the harvested rows failed; the transaction was rolled back.
    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),
}

/// A collection that was harvested and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSuccess {
    /// Logical collection key.
    pub key: i64,
    /// Remote collection id.
    pub external_id: i64,
    /// Action that was planned.
    pub action: SyncAction,
    /// Discovered display title.
    pub title: String,
    /// Pages walked.
    pub pages: u32,
    /// Records stored.
    pub records: u64,
    /// Rows removed before fetching.
    pub purged: PurgeCounts,
}

/// A collection that failed; it stays un-done and is retried next run.
#[derive(Debug)]
pub struct CollectionFailure {
    /// Logical collection key.
    pub key: i64,
    /// Remote collection id.
    pub external_id: i64,
    /// What went wrong.
    pub error: CollectionError,
}

/// Outcome of one [`SyncOrchestrator::run`].
#[derive(Debug, Default)]
pub struct SyncReport {
    /// The plan that was executed.
    pub plan: SyncPlan,
    /// Stored collections in key order.
    pub completed: Vec<CollectionSuccess>,
    /// Failed collections in key order.
    pub failed: Vec<CollectionFailure>,
}

impl SyncReport {
    /// Keys skipped because they were already stored.
    #[must_use]
    pub fn skipped(&self) -> &BTreeSet<i64> {
        &self.plan.skipped
    }

    /// Keys stored this run.
    #[must_use]
    pub fn fetched_keys(&self) -> Vec<i64> {
        self.completed.iter().map(|c| c.key).collect()
    }

    /// Keys whose earlier rows were removed this run.
    #[must_use]
    pub fn purged_keys(&self) -> Vec<i64> {
        self.completed
            .iter()
            .filter(|c| c.action == SyncAction::PurgeAndFetch || !c.purged.is_empty())
            .map(|c| c.key)
            .collect()
    }

    /// Keys that failed this run.
    #[must_use]
    pub fn failed_keys(&self) -> Vec<i64> {
        self.failed.iter().map(|f| f.key).collect()
    }

    /// True when every planned collection was stored.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Records stored across all completed collections.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.completed.iter().map(|c| c.records).sum()
    }
}

/// Runs incremental syncs of desired collections into a store.
///
/// # Concurrency Model
///
/// - Each plan entry names a distinct key, so no two workers touch one key
/// - Up to `concurrency` collections run at once; results keep plan order
/// - Pages inside one collection are always fetched one after another
/// - Each collection's rows and metadata commit in a single transaction
pub struct SyncOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn PageParser>,
    store: Arc<dyn CollectionRepository>,
    concurrency: usize,
    max_pages: u32,
}

impl SyncOrchestrator {
    /// Creates a sequential orchestrator.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn PageParser>,
        store: Arc<dyn CollectionRepository>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            store,
            concurrency: DEFAULT_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Sets how many collections may be processed at once.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConcurrency`] outside
    /// `1..=`[`MAX_CONCURRENCY`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, SyncError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SyncError::InvalidConcurrency { value: concurrency });
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    /// Sets the per-collection page ceiling.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Computes the plan for `desired` against the store's done keys.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the done keys cannot be read.
    pub async fn plan(
        &self,
        desired: &BTreeMap<i64, i64>,
        force_refresh: &BTreeSet<i64>,
    ) -> Result<SyncPlan, SyncError> {
        let done = self.store.list_done_keys().await?;
        Ok(plan(desired, &done, force_refresh))
    }

    /// Plans and executes one sync run.
    ///
    /// A failing collection is logged and recorded in the report; the rest of
    /// the batch still runs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] only if the store state needed for
    /// planning cannot be read.
    #[instrument(skip_all, fields(desired = desired.len(), forced = force_refresh.len()))]
    pub async fn run(
        &self,
        desired: &BTreeMap<i64, i64>,
        force_refresh: &BTreeSet<i64>,
    ) -> Result<SyncReport, SyncError> {
        let sync_plan = self.plan(desired, force_refresh).await?;
        if sync_plan.is_empty() {
            info!(skipped = sync_plan.skipped.len(), "nothing to sync");
            return Ok(SyncReport {
                plan: sync_plan,
                ..SyncReport::default()
            });
        }

        let orphans = self.store.orphaned_record_keys().await?;
        let remaining: Vec<i64> = sync_plan.entries.iter().map(|e| e.key).collect();
        info!(
            ?remaining,
            concurrency = self.concurrency,
            "collections remaining to scrape"
        );

        let orphans = &orphans;
        let outcomes: Vec<_> = stream::iter(sync_plan.entries.iter().copied())
            .map(|entry| async move {
                let span = info_span!("collection", key = entry.key, id = entry.external_id);
                let outcome = self.sync_collection(entry, orphans).instrument(span).await;
                (entry, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = SyncReport {
            plan: sync_plan,
            ..SyncReport::default()
        };
        for (entry, outcome) in outcomes {
            match outcome {
                Ok(success) => report.completed.push(success),
                Err(error) => {
                    warn!(key = entry.key, error = %error, "collection sync failed; continuing");
                    report.failed.push(CollectionFailure {
                        key: entry.key,
                        external_id: entry.external_id,
                        error,
                    });
                }
            }
        }

        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            skipped = report.skipped().len(),
            records = report.total_records(),
            "sync complete"
        );
        Ok(report)
    }

    async fn sync_collection(
        &self,
        entry: SyncPlanEntry,
        orphans: &BTreeSet<i64>,
    ) -> Result<CollectionSuccess, CollectionError> {
        let purged = match entry.action {
            SyncAction::PurgeAndFetch => self
                .store
                .purge(entry.key)
                .await
                .map_err(CollectionError::Purge)?,
            SyncAction::Fetch if orphans.contains(&entry.key) => {
                warn!(key = entry.key, "removing records left by an interrupted sync");
                self.store
                    .purge(entry.key)
                    .await
                    .map_err(CollectionError::Purge)?
            }
            SyncAction::Fetch => PurgeCounts::default(),
        };

        let walker = PaginationWalker::new(self.fetcher.as_ref(), self.parser.as_ref())
            .with_max_pages(self.max_pages);
        let outcome = walker.walk(entry.external_id).await?;
        debug!(
            title = %outcome.title,
            pages = outcome.page_count,
            fields = ?field_union(&outcome.records),
            "walked collection"
        );
        if outcome.records.is_empty() {
            return Err(CollectionError::Empty {
                external_id: entry.external_id,
                pages: outcome.page_count,
            });
        }

        let records = self
            .store
            .commit_collection(
                entry.key,
                &outcome.title,
                entry.external_id,
                &outcome.records,
            )
            .await
            .map_err(CollectionError::Commit)?;
        info!(key = entry.key, records, "updated results");

        Ok(CollectionSuccess {
            key: entry.key,
            external_id: entry.external_id,
            action: entry.action,
            title: outcome.title,
            pages: outcome.page_count,
            records,
            purged,
        })
    }
}
