//! Incremental collection sync.
//!
//! A run compares the desired key→id map with the keys already stored,
//! decides per key whether to skip, fetch, or purge and re-fetch, and then
//! walks and stores each planned collection.
//!
//! # Example
//!
//! ```
//! use std::collections::{BTreeMap, BTreeSet};
//! use harvester_core::sync::{SyncAction, plan};
//!
//! let desired = BTreeMap::from([(2022, 5104), (2023, 5272)]);
//! let done = BTreeSet::from([2022]);
//!
//! let sync_plan = plan(&desired, &done, &BTreeSet::new());
//! assert_eq!(sync_plan.entries.len(), 1);
//! assert_eq!(sync_plan.entries[0].action, SyncAction::Fetch);
//! assert!(sync_plan.skipped.contains(&2022));
//! ```

mod orchestrator;
mod planner;

pub use orchestrator::{
    CollectionError, CollectionFailure, CollectionSuccess, DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
    SyncError, SyncOrchestrator, SyncReport,
};
pub use planner::{SyncAction, SyncPlan, SyncPlanEntry, plan};
