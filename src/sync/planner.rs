//! Per-collection sync decisions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, instrument};

/// What to do with one desired collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// Not stored yet: walk and store it.
    Fetch,
    /// Stored but forced: remove the stored copy, then walk and store it.
    PurgeAndFetch,
}

impl SyncAction {
    /// Returns the stable label used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::PurgeAndFetch => "purge_and_fetch",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collection that needs work this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPlanEntry {
    /// Logical collection key.
    pub key: i64,
    /// Remote collection id.
    pub external_id: i64,
    /// Action to take.
    pub action: SyncAction,
}

/// Work for one run, ordered by ascending key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Collections to fetch, in key order.
    pub entries: Vec<SyncPlanEntry>,
    /// Desired keys left alone because they are already stored.
    pub skipped: BTreeSet<i64>,
}

impl SyncPlan {
    /// True when nothing needs fetching.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries with the given action.
    #[must_use]
    pub fn count(&self, action: SyncAction) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.action == action)
            .count()
    }
}

/// Decides Skip / Fetch / PurgeAndFetch for every desired collection.
///
/// - not in `done`: [`SyncAction::Fetch`]
/// - in `done` and in `force_refresh`: [`SyncAction::PurgeAndFetch`]
/// - in `done` only: skipped (no entry)
///
/// Force-refresh keys that are not desired are ignored. The inputs are never
/// modified; the plan is a fresh value.
#[instrument(skip_all, fields(desired = desired.len(), done = done.len(), forced = force_refresh.len()))]
#[must_use]
pub fn plan(
    desired: &BTreeMap<i64, i64>,
    done: &BTreeSet<i64>,
    force_refresh: &BTreeSet<i64>,
) -> SyncPlan {
    let mut sync_plan = SyncPlan::default();

    for (&key, &external_id) in desired {
        let action = match (done.contains(&key), force_refresh.contains(&key)) {
            (false, _) => SyncAction::Fetch,
            (true, true) => SyncAction::PurgeAndFetch,
            (true, false) => {
                info!(key, "data already collected");
                sync_plan.skipped.insert(key);
                continue;
            }
        };
        sync_plan.entries.push(SyncPlanEntry {
            key,
            external_id,
            action,
        });
    }

    for key in force_refresh.iter().filter(|key| !desired.contains_key(key)) {
        debug!(key, "force refresh requested for undesired key; ignoring");
    }

    sync_plan
}
