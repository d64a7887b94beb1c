//! Repository seam for collection persistence.
//!
//! The sync orchestrator depends on this trait rather than on [`Store`]
//! directly so tests can inject failing or instrumented stores.

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::{PurgeCounts, Result, Store};
use crate::record::Record;

/// Data-access contract used by the sync orchestrator.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Keys whose collection metadata is stored.
    async fn list_done_keys(&self) -> Result<BTreeSet<i64>>;

    /// Keys that have records but no metadata.
    async fn orphaned_record_keys(&self) -> Result<BTreeSet<i64>>;

    /// Removes records and metadata for a key in one transaction.
    async fn purge(&self, key: i64) -> Result<PurgeCounts>;

    /// Stores a harvested collection's records and metadata together.
    async fn commit_collection(
        &self,
        key: i64,
        title: &str,
        external_id: i64,
        records: &[Record],
    ) -> Result<u64>;
}

#[async_trait]
impl CollectionRepository for Store {
    async fn list_done_keys(&self) -> Result<BTreeSet<i64>> {
        Store::list_done_keys(self).await
    }

    async fn orphaned_record_keys(&self) -> Result<BTreeSet<i64>> {
        Store::orphaned_record_keys(self).await
    }

    async fn purge(&self, key: i64) -> Result<PurgeCounts> {
        Store::purge(self, key).await
    }

    async fn commit_collection(
        &self,
        key: i64,
        title: &str,
        external_id: i64,
        records: &[Record],
    ) -> Result<u64> {
        Store::commit_collection(self, key, title, external_id, records).await
    }
}
