//! Store module for harvested collections and their records.
//!
//! Two entity sets live in `SQLite`:
//! - `collections`: one metadata row per harvested collection
//! - `records`: the collection's rows, each tagged with the collection key
//!
//! # Consistency
//!
//! A collection key is "done" once it appears in `collections`. After a fully
//! successful sync every done key has exactly `record_count` records and every
//! record key is done. [`Store::commit_collection`] writes both entity sets in
//! one transaction, so the orchestrator never leaves a gap between them.
//!
//! The lower-level [`Store::append_records`] and
//! [`Store::append_collection_meta`] each commit on their own. Callers using
//! them must write records first; a crash between the two leaves records whose
//! key is not done. Such a key is planned for fetching again on the next run,
//! [`Store::orphaned_record_keys`] reports it, and [`Store::purge`] removes it
//! whichever side is missing.
//!
//! # Example
//!
//! ```ignore
//! use harvester_core::{Database, Store};
//!
//! let store = Store::new(Database::new_in_memory().await?);
//! let done = store.list_done_keys().await?;
//! let counts = store.purge(2022).await?;
//! ```

mod error;
mod repository;

use std::collections::BTreeSet;

use serde_json::Value;
use sqlx::{FromRow, Row, Sqlite, Transaction};
use tracing::{debug, info, instrument, warn};

pub use error::{StoreDbErrorKind, StoreError};
pub use repository::CollectionRepository;

use crate::db::Database;
use crate::record::{Fields, Record};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Stored metadata for one harvested collection.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CollectionMeta {
    /// Logical key, e.g. the race year.
    pub key: i64,
    /// Display title discovered on the first page.
    pub title: String,
    /// Remote collection id used for fetching.
    pub external_id: i64,
    /// Number of records committed with this collection.
    pub record_count: i64,
    /// `SQLite` timestamp of the commit.
    pub harvested_at: String,
}

/// Rows removed by [`Store::purge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    /// Removed collection metadata rows.
    pub collections: u64,
    /// Removed record rows.
    pub records: u64,
}

impl PurgeCounts {
    /// True when nothing was deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections == 0 && self.records == 0
    }
}

/// Per-collection count of records sharing one value of a field.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FieldCount {
    /// Collection key.
    pub key: i64,
    /// Field value as text; `None` for null cells.
    pub value: Option<String>,
    /// Number of records with that value.
    pub count: i64,
}

/// `SQLite`-backed persistence for collections and records.
///
/// Holds an explicit [`Database`] handle; the caller owns its lifecycle.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    /// Creates a store on the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the distinct keys present in collection metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_done_keys(&self) -> Result<BTreeSet<i64>> {
        let keys: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT key FROM collections ORDER BY key")
            .fetch_all(self.db.pool())
            .await?;
        Ok(keys.into_iter().collect())
    }

    /// Deletes all records and metadata for `key` in one transaction.
    ///
    /// Either side may already be missing; purging an unknown key deletes
    /// nothing and succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if either delete fails; nothing is
    /// removed in that case.
    #[instrument(skip(self))]
    pub async fn purge(&self, key: i64) -> Result<PurgeCounts> {
        let mut tx = self.db.pool().begin().await?;

        let records = sqlx::query("DELETE FROM records WHERE collection_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let collections = sqlx::query("DELETE FROM collections WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let counts = PurgeCounts {
            collections,
            records,
        };
        info!(
            key,
            collections = counts.collections,
            records = counts.records,
            "purged collection"
        );
        Ok(counts)
    }

    /// Appends `records` tagged with `key`, committing them together.
    ///
    /// No deduplication is done and column sets are not compared with earlier
    /// batches. Positions continue after any rows already stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if encoding or an insert fails; the whole batch
    /// is rolled back.
    #[instrument(skip(self, records), fields(rows = records.len()))]
    pub async fn append_records(&self, key: i64, records: &[Record]) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;
        let inserted = insert_records(&mut tx, key, records).await?;
        tx.commit().await?;
        debug!(key, inserted, "appended records");
        Ok(inserted)
    }

    /// Appends one collection metadata row, marking `key` as done.
    ///
    /// Must only be called after the key's records are committed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails.
    #[instrument(skip(self, title))]
    pub async fn append_collection_meta(
        &self,
        key: i64,
        title: &str,
        external_id: i64,
        record_count: u64,
    ) -> Result<()> {
        let record_count = to_i64("record_count", record_count)?;
        sqlx::query(
            "INSERT INTO collections (key, title, external_id, record_count) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(title)
        .bind(external_id)
        .bind(record_count)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Writes a harvested collection's records and metadata in one transaction.
    ///
    /// Returns the number of records stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyCollection`] if `records` is empty, or
    /// [`StoreError`] if any write fails; nothing is stored in either case.
    #[instrument(skip(self, title, records), fields(rows = records.len()))]
    pub async fn commit_collection(
        &self,
        key: i64,
        title: &str,
        external_id: i64,
        records: &[Record],
    ) -> Result<u64> {
        if records.is_empty() {
            return Err(StoreError::EmptyCollection { key });
        }
        let record_count = to_i64("record_count", records.len() as u64)?;
        let mut tx = self.db.pool().begin().await?;

        // Must write before any read so concurrent commits queue on the busy timeout.
        sqlx::query(
            "INSERT INTO collections (key, title, external_id, record_count) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(title)
        .bind(external_id)
        .bind(record_count)
        .execute(&mut *tx)
        .await?;
        let inserted = insert_records(&mut tx, key, records).await?;

        tx.commit().await?;
        info!(key, records = inserted, "committed collection");
        Ok(inserted)
    }

    /// Lists collection metadata ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_collections(&self) -> Result<Vec<CollectionMeta>> {
        let collections = sqlx::query_as::<_, CollectionMeta>(
            "SELECT key, title, external_id, record_count, harvested_at
             FROM collections ORDER BY key, id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(collections)
    }

    /// Counts stored records for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_records(&self, key: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection_key = ?")
            .bind(key)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Loads the records for `key` in harvest order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails, or
    /// [`StoreError::CorruptRecord`] if a stored row cannot be decoded.
    #[instrument(skip(self))]
    pub async fn load_records(&self, key: i64) -> Result<Vec<Record>> {
        let rows = sqlx::query(
            "SELECT id, page, fields FROM records WHERE collection_key = ? ORDER BY position, id",
        )
        .bind(key)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let page: i64 = row.get("page");
                let raw: String = row.get("fields");
                let page = u32::try_from(page).map_err(|_| StoreError::CorruptRecord {
                    id,
                    message: format!("page {page} out of range"),
                })?;
                match serde_json::from_str::<Value>(&raw) {
                    Ok(Value::Object(fields)) => Ok(Record::new(page, fields)),
                    Ok(_) => Err(StoreError::CorruptRecord {
                        id,
                        message: "fields is not a JSON object".to_string(),
                    }),
                    Err(e) => Err(StoreError::CorruptRecord {
                        id,
                        message: e.to_string(),
                    }),
                }
            })
            .collect()
    }

    /// Returns every field name seen in stored records, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn field_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT j.key FROM records AS r, json_each(r.fields) AS j ORDER BY j.key",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(names)
    }

    /// Counts records per collection and value of `field`.
    ///
    /// Records without the field are not counted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn summarize_by_field(&self, field: &str) -> Result<Vec<FieldCount>> {
        let counts = sqlx::query_as::<_, FieldCount>(
            "SELECT r.collection_key AS key, CAST(j.value AS TEXT) AS value, COUNT(*) AS count
             FROM records AS r, json_each(r.fields) AS j
             WHERE j.key = ?
             GROUP BY r.collection_key, CAST(j.value AS TEXT)
             ORDER BY r.collection_key, value",
        )
        .bind(field)
        .fetch_all(self.db.pool())
        .await?;
        Ok(counts)
    }

    /// Keys that have records but no collection metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn orphaned_record_keys(&self) -> Result<BTreeSet<i64>> {
        let keys: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT collection_key FROM records
             WHERE collection_key NOT IN (SELECT key FROM collections)
             ORDER BY collection_key",
        )
        .fetch_all(self.db.pool())
        .await?;
        let keys: BTreeSet<i64> = keys.into_iter().collect();
        if !keys.is_empty() {
            warn!(?keys, "records without collection metadata");
        }
        Ok(keys)
    }

    /// Done keys whose stored record count disagrees with their metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn mismatched_collection_keys(&self) -> Result<BTreeSet<i64>> {
        let keys: Vec<i64> = sqlx::query_scalar(
            "SELECT c.key FROM collections AS c
             LEFT JOIN (
                 SELECT collection_key, COUNT(*) AS n FROM records GROUP BY collection_key
             ) AS r ON r.collection_key = c.key
             GROUP BY c.key
             HAVING SUM(c.record_count) != COALESCE(MAX(r.n), 0)
             ORDER BY c.key",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(keys.into_iter().collect())
    }
}

async fn insert_records(
    tx: &mut Transaction<'_, Sqlite>,
    key: i64,
    records: &[Record],
) -> Result<u64> {
    let mut inserted = 0_u64;
    for (index, record) in records.iter().enumerate() {
        let fields = encode_fields(key, index, &record.fields)?;
        sqlx::query(
            "INSERT INTO records (collection_key, page, position, fields)
             VALUES (?, ?, (SELECT COALESCE(MAX(position) + 1, 0) FROM records WHERE collection_key = ?), ?)",
        )
        .bind(key)
        .bind(i64::from(record.page))
        .bind(key)
        .bind(fields)
        .execute(&mut **tx)
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

fn encode_fields(key: i64, position: usize, fields: &Fields) -> Result<String> {
    serde_json::to_string(fields).map_err(|e| StoreError::Encode {
        key,
        position,
        message: e.to_string(),
    })
}

fn to_i64(field: &'static str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange { field, value })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn store() -> Store {
        Store::new(Database::new_in_memory().await.unwrap())
    }

    fn record(page: u32, value: Value) -> Record {
        match value {
            Value::Object(fields) => Record::new(page, fields),
            _ => Record::new(page, Fields::new()),
        }
    }

    fn sample_records() -> Vec<Record> {
        vec![
            record(1, json!({"Place": 1, "Name": "Ann", "Sex": "F"})),
            record(1, json!({"Place": 2, "Name": "Bo", "Sex": "M"})),
            record(2, json!({"Place": 3, "Name": "Cy", "Sex": "M"})),
        ]
    }

    #[tokio::test]
    async fn test_empty_store_has_no_done_keys() {
        let store = store().await;
        assert!(store.list_done_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_collection_marks_key_done() {
        let store = store().await;
        let stored = store
            .commit_collection(2021, "Goat Run", 5051, &sample_records())
            .await
            .unwrap();

        assert_eq!(stored, 3);
        assert_eq!(store.list_done_keys().await.unwrap(), BTreeSet::from([2021]));
        assert_eq!(store.count_records(2021).await.unwrap(), 3);

        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].title, "Goat Run");
        assert_eq!(collections[0].external_id, 5051);
        assert_eq!(collections[0].record_count, 3);
    }

    #[tokio::test]
    async fn test_load_records_preserves_order_and_columns() {
        let store = store().await;
        store
            .commit_collection(2021, "Goat Run", 5051, &sample_records())
            .await
            .unwrap();

        let loaded = store.load_records(2021).await.unwrap();
        assert_eq!(loaded, sample_records());
        let columns: Vec<&String> = loaded[0].fields.keys().collect();
        assert_eq!(columns, ["Place", "Name", "Sex"]);
    }

    #[tokio::test]
    async fn test_purge_removes_both_sides() {
        let store = store().await;
        store
            .commit_collection(2022, "Goat Run", 5104, &sample_records())
            .await
            .unwrap();
        store
            .commit_collection(2023, "Goat Run", 5272, &sample_records()[..1])
            .await
            .unwrap();

        let counts = store.purge(2022).await.unwrap();

        assert_eq!(
            counts,
            PurgeCounts {
                collections: 1,
                records: 3
            }
        );
        assert_eq!(store.list_done_keys().await.unwrap(), BTreeSet::from([2023]));
        assert_eq!(store.count_records(2023).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_tolerates_records_without_metadata() {
        let store = store().await;
        store.append_records(2019, &sample_records()).await.unwrap();

        assert_eq!(
            store.orphaned_record_keys().await.unwrap(),
            BTreeSet::from([2019])
        );
        let counts = store.purge(2019).await.unwrap();
        assert_eq!(counts.collections, 0);
        assert_eq!(counts.records, 3);
        assert!(store.orphaned_record_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_tolerates_metadata_without_records() {
        let store = store().await;
        store
            .append_collection_meta(2018, "Goat Run", 4082, 5)
            .await
            .unwrap();

        assert_eq!(
            store.mismatched_collection_keys().await.unwrap(),
            BTreeSet::from([2018])
        );
        let counts = store.purge(2018).await.unwrap();
        assert_eq!(counts.collections, 1);
        assert_eq!(counts.records, 0);
    }

    #[tokio::test]
    async fn test_purge_unknown_key_is_noop() {
        let store = store().await;
        assert!(store.purge(1999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_two_step_write_matches_commit() {
        let store = store().await;
        let inserted = store.append_records(2017, &sample_records()).await.unwrap();
        store
            .append_collection_meta(2017, "Goat Run", 3014, inserted)
            .await
            .unwrap();

        assert_eq!(store.list_done_keys().await.unwrap(), BTreeSet::from([2017]));
        assert!(store.orphaned_record_keys().await.unwrap().is_empty());
        assert!(store.mismatched_collection_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_records_does_not_deduplicate() {
        let store = store().await;
        store.append_records(2016, &sample_records()).await.unwrap();
        store.append_records(2016, &sample_records()).await.unwrap();

        assert_eq!(store.count_records(2016).await.unwrap(), 6);
        let loaded = store.load_records(2016).await.unwrap();
        assert_eq!(loaded[3], sample_records()[0]);
    }

    #[tokio::test]
    async fn test_append_records_accepts_differing_columns() {
        let store = store().await;
        store
            .append_records(2016, &[record(1, json!({"A": 1}))])
            .await
            .unwrap();
        store
            .append_records(2016, &[record(1, json!({"B": "x", "C": null}))])
            .await
            .unwrap();

        assert_eq!(store.field_names().await.unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_summarize_by_field_groups_per_collection() {
        let store = store().await;
        store
            .commit_collection(2021, "Goat Run", 5051, &sample_records())
            .await
            .unwrap();
        store
            .commit_collection(2022, "Goat Run", 5104, &sample_records()[..1])
            .await
            .unwrap();

        let counts = store.summarize_by_field("Sex").await.unwrap();

        assert_eq!(
            counts,
            vec![
                FieldCount {
                    key: 2021,
                    value: Some("F".to_string()),
                    count: 1
                },
                FieldCount {
                    key: 2021,
                    value: Some("M".to_string()),
                    count: 2
                },
                FieldCount {
                    key: 2022,
                    value: Some("F".to_string()),
                    count: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_load_records_reports_corrupt_rows() {
        let store = store().await;
        sqlx::query(
            "INSERT INTO records (collection_key, page, position, fields) VALUES (2020, 1, 0, '[1, 2]')",
        )
        .execute(store.database().pool())
        .await
        .unwrap();

        let err = store.load_records(2020).await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { .. }));
    }

    #[tokio::test]
    async fn test_commit_rolls_back_on_failure() {
        let store = store().await;
        // Page 0 violates the records CHECK after the metadata row is written.
        let mut records = sample_records();
        records[2].page = 0;

        let err = store
            .commit_collection(2021, "Goat Run", 5051, &records)
            .await
            .unwrap_err();

        assert_eq!(
            err.database_kind(),
            Some(StoreDbErrorKind::ConstraintViolation)
        );
        assert_eq!(store.count_records(2021).await.unwrap(), 0);
        assert!(store.list_done_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejects_non_positive_external_id() {
        let store = store().await;
        let err = store
            .commit_collection(2021, "Goat Run", 0, &sample_records())
            .await
            .unwrap_err();

        assert_eq!(
            err.database_kind(),
            Some(StoreDbErrorKind::ConstraintViolation)
        );
        assert_eq!(store.count_records(2021).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_rejects_empty_collection() {
        let store = store().await;
        let err = store
            .commit_collection(2021, "Goat Run", 5051, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::EmptyCollection { key: 2021 }));
        assert!(store.list_done_keys().await.unwrap().is_empty());
        assert!(store.list_collections().await.unwrap().is_empty());
    }
}
