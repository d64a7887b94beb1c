//! Harvester Core Library
//!
//! Incrementally harvests paginated results listings into a local `SQLite`
//! store. Each desired collection (a logical key mapped to a remote id) is
//! walked page by page until its pagination is exhausted, then stored in one
//! transaction. Collections already stored are skipped unless forced.
//!
//! # Architecture
//!
//! - [`fetch`] - HTTP page retrieval behind the [`PageFetcher`] trait
//! - [`parser`] - Title, pagination, and table extraction from HTML
//! - [`walker`] - Page-count discovery while walking a collection
//! - [`sync`] - Planning and orchestration of an incremental run
//! - [`store`] - Collection and record persistence
//! - [`db`] - Database connection and schema management
//! - [`record`] - Open-schema record values

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod db;
pub mod fetch;
pub mod parser;
pub mod record;
pub mod store;
pub mod sync;
pub mod walker;

mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use db::{Database, DatabaseOptions, DbError};
pub use fetch::{FetchError, HttpPageFetcher, PageFetcher, RawPage};
pub use parser::{HtmlPageParser, PageLayout, PageParser, ParseError, ParsedPage};
pub use record::{Fields, Record};
pub use store::{CollectionMeta, CollectionRepository, PurgeCounts, Store, StoreError};
pub use sync::{
    CollectionError, CollectionFailure, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, SyncAction,
    SyncError, SyncOrchestrator, SyncPlan, SyncReport,
};
pub use walker::{DEFAULT_MAX_PAGES, PaginationWalker, WalkError, WalkOutcome};
