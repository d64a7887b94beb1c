//! Pagination walker that discovers a collection's page count while reading it.
//!
//! Listing sites rarely state how many pages a collection has. Each page's
//! navigation advertises a window of nearby page numbers, so the walker keeps
//! a running upper bound: start at page 1 with a bound of 1, and after every
//! page raise the bound to the largest advertised page. The walk ends once the
//! next page number passes the bound.
//!
//! The bound never shrinks. A later page with a narrower window cannot undo
//! pages an earlier page already revealed, and an empty window leaves the
//! bound unchanged.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::fetch::HttpPageFetcher;
//! use harvester_core::parser::HtmlPageParser;
//! use harvester_core::walker::PaginationWalker;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpPageFetcher::new("https://www.leonetiming.com/results/index.php")?;
//! let parser = HtmlPageParser::new()?;
//! let outcome = PaginationWalker::new(&fetcher, &parser).walk(5051).await?;
//! println!("{}: {} rows over {} pages", outcome.title, outcome.records.len(), outcome.page_count);
//! # Ok(())
//! # }
//! ```

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::fetch::{FetchError, PageFetcher};
use crate::parser::{PageParser, ParseError};
use crate::record::Record;

/// Default ceiling on pages walked for one collection.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Why a walk stopped at a given page.
#[derive(Debug, Error)]
pub enum WalkCause {
    /// The page could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The page did not have the expected structure.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Advertised pages kept growing past the configured ceiling.
    #[error("page limit of {limit} exceeded")]
    PageLimitExceeded {
        /// The configured ceiling.
        limit: u32,
    },
}

/// A collection walk aborted; no rows from it are returned.
#[derive(Debug, Error)]
#[error("walk of collection {collection_id} failed at page {page}: {cause}")]
pub struct WalkError {
    /// Remote collection id being walked.
    pub collection_id: i64,
    /// Page at which the walk stopped.
    pub page: u32,
    /// Underlying failure.
    #[source]
    pub cause: WalkCause,
}

impl WalkError {
    fn new(collection_id: i64, page: u32, cause: impl Into<WalkCause>) -> Self {
        Self {
            collection_id,
            page,
            cause: cause.into(),
        }
    }
}

/// Result of a complete walk.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutcome {
    /// Title taken from the first page.
    pub title: String,
    /// Rows of every page, concatenated in page order.
    pub records: Vec<Record>,
    /// Number of pages fetched.
    pub page_count: u32,
    /// Known upper page bound after each fetched page.
    pub bounds: Vec<u32>,
}

/// Drives a [`PageFetcher`] and [`PageParser`] across one collection's pages.
#[derive(Clone, Copy)]
pub struct PaginationWalker<'a> {
    fetcher: &'a dyn PageFetcher,
    parser: &'a dyn PageParser,
    max_pages: u32,
}

impl<'a> PaginationWalker<'a> {
    /// Creates a walker with the default page ceiling.
    #[must_use]
    pub fn new(fetcher: &'a dyn PageFetcher, parser: &'a dyn PageParser) -> Self {
        Self {
            fetcher,
            parser,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Sets the page ceiling (at least 1).
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Walks every page of `collection_id`.
    ///
    /// Pages are fetched strictly in increasing order, one at a time, since
    /// each response decides whether another page exists.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError`] on the first fetch or parse failure, or as soon
    /// as a page advertises a bound beyond the page ceiling.
    #[instrument(skip(self))]
    pub async fn walk(&self, collection_id: i64) -> Result<WalkOutcome, WalkError> {
        let mut current: u32 = 1;
        let mut known_max: u32 = 1;
        let mut title: Option<String> = None;
        let mut records: Vec<Record> = Vec::new();
        let mut bounds: Vec<u32> = Vec::new();

        while current <= known_max {
            info!(page = current, of = known_max, "getting page");
            let raw = self
                .fetcher
                .fetch(collection_id, current)
                .await
                .map_err(|e| WalkError::new(collection_id, current, e))?;
            let parsed = self
                .parser
                .parse(&raw)
                .map_err(|e| WalkError::new(collection_id, current, e))?;

            if let Some(advertised_max) = parsed.max_advertised_page() {
                known_max = known_max.max(advertised_max);
            }
            if known_max > self.max_pages {
                return Err(WalkError::new(
                    collection_id,
                    current,
                    WalkCause::PageLimitExceeded {
                        limit: self.max_pages,
                    },
                ));
            }
            bounds.push(known_max);
            debug!(page = current, known_max, rows = parsed.rows.len(), "page parsed");

            if title.is_none() {
                title = Some(parsed.title);
            }
            records.extend(
                parsed
                    .rows
                    .into_iter()
                    .map(|fields| Record::new(current, fields)),
            );
            current += 1;
        }

        let page_count = current - 1;
        info!(pages = page_count, rows = records.len(), "walk complete");
        Ok(WalkOutcome {
            title: title.unwrap_or_default(),
            records,
            page_count,
            bounds,
        })
    }
}
