//! Page fetching for paginated listings.
//!
//! A [`PageFetcher`] issues exactly one request for a
//! `(collection id, page number)` pair and returns the raw page. The
//! [`HttpPageFetcher`] implementation talks HTTP; tests substitute scripted
//! fetchers through the same trait.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::fetch::{HttpPageFetcher, PageFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpPageFetcher::new("https://www.leonetiming.com/results/index.php")?;
//! let page = fetcher.fetch(5051, 1).await?;
//! println!("{} bytes from {}", page.body.len(), page.url);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;

use async_trait::async_trait;

pub use client::HttpPageFetcher;
pub use constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
pub use error::FetchError;

/// Raw content of one successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Fully resolved request URL.
    pub url: String,
    /// HTTP status of the response (always a success status).
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl RawPage {
    /// Builds a page with status 200, mainly for scripted fetchers.
    pub fn ok(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
        }
    }
}

/// Transport seam: one request per page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `page` (1-based) of the remote collection `collection_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid input, network failure, timeout or a
    /// non-success status.
    async fn fetch(&self, collection_id: i64, page: u32) -> Result<RawPage, FetchError>;
}

/// Rejects non-positive collection ids and page numbers.
pub(crate) fn validate_request(collection_id: i64, page: u32) -> Result<(), FetchError> {
    if collection_id <= 0 {
        return Err(FetchError::invalid_request(
            collection_id,
            page,
            "collection id must be positive",
        ));
    }
    if page == 0 {
        return Err(FetchError::invalid_request(
            collection_id,
            page,
            "page numbers start at 1",
        ));
    }
    Ok(())
}
