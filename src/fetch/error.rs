//! Error types for the fetch module.
//!
//! Every variant is a transport-level failure: no partial page content is
//! ever returned alongside an error.

use thiserror::Error;

/// Errors that can occur while fetching one listing page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The collection id or page number was not a positive integer.
    #[error("invalid page request (collection {collection_id}, page {page}): {reason}")]
    InvalidRequest {
        /// Requested remote collection id.
        collection_id: i64,
        /// Requested page number.
        page: u32,
        /// Which constraint was violated.
        reason: &'static str,
    },

    /// The configured base URL could not be parsed.
    #[error("invalid base URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be read as text.
    #[error("failed to read body of {url}: {source}")]
    Body {
        /// The URL whose body failed.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(collection_id: i64, page: u32, reason: &'static str) -> Self {
        Self::InvalidRequest {
            collection_id,
            page,
            reason,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Maps a reqwest send/read failure, promoting timeouts.
    pub(crate) fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Returns the HTTP status code for status errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
