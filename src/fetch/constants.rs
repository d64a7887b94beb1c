//! Constants for the fetch module (timeouts).

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout (30 seconds). Listing pages are small.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Query parameter carrying the remote collection id.
pub(crate) const COLLECTION_ID_PARAM: &str = "id";

/// Query parameter carrying the 1-based page number.
pub(crate) const PAGE_PARAM: &str = "page";
