//! reqwest-backed [`PageFetcher`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{
    COLLECTION_ID_PARAM, CONNECT_TIMEOUT_SECS, PAGE_PARAM, REQUEST_TIMEOUT_SECS,
};
use super::{FetchError, PageFetcher, RawPage, validate_request};
use crate::user_agent;

/// HTTP page fetcher issuing `GET <base>?id=<collection>&page=<n>`.
///
/// Create once and reuse; the inner client pools connections.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    base_url: Url,
}

impl HttpPageFetcher {
    /// Creates a fetcher with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] for an unparsable base URL and
    /// [`FetchError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Self::with_timeouts(base_url, CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit connect and whole-request timeouts.
    ///
    /// Expiry of either timeout surfaces as [`FetchError::Timeout`].
    ///
    /// # Errors
    ///
    /// Same as [`HttpPageFetcher::new`].
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        base_url: &str,
        connect_timeout_secs: u64,
        request_timeout_secs: u64,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|_| FetchError::InvalidUrl {
            url: base_url.to_string(),
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(request_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_harvest_user_agent())
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self { client, base_url })
    }

    /// Builds the request URL for one page, keeping any existing query pairs.
    #[must_use]
    pub fn page_url(&self, collection_id: i64, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(COLLECTION_ID_PARAM, &collection_id.to_string())
            .append_pair(PAGE_PARAM, &page.to_string());
        url
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, collection_id: i64, page: u32) -> Result<RawPage, FetchError> {
        validate_request(collection_id, page)?;
        let url = self.page_url(collection_id, page);
        let url_text = url.to_string();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url_text, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url_text, status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(&url_text)
            } else {
                FetchError::Body {
                    url: url_text.clone(),
                    source: e,
                }
            }
        })?;
        debug!(bytes = body.len(), "fetched page");

        Ok(RawPage {
            url: url_text,
            status: status.as_u16(),
            body,
        })
    }
}
