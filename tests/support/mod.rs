//! Shared fixtures for integration tests.
#![allow(dead_code)]

pub mod socket_guard;

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Mutex;

use async_trait::async_trait;
use harvester_core::{FetchError, PageFetcher, RawPage};

/// Rows rendered on every page by [`results_page`].
pub const ROWS_PER_PAGE: u32 = 3;

/// Renders a results page in the default layout.
///
/// `links` become the advertised page entries; a trailing "Next" entry is
/// always added to mirror real pagination controls.
pub fn results_page(title: &str, page: u32, links: impl IntoIterator<Item = u32>) -> String {
    results_page_with_rows(title, page, links, ROWS_PER_PAGE)
}

/// Like [`results_page`] but with `row_count` body rows; zero leaves only
/// the header row.
pub fn results_page_with_rows(
    title: &str,
    page: u32,
    links: impl IntoIterator<Item = u32>,
    row_count: u32,
) -> String {
    let mut anchors = String::new();
    for link in links {
        let _ = write!(anchors, "<a href=\"?page={link}\">{link}</a> ");
    }
    anchors.push_str("<a href=\"#\">Next &raquo;</a>");

    let mut rows = String::new();
    for i in 0..row_count {
        let place = (page - 1) * row_count + i + 1;
        let sex = if place % 2 == 0 { "F" } else { "M" };
        let _ = write!(
            rows,
            "<tr><td>{place}</td><td>Runner {place}</td><td>{sex}</td><td>0:{:02}:00</td></tr>",
            20 + place % 40
        );
    }

    format!(
        "<html><head><title>{title} | Leone Timing</title></head><body>
           <div class=\"paging\"><p class=\"pages\">{anchors}</p></div>
           <table><thead><tr><th>Place</th><th>Name</th><th>Sex</th><th>Time</th></tr></thead>
           <tbody>{rows}</tbody></table>
         </body></html>"
    )
}

/// Advertised pages for `page` of a `total`-page collection showing
/// `window` neighbours on each side.
pub fn sliding_window(page: u32, total: u32, window: u32) -> Vec<u32> {
    let first = page.saturating_sub(window).max(1);
    let last = (page + window).min(total);
    (first..=last).collect()
}

/// In-memory site whose collections advertise a sliding page window.
#[derive(Default)]
pub struct SlidingWindowSite {
    collections: HashMap<i64, (u32, u32)>,
    empty: HashSet<i64>,
    unavailable: Mutex<HashSet<i64>>,
    requests: Mutex<Vec<(i64, u32)>>,
}

impl SlidingWindowSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds collection `id` with `pages` pages and a `window`-wide navigation.
    pub fn with_collection(mut self, id: i64, pages: u32, window: u32) -> Self {
        self.collections.insert(id, (pages, window));
        self
    }

    /// Adds collection `id` whose pages carry a header row and no results.
    pub fn with_empty_collection(mut self, id: i64, pages: u32, window: u32) -> Self {
        self.collections.insert(id, (pages, window));
        self.empty.insert(id);
        self
    }

    /// Makes every page of `id` answer 500 until [`Self::restore`] is called.
    pub fn take_down(&self, id: i64) {
        self.unavailable.lock().unwrap().insert(id);
    }

    pub fn restore(&self, id: i64) {
        self.unavailable.lock().unwrap().remove(&id);
    }

    /// Requests made so far, in order.
    pub fn requests(&self) -> Vec<(i64, u32)> {
        self.requests.lock().unwrap().clone()
    }

    /// Requested pages for one collection, in order.
    pub fn pages_requested(&self, id: i64) -> Vec<u32> {
        self.requests()
            .into_iter()
            .filter(|(requested, _)| *requested == id)
            .map(|(_, page)| page)
            .collect()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl PageFetcher for SlidingWindowSite {
    async fn fetch(&self, collection_id: i64, page: u32) -> Result<RawPage, FetchError> {
        self.requests.lock().unwrap().push((collection_id, page));
        let url = format!("https://results.test/index.php?id={collection_id}&page={page}");
        let Some(&(total, window)) = self.collections.get(&collection_id) else {
            return Err(FetchError::http_status(url, 404));
        };
        if page > total {
            return Err(FetchError::http_status(url, 404));
        }
        if self.unavailable.lock().unwrap().contains(&collection_id) {
            return Err(FetchError::http_status(url, 500));
        }
        let row_count = if self.empty.contains(&collection_id) {
            0
        } else {
            ROWS_PER_PAGE
        };
        let body = results_page_with_rows(
            &format!("Race {collection_id}"),
            page,
            sliding_window(page, total, window),
            row_count,
        );
        Ok(RawPage::ok(url, body))
    }
}
