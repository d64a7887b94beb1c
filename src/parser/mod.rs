//! Listing page parsing.
//!
//! A page yields three things: the collection's display title, the rows of
//! its single data table, and the page numbers its pagination controls
//! advertise. Pagination on these sites usually shows a sliding window of
//! nearby pages, so `advertised_pages` is neither contiguous nor guaranteed to
//! contain the last page.
//!
//! # Example
//!
//! ```
//! use harvester_core::fetch::RawPage;
//! use harvester_core::parser::{HtmlPageParser, PageParser};
//!
//! let body = r#"<html><head><title>Goat Run | Timing</title></head><body>
//!   <div class="paging"><p class="pages"><a>1</a><a>2</a></p></div>
//!   <table><tr><th>Place</th></tr><tr><td>1</td></tr></table>
//! </body></html>"#;
//!
//! let parser = HtmlPageParser::new().unwrap();
//! let parsed = parser.parse(&RawPage::ok("https://example.com", body)).unwrap();
//! assert_eq!(parsed.title, "Goat Run");
//! assert_eq!(parsed.max_advertised_page(), Some(2));
//! ```

mod error;
mod page;
mod table;

use std::collections::BTreeSet;

pub use error::ParseError;
pub use page::{HtmlPageParser, PageLayout, trim_title};
pub use table::{SingleTableExtractor, TableExtractor};

use crate::fetch::RawPage;
use crate::record::Fields;

/// Structured content of one listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    /// Collection display title with boilerplate suffix removed.
    pub title: String,
    /// Rows of the data table in document order.
    pub rows: Vec<Fields>,
    /// Page numbers offered as navigation from this page.
    pub advertised_pages: BTreeSet<u32>,
}

impl ParsedPage {
    /// Highest advertised page number, if any page was advertised.
    #[must_use]
    pub fn max_advertised_page(&self) -> Option<u32> {
        self.advertised_pages.last().copied()
    }
}

/// Parsing seam between raw pages and the pagination walker.
pub trait PageParser: Send + Sync {
    /// Parses one raw page.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the page does not have the expected
    /// structure.
    fn parse(&self, page: &RawPage) -> Result<ParsedPage, ParseError>;
}
