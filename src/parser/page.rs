//! HTML listing page parser.

use std::collections::BTreeSet;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::table::{SingleTableExtractor, TableExtractor, compile};
use super::{PageParser, ParseError, ParsedPage};
use crate::fetch::RawPage;

/// CSS selectors and title trimming rules describing a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageLayout {
    /// Element whose text is the page title.
    pub title_selector: String,
    /// Title text after the first occurrence of this delimiter is dropped.
    /// An empty delimiter keeps the whole title.
    pub title_delimiter: String,
    /// Container holding the pagination controls.
    pub paging_selector: String,
    /// Advertised-pages list inside the pagination container.
    pub page_list_selector: String,
    /// Clickable page entries inside the page list.
    pub page_link_selector: String,
    /// Candidate data tables; exactly one must match.
    pub table_selector: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            title_selector: "title".to_string(),
            title_delimiter: "|".to_string(),
            paging_selector: "div.paging".to_string(),
            page_list_selector: "p.pages".to_string(),
            page_link_selector: "a".to_string(),
            table_selector: "table".to_string(),
        }
    }
}

/// [`PageParser`] for HTML results pages.
#[derive(Debug)]
pub struct HtmlPageParser {
    layout: PageLayout,
    title: Selector,
    paging: Selector,
    page_list: Selector,
    page_link: Selector,
    tables: Box<dyn TableExtractor>,
}

impl HtmlPageParser {
    /// Creates a parser for the default layout.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidSelector`] if a selector does not compile.
    pub fn new() -> Result<Self, ParseError> {
        Self::with_layout(PageLayout::default())
    }

    /// Creates a parser for `layout`, extracting rows with a
    /// [`SingleTableExtractor`] on `layout.table_selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidSelector`] if a selector does not compile.
    pub fn with_layout(layout: PageLayout) -> Result<Self, ParseError> {
        let tables = SingleTableExtractor::with_selector(&layout.table_selector)?;
        Ok(Self {
            title: compile(&layout.title_selector)?,
            paging: compile(&layout.paging_selector)?,
            page_list: compile(&layout.page_list_selector)?,
            page_link: compile(&layout.page_link_selector)?,
            tables: Box::new(tables),
            layout,
        })
    }

    /// Replaces the table extraction strategy.
    #[must_use]
    pub fn with_table_extractor(mut self, tables: Box<dyn TableExtractor>) -> Self {
        self.tables = tables;
        self
    }

    fn title(&self, document: &Html) -> Result<String, ParseError> {
        let element = document
            .select(&self.title)
            .next()
            .ok_or_else(|| ParseError::MissingTitle {
                selector: self.layout.title_selector.clone(),
            })?;
        Ok(trim_title(
            &element.text().collect::<String>(),
            &self.layout.title_delimiter,
        ))
    }

    fn advertised_pages(&self, document: &Html) -> Result<BTreeSet<u32>, ParseError> {
        let paging = document
            .select(&self.paging)
            .next()
            .ok_or_else(|| ParseError::MissingNavigation {
                selector: self.layout.paging_selector.clone(),
            })?;
        let list = paging
            .select(&self.page_list)
            .next()
            .ok_or_else(|| ParseError::MissingPageList {
                selector: self.layout.page_list_selector.clone(),
            })?;

        Ok(list
            .select(&self.page_link)
            .filter_map(page_number)
            .collect())
    }
}

impl PageParser for HtmlPageParser {
    #[instrument(skip(self, page), fields(url = %page.url))]
    fn parse(&self, page: &RawPage) -> Result<ParsedPage, ParseError> {
        let document = Html::parse_document(&page.body);

        let title = self.title(&document)?;
        let advertised_pages = self.advertised_pages(&document)?;
        let rows = self.tables.extract_single_table(&document)?;

        debug!(
            rows = rows.len(),
            advertised = ?advertised_pages,
            "parsed page"
        );
        Ok(ParsedPage {
            title,
            rows,
            advertised_pages,
        })
    }
}

/// Cuts `raw` at the first `delimiter` and trims surrounding whitespace.
#[must_use]
pub fn trim_title(raw: &str, delimiter: &str) -> String {
    let head = if delimiter.is_empty() {
        raw
    } else {
        raw.split(delimiter).next().unwrap_or(raw)
    };
    head.trim().to_string()
}

// Entries such as "Next" or "»" are not page numbers.
fn page_number(link: ElementRef<'_>) -> Option<u32> {
    let text = link.text().collect::<String>();
    match text.trim().parse::<u32>() {
        Ok(page) if page > 0 => Some(page),
        _ => {
            debug!(text = %text.trim(), "ignoring non-numeric page link");
            None
        }
    }
}
