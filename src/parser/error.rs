//! Error types for page parsing.

use thiserror::Error;

/// Structural assumptions about a listing page that did not hold.
///
/// Any of these aborts the collection being harvested; the parser never
/// guesses between candidates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The page has no title element.
    #[error("page has no title element matching '{selector}'")]
    MissingTitle {
        /// Selector that matched nothing.
        selector: String,
    },

    /// No data table was found.
    #[error("page contains no data table")]
    NoTable,

    /// More than one candidate data table was found.
    #[error(
        "page contains {count} tables, expected exactly one\n  Suggestion: Supply a table extractor for this page layout"
    )]
    AmbiguousTables {
        /// Number of candidate tables.
        count: usize,
    },

    /// The pagination block is absent.
    #[error("page has no navigation block matching '{selector}'")]
    MissingNavigation {
        /// Selector that matched nothing.
        selector: String,
    },

    /// The pagination block has no advertised-pages list.
    #[error("navigation block has no page list matching '{selector}'")]
    MissingPageList {
        /// Selector that matched nothing.
        selector: String,
    },

    /// A configured CSS selector does not compile.
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// The rejected selector text.
        selector: String,
        /// Compiler message.
        reason: String,
    },
}

impl ParseError {
    /// Creates an `InvalidSelector` error.
    #[must_use]
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}
