//! Data table extraction strategies.
//!
//! The walker only needs "the rows of this page". Which table holds them is a
//! property of the page layout, so extraction sits behind [`TableExtractor`]
//! and alternate layouts can plug in their own strategy.

use std::collections::HashMap;
use std::fmt;

use scraper::{ElementRef, Html, Selector};

use super::ParseError;
use crate::record::{Fields, cell_value};

/// Upper bound honoured for a cell's `colspan` attribute.
const MAX_COLSPAN: usize = 1000;

/// Strategy that pulls the row set out of a parsed document.
pub trait TableExtractor: Send + Sync + fmt::Debug {
    /// Returns the rows of the page's single data table.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the data table cannot be identified
    /// unambiguously.
    fn extract_single_table(&self, document: &Html) -> Result<Vec<Fields>, ParseError>;
}

/// Extracts the only table matching a selector (`table` by default).
///
/// Zero or several matches is an error rather than a guess.
#[derive(Debug, Clone)]
pub struct SingleTableExtractor {
    table: Selector,
}

impl SingleTableExtractor {
    /// Creates an extractor that expects exactly one `<table>`.
    ///
    /// # Errors
    ///
    /// Never fails for the default selector; kept fallible for symmetry with
    /// [`SingleTableExtractor::with_selector`].
    pub fn new() -> Result<Self, ParseError> {
        Self::with_selector("table")
    }

    /// Creates an extractor that expects exactly one element matching
    /// `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidSelector`] if the selector does not compile.
    pub fn with_selector(selector: &str) -> Result<Self, ParseError> {
        Ok(Self {
            table: compile(selector)?,
        })
    }
}

impl TableExtractor for SingleTableExtractor {
    fn extract_single_table(&self, document: &Html) -> Result<Vec<Fields>, ParseError> {
        let tables: Vec<ElementRef<'_>> = document.select(&self.table).collect();
        match tables.as_slice() {
            [] => Err(ParseError::NoTable),
            [table] => Ok(table_rows(*table)),
            _ => Err(ParseError::AmbiguousTables {
                count: tables.len(),
            }),
        }
    }
}

pub(crate) fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::invalid_selector(selector, e))
}

/// A row of cell texts with a flag for header-only (`th`) rows.
struct RawRow {
    cells: Vec<String>,
    all_header_cells: bool,
    in_thead: bool,
}

/// Converts one table element into rows keyed by header name.
fn table_rows(table: ElementRef<'_>) -> Vec<Fields> {
    let mut raw_rows: Vec<RawRow> = Vec::new();
    collect_rows(table, false, &mut raw_rows);

    let header_index = raw_rows
        .iter()
        .position(|row| row.in_thead)
        .or_else(|| raw_rows.first().filter(|row| row.all_header_cells).map(|_| 0));

    let headers = header_index.map(|index| header_names(&raw_rows[index].cells));

    raw_rows
        .iter()
        .enumerate()
        .filter(|(index, row)| Some(*index) != header_index && !row.in_thead)
        .map(|(_, row)| row_fields(&row.cells, headers.as_deref()))
        .collect()
}

fn collect_rows(element: ElementRef<'_>, in_thead: bool, rows: &mut Vec<RawRow>) {
    for child in element.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "thead" => collect_rows(child, true, rows),
            "tbody" | "tfoot" => collect_rows(child, in_thead, rows),
            "tr" => {
                let mut cells = Vec::new();
                let mut all_header_cells = true;
                for cell in child.children().filter_map(ElementRef::wrap) {
                    let name = cell.value().name();
                    if name != "td" && name != "th" {
                        continue;
                    }
                    all_header_cells &= name == "th";
                    let text = cell_text(cell);
                    let span = cell
                        .value()
                        .attr("colspan")
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(1)
                        .clamp(1, MAX_COLSPAN);
                    cells.extend(std::iter::repeat_n(text, span));
                }
                if !cells.is_empty() {
                    rows.push(RawRow {
                        cells,
                        all_header_cells,
                        in_thead,
                    });
                }
            }
            _ => {}
        }
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Names header cells, filling blanks and disambiguating repeats.
fn header_names(cells: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let base = if text.is_empty() {
                format!("Unnamed: {index}")
            } else {
                text.clone()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

fn row_fields(cells: &[String], headers: Option<&[String]>) -> Fields {
    let mut fields = Fields::new();
    match headers {
        Some(headers) => {
            for (index, name) in headers.iter().enumerate() {
                let value = cells
                    .get(index)
                    .map_or(serde_json::Value::Null, |text| cell_value(text));
                fields.insert(name.clone(), value);
            }
            for (index, text) in cells.iter().enumerate().skip(headers.len()) {
                fields.insert(format!("Unnamed: {index}"), cell_value(text));
            }
        }
        None => {
            for (index, text) in cells.iter().enumerate() {
                fields.insert(index.to_string(), cell_value(text));
            }
        }
    }
    fields
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn extract(html: &str) -> Result<Vec<Fields>, ParseError> {
        let document = Html::parse_document(html);
        SingleTableExtractor::new()
            .unwrap()
            .extract_single_table(&document)
    }

    #[test]
    fn test_extracts_thead_headers_and_typed_cells() {
        let rows = extract(
            r"<table>
                <thead><tr><th>Place</th><th>Name</th><th>Sex</th><th>Time</th></tr></thead>
                <tbody>
                  <tr><td>1</td><td>Jane  Doe</td><td>F</td><td>31:02</td></tr>
                  <tr><td>2</td><td>John Roe</td><td>M</td><td>31:40</td></tr>
                </tbody>
              </table>",
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Place"], json!(1));
        assert_eq!(rows[0]["Name"], json!("Jane Doe"));
        assert_eq!(rows[1]["Sex"], json!("M"));
        let columns: Vec<&String> = rows[0].keys().collect();
        assert_eq!(columns, ["Place", "Name", "Sex", "Time"]);
    }

    #[test]
    fn test_first_row_of_th_cells_is_header_without_thead() {
        let rows = extract(
            "<table><tr><th>Bib</th><th>Age</th></tr><tr><td>101</td><td>34</td></tr></table>",
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Bib"], json!(101));
        assert_eq!(rows[0]["Age"], json!(34));
    }

    #[test]
    fn test_headerless_table_uses_index_names() {
        let rows = extract("<table><tr><td>a</td><td>b</td></tr></table>").unwrap();
        assert_eq!(rows[0]["0"], json!("a"));
        assert_eq!(rows[0]["1"], json!("b"));
    }

    #[test]
    fn test_blank_and_duplicate_headers_are_named() {
        let rows = extract(
            "<table><thead><tr><th></th><th>Time</th><th>Time</th></tr></thead>
             <tr><td>x</td><td>1:00</td><td>1:01</td></tr></table>",
        )
        .unwrap();

        assert_eq!(rows[0]["Unnamed: 0"], json!("x"));
        assert_eq!(rows[0]["Time"], json!("1:00"));
        assert_eq!(rows[0]["Time.1"], json!("1:01"));
    }

    #[test]
    fn test_short_rows_pad_with_null_and_long_rows_keep_extras() {
        let rows = extract(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead>
             <tr><td>1</td></tr>
             <tr><td>1</td><td>2</td><td>3</td></tr></table>",
        )
        .unwrap();

        assert_eq!(rows[0]["B"], serde_json::Value::Null);
        assert_eq!(rows[1]["Unnamed: 2"], json!(3));
    }

    #[test]
    fn test_colspan_repeats_cell_value() {
        let rows = extract(
            "<table><thead><tr><th>A</th><th>B</th><th>C</th></tr></thead>
             <tr><td colspan=\"2\">DNF</td><td>9</td></tr></table>",
        )
        .unwrap();

        assert_eq!(rows[0]["A"], json!("DNF"));
        assert_eq!(rows[0]["B"], json!("DNF"));
        assert_eq!(rows[0]["C"], json!(9));
    }

    #[test]
    fn test_no_table_is_error() {
        assert_eq!(extract("<p>nothing</p>"), Err(ParseError::NoTable));
    }

    #[test]
    fn test_two_tables_are_ambiguous() {
        let result = extract("<table><tr><td>1</td></tr></table><table><tr><td>2</td></tr></table>");
        assert_eq!(result, Err(ParseError::AmbiguousTables { count: 2 }));
    }

    #[test]
    fn test_custom_selector_narrows_candidates() {
        let document = Html::parse_document(
            "<table class=\"nav\"><tr><td>menu</td></tr></table>
             <table class=\"results\"><tr><th>Name</th></tr><tr><td>Ann</td></tr></table>",
        );
        let extractor = SingleTableExtractor::with_selector("table.results").unwrap();
        let rows = extractor.extract_single_table(&document).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Name"], json!("Ann"));
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let result = SingleTableExtractor::with_selector("table[");
        assert!(matches!(result, Err(ParseError::InvalidSelector { .. })));
    }
}
