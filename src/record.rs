//! Open-schema result rows.
//!
//! Column sets differ between sources and even between years of the same
//! source, so a row is an ordered map of column name to JSON value rather than
//! a fixed struct.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Column name to cell value, in table column order.
pub type Fields = Map<String, Value>;

/// One harvested row together with the page it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based page number the row was read from.
    pub page: u32,
    /// Cell values keyed by column name.
    pub fields: Fields,
}

impl Record {
    /// Creates a record for `page`.
    #[must_use]
    pub fn new(page: u32, fields: Fields) -> Self {
        Self { page, fields }
    }

    /// Returns the value of column `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Returns every column name seen across `records`, in first-seen order.
///
/// Used for reporting only; nothing enforces a common schema.
#[must_use]
pub fn field_union(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        for name in record.fields.keys() {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Converts cell text to a JSON value: empty is null, numerals become numbers.
#[must_use]
pub fn cell_value(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::Number(int.into());
    }
    if looks_like_decimal(text)
        && let Ok(float) = text.parse::<f64>()
        && let Some(number) = Number::from_f64(float)
    {
        return Value::Number(number);
    }
    Value::String(text.to_string())
}

// Rust's f64 parser accepts "inf", "NaN" and "1e5"; results tables only use
// plain decimals, so anything else stays text.
fn looks_like_decimal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let mut seen_dot = false;
    let mut seen_digit = false;
    for ch in digits.chars() {
        match ch {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit && seen_dot
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn test_cell_value_infers_types() {
        assert_eq!(cell_value(""), Value::Null);
        assert_eq!(cell_value("   "), Value::Null);
        assert_eq!(cell_value("42"), json!(42));
        assert_eq!(cell_value("-3"), json!(-3));
        assert_eq!(cell_value("12.5"), json!(12.5));
        assert_eq!(cell_value("1:02:33"), json!("1:02:33"));
        assert_eq!(cell_value("inf"), json!("inf"));
        assert_eq!(cell_value("1e5"), json!("1e5"));
        assert_eq!(cell_value(" Jane Doe "), json!("Jane Doe"));
    }

    #[test]
    fn test_field_union_preserves_first_seen_order() {
        let records = vec![
            Record::new(1, fields(json!({"Place": 1, "Name": "A"}))),
            Record::new(2, fields(json!({"Place": 2, "Sex": "F", "Name": "B"}))),
        ];
        assert_eq!(field_union(&records), vec!["Place", "Name", "Sex"]);
    }

    #[test]
    fn test_record_get() {
        let record = Record::new(1, fields(json!({"Sex": "M"})));
        assert_eq!(record.get("Sex"), Some(&json!("M")));
        assert!(record.get("Age").is_none());
    }
}
