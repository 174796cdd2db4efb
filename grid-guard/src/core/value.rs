//! Dynamically typed cell values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text formats tried, in order, when a date-time is parsed from text.
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Text formats tried, in order, when a plain date is parsed from text.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// The value held by a single grid cell.
///
/// Grids are loosely typed: the same column may hold text for one row and a
/// number for another, so rules read values through the coercions on this
/// type rather than matching on the variant directly.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::CellValue;
///
/// assert_eq!(CellValue::from("42").as_f64(), Some(42.0));
/// assert!(CellValue::from("   ").is_blank());
/// assert!(CellValue::from("2024-03-01").as_date_time().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// No value
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Returns true if the cell holds no value at all.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Returns true for null cells and for text that is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the value as text. Null renders as the empty string.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(value) => value.to_string(),
            CellValue::Int(value) => value.to_string(),
            CellValue::Float(value) => value.to_string(),
            CellValue::Text(value) => value.clone(),
            CellValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    /// Interprets the value as a number, parsing text if needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(value) => Some(*value as f64),
            CellValue::Float(value) => Some(*value),
            CellValue::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Interprets the value as a date-time.
    ///
    /// Date-typed cells are used directly (dates become midnight); text is
    /// parsed with [`parse_date_time`].
    pub fn as_date_time(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(date) => Some(date.and_time(NaiveTime::MIN)),
            CellValue::DateTime(date_time) => Some(*date_time),
            CellValue::Text(text) => parse_date_time(text),
            _ => None,
        }
    }
}

/// Parses a date or date-time from text.
///
/// RFC 3339 timestamps are normalised to UTC. Returns `None` for blank or
/// unrecognised input.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}
