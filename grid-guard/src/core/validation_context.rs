//! Per-row views handed to rules during evaluation.
//!
//! A [`ValidationContext`] is a read-only snapshot of one row: its index, the
//! values of its columns in grid order, and optionally the column currently
//! being validated together with its pending (just edited) value. Contexts
//! are built fresh for every evaluation and dropped afterwards.
//!
//! A [`RowSet`] is the dataset-wide snapshot given to cross-row validators.
//! It lazily builds per-column value indexes so that checks such as
//! uniqueness do not rescan every row for every cell.

use super::CellValue;
use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

/// Read-only view of a single row during rule evaluation.
///
/// Column names are unique within a context; setting a column twice
/// replaces the earlier value but keeps its position.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::{CellValue, ValidationContext};
///
/// let ctx = ValidationContext::new(3)
///     .with_value("Name", "Ada")
///     .with_value("Email", "")
///     .with_pending_value("Age", 36);
///
/// assert_eq!(ctx.row_index(), 3);
/// assert!(ctx.has_value("Name"));
/// assert!(!ctx.has_value("Email"));
/// assert_eq!(ctx.current_column(), Some("Age"));
/// assert_eq!(ctx.current_value(), Some(&CellValue::Int(36)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    row_index: usize,
    values: Vec<(String, CellValue)>,
    current_column: Option<String>,
    pending_value: Option<CellValue>,
}

impl ValidationContext {
    /// Creates an empty context for the given row.
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            values: Vec::new(),
            current_column: None,
            pending_value: None,
        }
    }

    /// Creates a context from `(column, value)` pairs in grid order.
    pub fn from_values<I, K, V>(row_index: usize, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CellValue>,
    {
        let mut ctx = Self::new(row_index);
        for (column, value) in values {
            ctx.set_value(column, value);
        }
        ctx
    }

    /// Sets a column value, returning the updated context.
    pub fn with_value(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.set_value(column, value);
        self
    }

    /// Sets a column value in place.
    pub fn set_value(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((column, value)),
        }
    }

    /// Marks `column` as the column under validation and records its pending
    /// value. The row's stored value for that column is replaced as well, so
    /// [`get_value`](Self::get_value) and
    /// [`current_value`](Self::current_value) agree.
    pub fn with_pending_value(
        mut self,
        column: impl Into<String>,
        value: impl Into<CellValue>,
    ) -> Self {
        let column = column.into();
        let value = value.into();
        self.set_value(column.clone(), value.clone());
        self.current_column = Some(column);
        self.pending_value = Some(value);
        self
    }

    /// Marks an existing column as the column under validation.
    ///
    /// Fails with [`GridError::ColumnNotFound`] if the row does not carry it.
    pub fn focus(mut self, column: &str) -> Result<Self> {
        if self.get_value(column).is_none() {
            return Err(GridError::ColumnNotFound {
                column: column.to_string(),
                row: self.row_index,
            });
        }
        self.current_column = Some(column.to_string());
        self.pending_value = None;
        Ok(self)
    }

    /// Returns the index of the row this context describes.
    pub fn row_index(&self) -> usize {
        self.row_index
    }

    /// Returns the value of a column, if the row carries it.
    pub fn get_value(&self, column: &str) -> Option<&CellValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns the value of a column rendered as text; missing columns and
    /// nulls yield the empty string.
    pub fn get_string_value(&self, column: &str) -> String {
        self.get_value(column)
            .map(CellValue::as_text)
            .unwrap_or_default()
    }

    /// Returns true if the column exists and is not blank.
    pub fn has_value(&self, column: &str) -> bool {
        self.get_value(column).is_some_and(|value| !value.is_blank())
    }

    /// Returns the column being validated, if any.
    pub fn current_column(&self) -> Option<&str> {
        self.current_column.as_deref()
    }

    /// Returns the value being validated: the pending value when one was
    /// supplied, otherwise the stored value of the current column.
    pub fn current_value(&self) -> Option<&CellValue> {
        self.pending_value.as_ref().or_else(|| {
            self.current_column
                .as_deref()
                .and_then(|column| self.get_value(column))
        })
    }

    /// Iterates over the column names in grid order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(column, value)` pairs in grid order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Rows of one column grouped by their (trimmed) text value.
///
/// Blank cells are not indexed.
#[derive(Debug, Default)]
pub struct ColumnIndex {
    by_value: HashMap<String, Vec<usize>>,
}

impl ColumnIndex {
    fn build(rows: &[ValidationContext], column: &str) -> Self {
        let mut by_value: HashMap<String, Vec<usize>> = HashMap::new();
        for row in rows {
            if let Some(value) = row.get_value(column).filter(|value| !value.is_blank()) {
                by_value
                    .entry(value.as_text().trim().to_string())
                    .or_default()
                    .push(row.row_index());
            }
        }
        Self { by_value }
    }

    /// Returns the row indices whose value equals `value` after trimming.
    pub fn rows_with(&self, value: &str) -> &[usize] {
        self.by_value
            .get(value.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the number of distinct non-blank values.
    pub fn distinct_values(&self) -> usize {
        self.by_value.len()
    }
}

/// Snapshot of every row in the dataset, shared by cross-row validators.
///
/// Cloning is cheap; clones share the rows and the lazily built indexes.
/// The snapshot is taken once per evaluation (or once per all-rows run), so
/// an edit landing mid-scan is seen by the next evaluation rather than this
/// one.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    inner: Arc<RowSetInner>,
}

#[derive(Debug, Default)]
struct RowSetInner {
    rows: Vec<ValidationContext>,
    indexes: Mutex<HashMap<String, Arc<ColumnIndex>>>,
}

impl RowSet {
    /// Creates a snapshot from row contexts.
    pub fn new(rows: Vec<ValidationContext>) -> Self {
        Self {
            inner: Arc::new(RowSetInner {
                rows,
                indexes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the row with the given row index.
    pub fn row(&self, row_index: usize) -> Option<&ValidationContext> {
        let rows = &self.inner.rows;
        match rows.get(row_index) {
            Some(row) if row.row_index() == row_index => Some(row),
            _ => rows.iter().find(|row| row.row_index() == row_index),
        }
    }

    /// Iterates over every row except `row_index`.
    pub fn others(&self, row_index: usize) -> impl Iterator<Item = &ValidationContext> {
        self.inner
            .rows
            .iter()
            .filter(move |row| row.row_index() != row_index)
    }

    /// Returns the value index for a column, building it on first use.
    pub fn index(&self, column: &str) -> Arc<ColumnIndex> {
        let mut indexes = self
            .inner
            .indexes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            indexes
                .entry(column.to_string())
                .or_insert_with(|| Arc::new(ColumnIndex::build(&self.inner.rows, column))),
        )
    }
}

impl Deref for RowSet {
    type Target = [ValidationContext];

    fn deref(&self) -> &Self::Target {
        &self.inner.rows
    }
}

impl From<Vec<ValidationContext>> for RowSet {
    fn from(rows: Vec<ValidationContext>) -> Self {
        Self::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> RowSet {
        RowSet::new(vec![
            ValidationContext::new(0).with_value("Email", "a@b.com"),
            ValidationContext::new(1).with_value("Email", "c@d.com"),
            ValidationContext::new(2).with_value("Email", " a@b.com "),
            ValidationContext::new(3).with_value("Email", ""),
        ])
    }

    #[test]
    fn test_column_names_are_unique() {
        let ctx = ValidationContext::new(0)
            .with_value("A", 1)
            .with_value("B", 2)
            .with_value("A", 3);

        assert_eq!(ctx.columns().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(ctx.get_value("A"), Some(&CellValue::Int(3)));
    }

    #[test]
    fn test_string_and_presence_accessors() {
        let ctx = ValidationContext::from_values(
            5,
            vec![("Name", CellValue::from("Ada")), ("Note", CellValue::Null)],
        );

        assert_eq!(ctx.get_string_value("Name"), "Ada");
        assert_eq!(ctx.get_string_value("Note"), "");
        assert_eq!(ctx.get_string_value("Missing"), "");
        assert!(ctx.has_value("Name"));
        assert!(!ctx.has_value("Note"));
        assert!(!ctx.has_value("Missing"));
    }

    #[test]
    fn test_pending_value_overrides_stored_value() {
        let ctx = ValidationContext::new(0)
            .with_value("Age", 30)
            .with_pending_value("Age", 31);

        assert_eq!(ctx.current_column(), Some("Age"));
        assert_eq!(ctx.current_value(), Some(&CellValue::Int(31)));
        assert_eq!(ctx.get_value("Age"), Some(&CellValue::Int(31)));
    }

    #[test]
    fn test_focus_requires_existing_column() {
        let ctx = ValidationContext::new(2).with_value("Age", 30);

        let focused = ctx.clone().focus("Age").unwrap();
        assert_eq!(focused.current_value(), Some(&CellValue::Int(30)));

        let err = ctx.focus("Email").unwrap_err();
        assert!(matches!(err, GridError::ColumnNotFound { row: 2, .. }));
    }

    #[test]
    fn test_row_set_lookup_and_others() {
        let rows = people();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows.row(2).map(|r| r.row_index()), Some(2));
        assert_eq!(rows.others(1).count(), 3);
        assert!(rows.others(1).all(|r| r.row_index() != 1));
    }

    #[test]
    fn test_column_index_groups_trimmed_values() {
        let rows = people();
        let index = rows.index("Email");

        assert_eq!(index.rows_with("a@b.com"), &[0, 2]);
        assert_eq!(index.rows_with("c@d.com"), &[1]);
        assert!(index.rows_with("").is_empty());
        assert_eq!(index.distinct_values(), 2);
    }

    #[test]
    fn test_column_index_is_shared_between_clones() {
        let rows = people();
        let first = rows.index("Email");
        let second = rows.clone().index("Email");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
