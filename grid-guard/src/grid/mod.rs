//! Collaborators the engine talks to: the grid's data, the UI that displays
//! results, and the grid's column schema.
//!
//! The engine never owns the data. A [`DataAccessor`] is read whenever a
//! cell is evaluated and may be mutated by the embedding application at any
//! time, including while a cross-row scan is in progress. Visibility of the
//! freshest value is at-least-once: an edit that lands mid-scan may or may
//! not be seen by that scan, but it always schedules its own evaluation.

pub mod in_memory;

pub use in_memory::{CollectingSink, InMemoryGrid, SinkReport};

use crate::core::{CellValue, ValidationContext, ValidationResult};
use crate::error::{GridError, Result};
use async_trait::async_trait;

/// Read access to the grid being validated.
///
/// Only [`cell_value`](Self::cell_value), [`column_names`](Self::column_names)
/// and [`row_count`](Self::row_count) are required. Implementations backed
/// by a single in-memory structure should override
/// [`row_context`](Self::row_context) and
/// [`all_row_contexts`](Self::all_row_contexts) to read under one lock.
#[async_trait]
pub trait DataAccessor: Send + Sync {
    /// Returns the value of one cell, `None` if the column is unknown.
    ///
    /// Fails with [`GridError::RowOutOfRange`] for a row past the end.
    async fn cell_value(&self, row: usize, column: &str) -> Result<Option<CellValue>>;

    /// Returns the grid's column names in display order.
    fn column_names(&self) -> Vec<String>;

    /// Returns the current number of rows.
    fn row_count(&self) -> usize;

    /// Returns a context holding every column of `row`.
    async fn row_context(&self, row: usize) -> Result<ValidationContext> {
        let row_count = self.row_count();
        if row >= row_count {
            return Err(GridError::RowOutOfRange { row, row_count });
        }

        let mut ctx = ValidationContext::new(row);
        for column in self.column_names() {
            let value = self.cell_value(row, &column).await?.unwrap_or_default();
            ctx.set_value(column, value);
        }
        Ok(ctx)
    }

    /// Returns a context for every row, in row order.
    async fn all_row_contexts(&self) -> Result<Vec<ValidationContext>> {
        let row_count = self.row_count();
        let mut rows = Vec::with_capacity(row_count);
        for row in 0..row_count {
            rows.push(self.row_context(row).await?);
        }
        Ok(rows)
    }
}

/// Receives the merged result of every cell evaluation, typically to
/// decorate the cell in a UI.
pub trait NotificationSink: Send + Sync {
    fn report_cell_validation(&self, row: usize, column: &str, result: &ValidationResult);
}

/// Column existence checks used to verify a rule set against a grid.
pub trait ColumnMetadata {
    fn has_column(&self, column: &str) -> bool;
}

impl<S: AsRef<str>> ColumnMetadata for Vec<S> {
    fn has_column(&self, column: &str) -> bool {
        self.iter().any(|name| name.as_ref() == column)
    }
}

impl<S: AsRef<str>, const N: usize> ColumnMetadata for [S; N] {
    fn has_column(&self, column: &str) -> bool {
        self.iter().any(|name| name.as_ref() == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Accessor relying on the default `row_context`/`all_row_contexts`.
    struct MapAccessor {
        columns: Vec<String>,
        cells: HashMap<(usize, String), CellValue>,
        rows: usize,
    }

    #[async_trait]
    impl DataAccessor for MapAccessor {
        async fn cell_value(&self, row: usize, column: &str) -> Result<Option<CellValue>> {
            Ok(self.cells.get(&(row, column.to_string())).cloned())
        }

        fn column_names(&self) -> Vec<String> {
            self.columns.clone()
        }

        fn row_count(&self) -> usize {
            self.rows
        }
    }

    fn accessor() -> MapAccessor {
        let mut cells = HashMap::new();
        cells.insert((0, "Name".to_string()), CellValue::from("Ada"));
        cells.insert((1, "Age".to_string()), CellValue::from(36));
        MapAccessor {
            columns: vec!["Name".to_string(), "Age".to_string()],
            cells,
            rows: 2,
        }
    }

    #[tokio::test]
    async fn test_default_row_context_fills_missing_cells_with_null() {
        let ctx = accessor().row_context(0).await.unwrap();
        assert_eq!(ctx.columns().collect::<Vec<_>>(), vec!["Name", "Age"]);
        assert_eq!(ctx.get_value("Name"), Some(&CellValue::from("Ada")));
        assert_eq!(ctx.get_value("Age"), Some(&CellValue::Null));
    }

    #[tokio::test]
    async fn test_default_row_context_rejects_out_of_range_rows() {
        let err = accessor().row_context(5).await.unwrap_err();
        assert!(matches!(
            err,
            GridError::RowOutOfRange {
                row: 5,
                row_count: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_default_all_row_contexts() {
        let rows = accessor().all_row_contexts().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get_value("Age"), Some(&CellValue::Int(36)));
    }

    #[test]
    fn test_column_metadata_for_lists() {
        assert!(vec!["A", "B"].has_column("B"));
        assert!(!["A", "B"].has_column("C"));
    }
}
