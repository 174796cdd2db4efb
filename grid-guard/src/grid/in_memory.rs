//! In-memory grid and sink implementations.

use super::{ColumnMetadata, DataAccessor, NotificationSink};
use crate::core::{CellValue, ValidationContext, ValidationResult};
use crate::error::{GridError, Result};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;

/// A grid stored as rows of values behind a lock.
///
/// Cells can be edited through a shared reference while evaluations read
/// the grid concurrently.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::CellValue;
/// use grid_guard::grid::InMemoryGrid;
///
/// let grid = InMemoryGrid::new(["Name", "Email"])
///     .with_row([("Name", "Ada"), ("Email", "ada@example.com")])
///     .with_row([("Name", "Grace")]);
///
/// grid.set_cell(1, "Email", "grace@example.com").unwrap();
/// assert_eq!(grid.get_cell(1, "Email"), Some(CellValue::from("grace@example.com")));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGrid {
    columns: Vec<String>,
    rows: RwLock<Vec<Vec<CellValue>>>,
}

impl InMemoryGrid {
    /// Creates an empty grid with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Appends a row, returning the grid.
    pub fn with_row<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        self.push_row(values);
        self
    }

    /// Appends a row and returns its index. Unknown columns are ignored and
    /// missing ones are null.
    pub fn push_row<I, K, V>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        let mut row = vec![CellValue::Null; self.columns.len()];
        for (column, value) in values {
            if let Some(position) = self.position(column.as_ref()) {
                row[position] = value.into();
            }
        }

        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.push(row);
        rows.len() - 1
    }

    /// Replaces the value of one cell.
    pub fn set_cell(&self, row: usize, column: &str, value: impl Into<CellValue>) -> Result<()> {
        let position = self.position(column).ok_or_else(|| GridError::ColumnNotFound {
            column: column.to_string(),
            row,
        })?;

        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row_count = rows.len();
        let cells = rows
            .get_mut(row)
            .ok_or(GridError::RowOutOfRange { row, row_count })?;
        cells[position] = value.into();
        Ok(())
    }

    /// Returns the value of one cell, `None` if either index is unknown.
    pub fn get_cell(&self, row: usize, column: &str) -> Option<CellValue> {
        let position = self.position(column)?;
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.get(row).map(|cells| cells[position].clone())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    fn context(&self, row: usize, cells: &[CellValue]) -> ValidationContext {
        ValidationContext::from_values(
            row,
            self.columns.iter().cloned().zip(cells.iter().cloned()),
        )
    }
}

#[async_trait]
impl DataAccessor for InMemoryGrid {
    async fn cell_value(&self, row: usize, column: &str) -> Result<Option<CellValue>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let cells = rows.get(row).ok_or(GridError::RowOutOfRange {
            row,
            row_count: rows.len(),
        })?;
        Ok(self.position(column).map(|position| cells[position].clone()))
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    async fn row_context(&self, row: usize) -> Result<ValidationContext> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let cells = rows.get(row).ok_or(GridError::RowOutOfRange {
            row,
            row_count: rows.len(),
        })?;
        Ok(self.context(row, cells))
    }

    async fn all_row_contexts(&self) -> Result<Vec<ValidationContext>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows
            .iter()
            .enumerate()
            .map(|(row, cells)| self.context(row, cells))
            .collect())
    }
}

impl ColumnMetadata for InMemoryGrid {
    fn has_column(&self, column: &str) -> bool {
        self.position(column).is_some()
    }
}

/// One result delivered to a [`CollectingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub row: usize,
    pub column: String,
    pub result: ValidationResult,
}

/// A sink that records every report it receives.
#[derive(Debug)]
pub struct CollectingSink {
    reports: Mutex<Vec<SinkReport>>,
    count: watch::Sender<usize>,
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectingSink {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            reports: Mutex::new(Vec::new()),
            count,
        }
    }

    /// Returns every report received so far, in arrival order.
    pub fn reports(&self) -> Vec<SinkReport> {
        self.lock().clone()
    }

    /// Returns the reports received for one cell, in arrival order.
    pub fn reports_for(&self, row: usize, column: &str) -> Vec<SinkReport> {
        self.lock()
            .iter()
            .filter(|report| report.row == row && report.column == column)
            .cloned()
            .collect()
    }

    /// Returns the most recent result for one cell.
    pub fn latest(&self, row: usize, column: &str) -> Option<ValidationResult> {
        self.lock()
            .iter()
            .rev()
            .find(|report| report.row == row && report.column == column)
            .map(|report| report.result.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of failing reports received.
    pub fn failure_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|report| report.result.is_failure())
            .count()
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.count.send_replace(0);
    }

    /// Waits until at least `count` reports have arrived.
    ///
    /// Returns false if `timeout` elapses first.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let mut receiver = self.count.subscribe();
        tokio::time::timeout(timeout, receiver.wait_for(|received| *received >= count))
            .await
            .is_ok_and(|waited| waited.is_ok())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SinkReport>> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSink for CollectingSink {
    fn report_cell_validation(&self, row: usize, column: &str, result: &ValidationResult) {
        let received = {
            let mut reports = self.lock();
            reports.push(SinkReport {
                row,
                column: column.to_string(),
                result: result.clone(),
            });
            reports.len()
        };
        self.count.send_replace(received);
    }
}
