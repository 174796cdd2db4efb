//! Rule sets and their evaluation.

use super::{
    CellReport, GridReport, RowScope, RowSet, Rule, RuleSetBuilder, ThrottlingConfig, ValidationContext,
};
use crate::error::{GridError, Result};
use crate::grid::{ColumnMetadata, DataAccessor};
use crate::scheduler::ConcurrencyLimiter;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How far evaluation of a cell proceeds after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every applicable rule runs and all failures are merged.
    #[default]
    ProcessAll,
    /// Evaluation of a cell stops at the first Error-severity failure.
    StopOnFirstError,
}

/// A named, ordered collection of rules plus the policy used to run them.
///
/// Cloning a rule set shares the (immutable) rules and copies the execution
/// mode and throttling configuration.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::{Rule, RuleSet};
/// use grid_guard::grid::InMemoryGrid;
///
/// # async fn example() -> grid_guard::prelude::Result<()> {
/// let mut rules = RuleSet::new("people");
/// rules.add_rule(
///     Rule::builder("name_required")
///         .for_column("Name")
///         .then_required()
///         .build()?,
/// )?;
///
/// let grid = InMemoryGrid::new(["Name"]).with_row([("Name", "")]);
/// let messages = rules.validate_cell(&grid, 0, "Name").await?;
/// assert_eq!(messages, vec!["Name is required".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    rules: Vec<Arc<Rule>>,
    execution_mode: ExecutionMode,
    throttling: ThrottlingConfig,
}

impl RuleSet {
    /// Creates an empty rule set with default execution mode and throttling.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            execution_mode: ExecutionMode::default(),
            throttling: ThrottlingConfig::default(),
        }
    }

    /// Creates a new builder for a rule set with the given name.
    pub fn builder(name: impl Into<String>) -> RuleSetBuilder {
        RuleSetBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the rules in insertion order.
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Looks up a rule by name.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.name() == name)
            .map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.execution_mode = mode;
    }

    pub fn throttling(&self) -> &ThrottlingConfig {
        &self.throttling
    }

    /// Replaces the throttling configuration after validating it.
    pub fn set_throttling(&mut self, throttling: ThrottlingConfig) -> Result<()> {
        throttling.validate()?;
        self.throttling = throttling;
        Ok(())
    }

    /// Appends a rule.
    ///
    /// Fails with [`GridError::DuplicateRule`] if a rule with the same name
    /// is already present.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        if self.rule(rule.name()).is_some() {
            return Err(GridError::DuplicateRule {
                rule_set: self.name.clone(),
                rule: rule.name().to_string(),
            });
        }
        debug!(
            rule_set.name = %self.name,
            rule.name = %rule.name(),
            rule.priority = rule.priority(),
            "Adding rule"
        );
        self.rules.push(Arc::new(rule));
        Ok(())
    }

    /// Returns the rules validating `column`, by ascending priority. Rules
    /// with equal priority keep their insertion order.
    pub fn rules_for_column(&self, column: &str) -> Vec<Arc<Rule>> {
        let mut rules: Vec<Arc<Rule>> = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(column))
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.priority());
        rules
    }

    /// Returns every column validated by at least one rule.
    pub fn target_columns(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.target_columns().iter().cloned())
            .collect()
    }

    /// Returns the columns whose validity may change when `column` is
    /// edited: the targets of every rule that reads `column`.
    pub fn dependent_columns(&self, column: &str) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter(|rule| rule.depends_on(column))
            .flat_map(|rule| rule.target_columns().iter().cloned())
            .filter(|target| target != column)
            .collect()
    }

    /// Returns the columns whose cells in other rows may change outcome when
    /// `column` is edited in one row.
    pub fn cross_row_targets(&self, column: &str) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter(|rule| rule.spans_rows_on(column))
            .flat_map(|rule| rule.target_columns().iter().cloned())
            .collect()
    }

    /// Returns the rows other than `row` whose `target` cell may change
    /// outcome after `edited` changed in `row`, according to the rules'
    /// [`RowScope`]s and the snapshot `rows`.
    pub fn cross_row_peers(
        &self,
        row: usize,
        edited: &str,
        target: &str,
        rows: &RowSet,
    ) -> BTreeSet<usize> {
        let mut peers = BTreeSet::new();
        let rules = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(target) && rule.spans_rows_on(edited));

        for rule in rules {
            for scope in rule.row_scopes() {
                match scope {
                    RowScope::SameValue(column) if column == edited => {
                        let value = rows
                            .row(row)
                            .and_then(|ctx| ctx.get_value(column))
                            .filter(|value| !value.is_blank());
                        if let Some(value) = value {
                            let index = rows.index(column);
                            peers.extend(index.rows_with(&value.as_text()).iter().copied());
                        }
                    }
                    RowScope::SameValue(_) => {}
                    RowScope::AllRows => {
                        peers.extend(rows.iter().map(ValidationContext::row_index));
                    }
                }
            }
        }

        peers.remove(&row);
        peers
    }

    /// Checks that every target and dependency column exists in the grid.
    pub fn verify_columns(&self, metadata: &dyn ColumnMetadata) -> Result<()> {
        for rule in &self.rules {
            let columns = rule
                .target_columns()
                .iter()
                .chain(rule.dependency_columns());
            for column in columns {
                if !metadata.has_column(column) {
                    return Err(GridError::UnknownColumn {
                        rule: rule.name().to_string(),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Evaluates every rule applicable to one cell, reading the row (and,
    /// for cross-row rules, the whole dataset) from `accessor`.
    ///
    /// Returns [`GridError::Cancelled`] if `cancel` fires while an async
    /// validator is pending.
    pub async fn evaluate_cell(
        &self,
        accessor: &dyn DataAccessor,
        row: usize,
        column: &str,
        cancel: &CancellationToken,
    ) -> Result<CellReport> {
        let (report, _) = self
            .evaluate_cell_with_rows(accessor, row, column, cancel)
            .await?;
        Ok(report)
    }

    /// Like [`evaluate_cell`](Self::evaluate_cell), also returning the
    /// dataset snapshot the cross-row rules saw (empty if none ran).
    #[instrument(skip(self, accessor, cancel), fields(rule_set.name = %self.name))]
    pub(crate) async fn evaluate_cell_with_rows(
        &self,
        accessor: &dyn DataAccessor,
        row: usize,
        column: &str,
        cancel: &CancellationToken,
    ) -> Result<(CellReport, RowSet)> {
        let rules = self.rules_for_column(column);
        if rules.is_empty() {
            return Ok((CellReport::new(row, column, Vec::new(), false), RowSet::default()));
        }

        let ctx = accessor.row_context(row).await?.focus(column)?;
        let rows = if rules.iter().any(|rule| rule.needs_rows()) {
            RowSet::new(accessor.all_row_contexts().await?)
        } else {
            RowSet::default()
        };

        let report = self.run_rules(&rules, &ctx, &rows, cancel).await?;
        Ok((report, rows))
    }

    /// Evaluates the rules applicable to the context's current column
    /// against an already captured row and dataset snapshot.
    pub async fn evaluate_context(
        &self,
        ctx: &ValidationContext,
        rows: &RowSet,
        cancel: &CancellationToken,
    ) -> Result<CellReport> {
        let column = ctx
            .current_column()
            .ok_or_else(|| GridError::configuration("context has no current column"))?;
        let rules = self.rules_for_column(column);
        self.run_rules(&rules, ctx, rows, cancel).await
    }

    /// Validates one cell and returns its failure messages, empty if valid.
    pub async fn validate_cell(
        &self,
        accessor: &dyn DataAccessor,
        row: usize,
        column: &str,
    ) -> Result<Vec<String>> {
        let report = self
            .evaluate_cell(accessor, row, column, &CancellationToken::new())
            .await?;
        Ok(report.messages())
    }

    /// Validates every target cell of every row. Returns false if any cell
    /// has an Error-severity failure.
    pub async fn validate_all_rows(&self, accessor: &dyn DataAccessor) -> Result<bool> {
        Ok(self.validate_all_rows_report(accessor).await?.is_valid())
    }

    /// Validates every target cell of every row and collects the issues.
    pub async fn validate_all_rows_report(
        &self,
        accessor: &dyn DataAccessor,
    ) -> Result<GridReport> {
        let start_time = Instant::now();
        let cells = self
            .evaluate_all_rows(accessor, None, &CancellationToken::new())
            .await?;
        Ok(self.summarize(accessor.row_count(), &cells, start_time))
    }

    /// Evaluates every target cell of every row against one snapshot of the
    /// dataset, in row then column order.
    ///
    /// With batching enabled, rows are split into batches of
    /// `batch_size` that run concurrently, at most
    /// `max_concurrent_validations` at a time (through `limiter` when one
    /// is given).
    #[instrument(skip(self, accessor, limiter, cancel), fields(rule_set.name = %self.name))]
    pub(crate) async fn evaluate_all_rows(
        &self,
        accessor: &dyn DataAccessor,
        limiter: Option<&ConcurrencyLimiter>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CellReport>> {
        let available = accessor.column_names();
        let columns: Vec<String> = self
            .target_columns()
            .into_iter()
            .filter(|column| {
                let known = available.contains(column);
                if !known {
                    warn!(
                        rule_set.name = %self.name,
                        cell.column = %column,
                        "Skipping column the grid does not expose"
                    );
                }
                known
            })
            .collect();

        let rows = RowSet::new(accessor.all_row_contexts().await?);
        info!(
            rule_set.name = %self.name,
            rows = rows.len(),
            columns = columns.len(),
            batched = self.throttling.enable_batch && self.throttling.enable_async,
            "Validating all rows"
        );

        if !(self.throttling.enable_batch && self.throttling.enable_async) {
            return self.evaluate_batch(&rows, &rows, &columns, cancel).await;
        }

        let batch_size = self.throttling.batch_size.max(1);
        let batches: Vec<&[ValidationContext]> = rows.chunks(batch_size).collect();
        let mut results: Vec<Vec<CellReport>> = stream::iter(batches.into_iter().map(|batch| {
            let rows = &rows;
            let columns = &columns;
            async move {
                let _permit = match limiter {
                    Some(limiter) => Some(limiter.acquire().await?),
                    None => None,
                };
                self.evaluate_batch(batch, rows, columns, cancel).await
            }
        }))
        .buffer_unordered(self.throttling.max_concurrent_validations.max(1))
        .try_collect()
        .await?;

        results.sort_by_key(|batch| batch.first().map(|cell| cell.row));
        Ok(results.into_iter().flatten().collect())
    }

    async fn evaluate_batch(
        &self,
        batch: &[ValidationContext],
        rows: &RowSet,
        columns: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<CellReport>> {
        let mut reports = Vec::with_capacity(batch.len() * columns.len());
        for row in batch {
            for column in columns {
                let ctx = row.clone().focus(column)?;
                let rules = self.rules_for_column(column);
                reports.push(self.run_rules(&rules, &ctx, rows, cancel).await?);
            }
        }
        Ok(reports)
    }

    async fn run_rules(
        &self,
        rules: &[Arc<Rule>],
        ctx: &ValidationContext,
        rows: &RowSet,
        cancel: &CancellationToken,
    ) -> Result<CellReport> {
        let column = ctx.current_column().unwrap_or_default();
        let mut outcomes = Vec::with_capacity(rules.len());
        let mut halted = false;

        for (position, rule) in rules.iter().enumerate() {
            let outcome = rule.evaluate(ctx, rows, cancel).await?;
            let stop = self.execution_mode == ExecutionMode::StopOnFirstError
                && outcome.result.is_error();
            outcomes.push(outcome);

            if stop {
                halted = position + 1 < rules.len();
                if halted {
                    debug!(
                        rule_set.name = %self.name,
                        rule.name = %rule.name(),
                        cell.row = ctx.row_index(),
                        cell.column = %column,
                        rules.remaining = rules.len() - position - 1,
                        "Stopping at first error"
                    );
                }
                break;
            }
        }

        Ok(CellReport::new(ctx.row_index(), column, outcomes, halted))
    }

    pub(crate) fn summarize(
        &self,
        row_count: usize,
        cells: &[CellReport],
        start_time: Instant,
    ) -> GridReport {
        let mut report = GridReport::new(&self.name);
        report.metrics.rows = row_count;
        for cell in cells {
            report.add_cell(cell);
        }
        report.metrics.execution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            rule_set.name = %self.name,
            metrics.cells = report.metrics.cells_evaluated,
            metrics.invalid_cells = report.metrics.invalid_cells,
            metrics.faults = report.metrics.faults,
            metrics.execution_time_ms = report.metrics.execution_time_ms,
            "All-rows validation completed"
        );
        report
    }
}
