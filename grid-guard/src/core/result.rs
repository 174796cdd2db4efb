//! Validation result types.
//!
//! [`ValidationResult`] is the immutable outcome of one validator call and,
//! after merging, of a whole cell. [`CellReport`] adds the per-rule detail of
//! a cell evaluation and [`GridReport`] collects the issues of an all-rows
//! run.

use super::Severity;
use serde::{Deserialize, Serialize};

/// Message used when a failure is constructed without one.
pub(crate) const DEFAULT_FAILURE_MESSAGE: &str = "Validation failed";

/// Separator used when several failure messages are merged into one.
pub const MESSAGE_SEPARATOR: &str = "; ";

/// The outcome of validating a value.
///
/// A failing result always carries a non-empty message.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::{Severity, ValidationResult};
///
/// let merged = ValidationResult::merge([
///     ValidationResult::success(),
///     ValidationResult::warning("Looks odd"),
///     ValidationResult::error("Is required"),
/// ]);
///
/// assert!(!merged.is_valid());
/// assert_eq!(merged.severity(), Severity::Error);
/// assert_eq!(merged.message(), "Looks odd; Is required");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    is_valid: bool,
    severity: Severity,
    message: String,
}

impl ValidationResult {
    /// A passing result.
    pub fn success() -> Self {
        Self {
            is_valid: true,
            severity: Severity::Info,
            message: String::new(),
        }
    }

    /// A failing result with the given severity.
    pub fn failure(severity: Severity, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        Self {
            is_valid: false,
            severity,
            message,
        }
    }

    /// A failing result with [`Severity::Error`].
    pub fn error(message: impl Into<String>) -> Self {
        Self::failure(Severity::Error, message)
    }

    /// A failing result with [`Severity::Warning`].
    pub fn warning(message: impl Into<String>) -> Self {
        Self::failure(Severity::Warning, message)
    }

    /// A failing result with [`Severity::Info`].
    pub fn info(message: impl Into<String>) -> Self {
        Self::failure(Severity::Info, message)
    }

    /// Returns a passing result when `condition` holds and a failure with
    /// the given severity and message otherwise.
    pub fn from_check(condition: bool, severity: Severity, message: impl Into<String>) -> Self {
        if condition {
            Self::success()
        } else {
            Self::failure(severity, message)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn is_failure(&self) -> bool {
        !self.is_valid
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true for a failure of [`Severity::Error`].
    pub fn is_error(&self) -> bool {
        !self.is_valid && self.severity == Severity::Error
    }

    /// Merges several results into one.
    ///
    /// Passing results are ignored. If nothing failed the merge passes;
    /// otherwise the messages of all failures are joined with `"; "` and the
    /// severity is the highest one observed.
    pub fn merge<I>(results: I) -> Self
    where
        I: IntoIterator<Item = ValidationResult>,
    {
        let mut severity: Option<Severity> = None;
        let mut messages = Vec::new();

        for result in results.into_iter().filter(ValidationResult::is_failure) {
            severity = Some(severity.map_or(result.severity, |s| s.max(result.severity)));
            messages.push(result.message);
        }

        match severity {
            Some(severity) => Self::failure(severity, messages.join(MESSAGE_SEPARATOR)),
            None => Self::success(),
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::success()
    }
}

/// What happened to a single rule during a cell evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    /// Every validator of the rule passed
    Passed,
    /// A validator returned a failing result
    Failed,
    /// The rule's guard was false; no validator ran
    Skipped,
    /// A validator panicked or returned an error; reported as an Error failure
    Faulted,
}

/// The outcome of one rule for one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_name: String,
    pub status: RuleStatus,
    pub result: ValidationResult,
}

impl RuleOutcome {
    pub(crate) fn skipped(rule_name: &str) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            status: RuleStatus::Skipped,
            result: ValidationResult::success(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_failure()
    }
}

/// The merged result of evaluating every applicable rule on one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellReport {
    pub row: usize,
    pub column: String,
    /// Merged outcome pushed to the notification sink
    pub result: ValidationResult,
    /// Per-rule outcomes in execution order
    pub outcomes: Vec<RuleOutcome>,
    /// True when `StopOnFirstError` ended the evaluation early
    pub halted: bool,
}

impl CellReport {
    pub(crate) fn new(
        row: usize,
        column: impl Into<String>,
        outcomes: Vec<RuleOutcome>,
        halted: bool,
    ) -> Self {
        let result = ValidationResult::merge(outcomes.iter().map(|o| o.result.clone()));
        Self {
            row,
            column: column.into(),
            result,
            outcomes,
            halted,
        }
    }

    /// Returns true if no applicable rule failed.
    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }

    /// Returns the failure messages in execution order.
    pub fn messages(&self) -> Vec<String> {
        self.failures()
            .map(|outcome| outcome.result.message().to_string())
            .collect()
    }

    /// Iterates over the outcomes of failing rules.
    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }

    /// Number of rules whose validators ran.
    pub fn rules_evaluated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status != RuleStatus::Skipped)
            .count()
    }

    /// Number of rules whose guard was false.
    pub fn rules_skipped(&self) -> usize {
        self.outcomes.len() - self.rules_evaluated()
    }
}

/// A failing rule on a specific cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellIssue {
    pub row: usize,
    pub column: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
}

/// Counters collected during an all-rows run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMetrics {
    pub rows: usize,
    pub cells_evaluated: usize,
    pub invalid_cells: usize,
    pub rules_evaluated: usize,
    pub rules_skipped: usize,
    pub rules_failed: usize,
    pub faults: usize,
    pub execution_time_ms: u64,
}

impl GridMetrics {
    /// Percentage of evaluated cells without any failure (0.0 to 100.0).
    pub fn valid_cell_rate(&self) -> f64 {
        if self.cells_evaluated == 0 {
            100.0
        } else {
            let valid = self.cells_evaluated - self.invalid_cells;
            (valid as f64 / self.cells_evaluated as f64) * 100.0
        }
    }
}

/// The issues found by validating every row of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridReport {
    pub rule_set_name: String,
    /// Timestamp when the run started (RFC 3339)
    pub timestamp: String,
    pub metrics: GridMetrics,
    pub issues: Vec<CellIssue>,
}

impl GridReport {
    pub fn new(rule_set_name: impl Into<String>) -> Self {
        Self {
            rule_set_name: rule_set_name.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            metrics: GridMetrics::default(),
            issues: Vec::new(),
        }
    }

    /// Folds a cell evaluation into the report.
    pub fn add_cell(&mut self, cell: &CellReport) {
        self.metrics.cells_evaluated += 1;
        self.metrics.rules_evaluated += cell.rules_evaluated();
        self.metrics.rules_skipped += cell.rules_skipped();
        if !cell.is_valid() {
            self.metrics.invalid_cells += 1;
        }

        for outcome in cell.failures() {
            self.metrics.rules_failed += 1;
            if outcome.status == RuleStatus::Faulted {
                self.metrics.faults += 1;
            }
            self.issues.push(CellIssue {
                row: cell.row,
                column: cell.column.clone(),
                rule_name: outcome.rule_name.clone(),
                severity: outcome.result.severity(),
                message: outcome.result.message().to_string(),
            });
        }
    }

    /// The dataset is valid when no cell carries an Error-severity failure.
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    /// Gets all issues of a specific severity.
    pub fn issues_by_severity(&self, severity: Severity) -> Vec<&CellIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .collect()
    }

    /// Gets the issues reported for one row.
    pub fn issues_for_row(&self, row: usize) -> Vec<&CellIssue> {
        self.issues.iter().filter(|issue| issue.row == row).collect()
    }
}
