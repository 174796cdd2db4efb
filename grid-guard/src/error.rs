//! Error types for the grid-guard rule engine.
//!
//! Configuration problems (an incomplete rule, a duplicate rule name, an
//! invalid throttling setting) and infrastructure problems (a failing data
//! accessor, a closed scheduler) are represented by [`GridError`].
//!
//! Data-driven validation failures are *not* errors: they are ordinary
//! [`ValidationResult`](crate::core::ValidationResult) values flowing through
//! the normal result channel.

use thiserror::Error;

/// The main error type for the grid-guard library.
#[derive(Error, Debug)]
pub enum GridError {
    /// A rule builder was finished without the pieces every rule needs.
    #[error("Incomplete rule '{rule}': {reason}")]
    IncompleteRule {
        /// Name of the rule being built (may be empty)
        rule: String,
        /// What is missing
        reason: String,
    },

    /// A rule with the same name already exists in the rule set.
    #[error("Rule set '{rule_set}' already contains a rule named '{rule}'")]
    DuplicateRule { rule_set: String, rule: String },

    /// A rule references a column the grid does not expose.
    #[error("Rule '{rule}' references unknown column '{column}'")]
    UnknownColumn { rule: String, column: String },

    /// A column was looked up in a row that does not carry it.
    #[error("Column '{column}' not found in row {row}")]
    ColumnNotFound { column: String, row: usize },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested row does not exist in the dataset.
    #[error("Row {row} is out of range (row count {row_count})")]
    RowOutOfRange { row: usize, row_count: usize },

    /// The data accessor failed to produce a value.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// The evaluation was superseded by a newer edit and abandoned.
    #[error("Validation was cancelled")]
    Cancelled,

    /// The scheduler's concurrency limiter has been shut down.
    #[error("Validation scheduler is closed")]
    SchedulerClosed,

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error while writing formatted output.
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// A type alias for `Result<T, GridError>`.
pub type Result<T> = std::result::Result<T, GridError>;

impl GridError {
    /// Creates an incomplete rule error.
    pub fn incomplete_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncompleteRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Creates a data access error.
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true if this error means the evaluation was abandoned rather
    /// than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GridError::Cancelled)
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_rule_display() {
        let err = GridError::incomplete_rule("age_range", "no validator attached");
        assert_eq!(
            err.to_string(),
            "Incomplete rule 'age_range': no validator attached"
        );
    }

    #[test]
    fn test_duplicate_rule_display() {
        let err = GridError::DuplicateRule {
            rule_set: "customers".to_string(),
            rule: "email_required".to_string(),
        };
        assert!(err.to_string().contains("email_required"));
        assert!(err.to_string().contains("customers"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(GridError::Cancelled.is_cancelled());
        assert!(!GridError::SchedulerClosed.is_cancelled());
    }

    #[test]
    fn test_from_serde_json() {
        let err: GridError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, GridError::Serialization(_)));
    }
}
