//! Validation severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity of a validation outcome.
///
/// Severities are ordered `Error > Warning > Info`. The ordering drives both
/// aggregation (a cell's merged severity is the maximum of its failures) and
/// short-circuiting under [`ExecutionMode::StopOnFirstError`].
///
/// # Usage Guidelines
///
/// - **Error**: the value is wrong and must be corrected (missing required
///   field, duplicate key, malformed email)
/// - **Warning**: the value is suspicious and should be reviewed
/// - **Info**: an observation shown to the user without blocking anything
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::Severity;
///
/// assert!(Severity::Error > Severity::Warning);
/// assert!(Severity::Warning > Severity::Info);
/// assert_eq!(Severity::default(), Severity::Error);
/// ```
///
/// [`ExecutionMode::StopOnFirstError`]: crate::core::ExecutionMode::StopOnFirstError
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational observation
    Info = 0,
    /// Potential problem that should be reviewed
    Warning = 1,
    /// The value is invalid
    #[default]
    Error = 2,
}

impl Severity {
    /// Returns the string representation of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Checks if this severity is at least as severe as another one.
    pub fn is_at_least(&self, other: Severity) -> bool {
        *self >= other
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
