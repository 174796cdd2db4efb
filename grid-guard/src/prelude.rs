//! Prelude for commonly used types and traits in grid-guard.

pub use crate::core::{
    CellReport, CellValue, ExecutionMode, GridReport, Rule, RuleSet, Severity, ThrottlingConfig,
    ValidationContext, ValidationResult,
};
pub use crate::error::{GridError, Result};
pub use crate::formatters::{FormatterConfig, ResultFormatter};
pub use crate::grid::{DataAccessor, NotificationSink};
pub use crate::logging::LogConfig;
pub use crate::scheduler::ValidationScheduler;
