//! Core types of the rule engine.
//!
//! ## Overview
//!
//! - **[`Rule`]**: a named unit of validation logic targeting one or more
//!   columns, built with [`RuleBuilder`]
//! - **[`RuleSet`]**: an ordered collection of rules with an
//!   [`ExecutionMode`] and a [`ThrottlingConfig`], built with
//!   [`RuleSetBuilder`]
//! - **[`ValidationContext`]**: the per-row view handed to guards and
//!   validators; [`RowSet`] is the dataset view for cross-row validators
//! - **[`ValidationResult`]**: the outcome of a validator, merged per cell
//!   into a [`CellReport`] and per dataset into a [`GridReport`]
//!
//! ## Architecture
//!
//! ```text
//! RuleSet (ExecutionMode, ThrottlingConfig)
//!     ├── Rule "Email_required"   targets {Email}  priority 0
//!     │   └── Validator::Sync
//!     └── Rule "Email_unique"     targets {Email}  priority 0
//!         └── Validator::CrossRow
//! ```
//!
//! For one edited cell, the rules targeting its column run by ascending
//! priority (ties in insertion order). A rule's guard is checked first, then
//! its validators run in the order sync, async, cross-row, stopping at the
//! first failure.
//!
//! ## Example
//!
//! ```rust
//! use grid_guard::core::{ExecutionMode, Rule, RuleSet, Severity, ValidationResult};
//! use grid_guard::grid::InMemoryGrid;
//!
//! # async fn example() -> grid_guard::prelude::Result<()> {
//! let rules = RuleSet::builder("contacts")
//!     .add_required("Email")
//!     .add_unique_validation("Email")
//!     .add_rule(
//!         Rule::builder("company_domain")
//!             .for_column("Email")
//!             .priority(10)
//!             .then(|ctx| {
//!                 if ctx.get_string_value("Email").ends_with("@example.com") {
//!                     ValidationResult::success()
//!                 } else {
//!                     ValidationResult::warning("Email is not a company address")
//!                 }
//!             })
//!             .build()?,
//!     )
//!     .execution_mode(ExecutionMode::ProcessAll)
//!     .build()?;
//!
//! let grid = InMemoryGrid::new(["Email"])
//!     .with_row([("Email", "ada@example.com")])
//!     .with_row([("Email", "ada@example.com")]);
//!
//! let report = rules.validate_all_rows_report(&grid).await?;
//! assert_eq!(report.issues_by_severity(Severity::Error).len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod result;
pub mod rule;
pub mod rule_builder;
pub mod rule_set;
pub mod rule_set_builder;
pub mod severity;
pub mod throttling;
pub mod validation_context;
pub mod value;

pub use result::{
    CellIssue, CellReport, GridMetrics, GridReport, RuleOutcome, RuleStatus, ValidationResult,
    MESSAGE_SEPARATOR,
};
pub use rule::{
    AsyncValidatorFn, CrossRowValidatorFn, Guard, MessageTemplate, RowScope, Rule, SyncValidatorFn,
    Validator, ValidatorError, ValidatorKind, ValidatorOutput,
};
pub use rule_builder::RuleBuilder;
pub use rule_set::{ExecutionMode, RuleSet};
pub use rule_set_builder::RuleSetBuilder;
pub use severity::Severity;
pub use throttling::ThrottlingConfig;
pub use validation_context::{ColumnIndex, RowSet, ValidationContext};
pub use value::{parse_date_time, CellValue};
