//! # grid-guard - Rule-Based Validation for Tabular Grids
//!
//! grid-guard validates the cells of an editable table while a user types.
//! Rules are declared with a fluent builder, evaluated per cell against the
//! row they live in (and, for cross-row checks such as uniqueness, against
//! the whole dataset), and their results are pushed to a notification sink
//! that drives the UI.
//!
//! ## Overview
//!
//! A grid application plugs three collaborators into the engine:
//!
//! - a [`DataAccessor`](grid::DataAccessor) that reads cell values
//! - a [`NotificationSink`](grid::NotificationSink) that displays results
//! - optionally [`ColumnMetadata`](grid::ColumnMetadata) to check rules
//!   against the grid's schema when they are built
//!
//! Edits are reported to a [`ValidationScheduler`](scheduler::ValidationScheduler),
//! which debounces bursts of keystrokes per cell, re-validates dependent
//! columns of the same row, and bounds how many evaluations run at once.
//!
//! ## Quick Start
//!
//! ```rust
//! use grid_guard::grid::{CollectingSink, InMemoryGrid};
//! use grid_guard::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> grid_guard::prelude::Result<()> {
//! let rules = RuleSet::builder("contacts")
//!     .add_required("Name")
//!     .add_email_validation("Email")
//!     .add_unique_validation("Email")
//!     .add_range_validation("Age", 0.0, 120.0)
//!     .rule(
//!         Rule::builder("minors_need_guardian")
//!             .for_column("Guardian")
//!             .depends_on("Age")
//!             .when(|ctx| ctx.get_value("Age").and_then(|v| v.as_f64()).is_some_and(|a| a < 18.0))
//!             .severity(Severity::Warning)
//!             .then_required(),
//!     )
//!     .throttling(ThrottlingConfig::default().with_debounce_ms(200))
//!     .build()?;
//!
//! let grid = Arc::new(
//!     InMemoryGrid::new(["Name", "Email", "Age", "Guardian"])
//!         .with_row([("Name", "Ada"), ("Email", "ada@example.com"), ("Age", "36")]),
//! );
//! let sink = Arc::new(CollectingSink::new());
//! let scheduler = ValidationScheduler::new(rules, grid.clone(), sink.clone())?;
//!
//! // The user types a new age; the Guardian rule reads Age, so it is
//! // re-validated as well.
//! grid.set_cell(0, "Age", "12")?;
//! scheduler.cell_edited(0, "Age").await?;
//! scheduler.wait_idle().await;
//!
//! let guardian = sink.latest(0, "Guardian").unwrap();
//! assert_eq!(guardian.severity(), Severity::Warning);
//! assert_eq!(guardian.message(), "Guardian is required");
//! # Ok(())
//! # }
//! ```
//!
//! ## Validating a Whole Dataset
//!
//! [`RuleSet::validate_all_rows_report`](core::RuleSet::validate_all_rows_report)
//! evaluates every target cell of every row and aggregates the issues into a
//! [`GridReport`](core::GridReport), which the [`formatters`] render as
//! JSON, console text or Markdown.
//!
//! ## Error Model
//!
//! A cell that fails validation is not an error: it is a
//! [`ValidationResult`](core::ValidationResult) with a severity and a
//! message. [`GridError`](error::GridError) is reserved for misconfigured
//! rules and failing infrastructure. A validator that returns an error or
//! panics is contained and reported as an Error-severity failure of its
//! rule.
//!
//! ## Architecture
//!
//! - **`core`**: rules, rule sets, builders, contexts and results
//! - **`validators`**: the built-in checks behind the builder shortcuts
//! - **`grid`**: collaborator traits plus an in-memory grid and sink
//! - **`scheduler`**: debouncing, coalescing and the concurrency limiter
//! - **`formatters`**: report rendering
//! - **`logging`**: `tracing` configuration helpers

pub mod core;
pub mod error;
pub mod formatters;
pub mod grid;
pub mod logging;
pub mod prelude;
pub mod scheduler;
pub mod validators;
