//! Built-in validator bodies.
//!
//! Each function here is a pure check over a [`ValidationContext`] (and, for
//! uniqueness, the dataset [`RowSet`]). They back the `then_*` shortcuts on
//! [`RuleBuilder`](crate::core::RuleBuilder) and can be called directly from
//! custom validators.
//!
//! All checks report failures at [`Severity::Error`](crate::core::Severity)
//! with a default message; the owning rule restyles the failure with its own
//! severity and message template when it is built.
//!
//! | Check | Blank value |
//! |---|---|
//! | [`check_required`] / [`check_required_fields`] | fails |
//! | [`check_in_range`] | passes |
//! | [`check_email`] / [`check_phone_number`] | passes |
//! | [`check_unique`] | passes |
//! | [`check_start_before_end`] | passes |
//!
//! [`ValidationContext`]: crate::core::ValidationContext
//! [`RowSet`]: crate::core::RowSet

pub mod format;
pub mod range;
pub mod required;
pub mod temporal;
pub mod uniqueness;

pub use format::{check_email, check_phone_number, is_valid_email, is_valid_phone_number};
pub use range::check_in_range;
pub use required::{check_required, check_required_fields};
pub use temporal::check_start_before_end;
pub use uniqueness::check_unique;
