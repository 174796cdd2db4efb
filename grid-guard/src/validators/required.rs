//! Presence checks.

use crate::core::{ValidationContext, ValidationResult};

/// Fails when the column under validation is missing or blank.
pub fn check_required(ctx: &ValidationContext) -> ValidationResult {
    let present = ctx.current_value().is_some_and(|value| !value.is_blank());
    if present {
        return ValidationResult::success();
    }
    match ctx.current_column() {
        Some(column) => ValidationResult::error(format!("{column} is required")),
        None => ValidationResult::error("Value is required"),
    }
}

/// Fails when any of `columns` is missing or blank in the row, naming every
/// missing column.
pub fn check_required_fields<S: AsRef<str>>(
    ctx: &ValidationContext,
    columns: &[S],
) -> ValidationResult {
    let missing: Vec<&str> = columns
        .iter()
        .map(AsRef::as_ref)
        .filter(|column| !ctx.has_value(column))
        .collect();

    if missing.is_empty() {
        ValidationResult::success()
    } else {
        ValidationResult::error(format!("Required fields missing: {}", missing.join(", ")))
    }
}
