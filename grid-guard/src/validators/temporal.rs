//! Date ordering between two columns of the same row.

use crate::core::{ValidationContext, ValidationResult};

/// Checks that the date in `start` is on or before the date in `end`.
///
/// Values typed as dates are used directly; text is parsed with
/// [`parse_date_time`](crate::core::parse_date_time). When either side is
/// blank or cannot be read as a date the check passes: ordering is only
/// judged between two real dates.
pub fn check_start_before_end(ctx: &ValidationContext, start: &str, end: &str) -> ValidationResult {
    let start_at = ctx.get_value(start).and_then(|value| value.as_date_time());
    let end_at = ctx.get_value(end).and_then(|value| value.as_date_time());

    match (start_at, end_at) {
        (Some(start_at), Some(end_at)) if start_at > end_at => {
            ValidationResult::error(format!("{start} must be on or before {end}"))
        }
        _ => ValidationResult::success(),
    }
}
