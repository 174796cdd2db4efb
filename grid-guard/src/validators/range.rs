//! Numeric range checks.

use crate::core::{ValidationContext, ValidationResult};

/// Checks that `column` holds a number within `[min, max]`, both ends
/// inclusive.
///
/// Blank values pass (pair with a required rule to forbid them). Text that
/// does not parse as a number fails.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::ValidationContext;
/// use grid_guard::validators::check_in_range;
///
/// let at_max = ValidationContext::new(0).with_value("Age", 120);
/// assert!(check_in_range(&at_max, "Age", 0.0, 120.0).is_valid());
///
/// let above = ValidationContext::new(0).with_value("Age", 121);
/// assert!(check_in_range(&above, "Age", 0.0, 120.0).is_failure());
/// ```
pub fn check_in_range(
    ctx: &ValidationContext,
    column: &str,
    min: f64,
    max: f64,
) -> ValidationResult {
    let Some(value) = ctx.get_value(column).filter(|value| !value.is_blank()) else {
        return ValidationResult::success();
    };

    match value.as_f64() {
        Some(number) if number >= min && number <= max => ValidationResult::success(),
        Some(_) => ValidationResult::error(format!("{column} must be between {min} and {max}")),
        None => ValidationResult::error(format!("{column} must be a number")),
    }
}
