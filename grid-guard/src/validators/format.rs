//! Text format checks for email addresses and phone numbers.

use crate::core::{ValidationContext, ValidationResult};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap_or_else(|e| panic!("email pattern is invalid: {e}"))
});

// North American numbers with optional country code and separators.
static US_PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\+?1[-.\s]?)?\(?([0-9]{3})\)?[-.\s]?([0-9]{3})[-.\s]?([0-9]{4})$")
        .unwrap_or_else(|e| panic!("phone pattern is invalid: {e}"))
});

// E.164-style digits once separators are stripped.
static INTERNATIONAL_PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[1-9]\d{6,14}$").unwrap_or_else(|e| panic!("phone pattern is invalid: {e}"))
});

/// Returns true if `text` looks like an email address.
pub fn is_valid_email(text: &str) -> bool {
    EMAIL_REGEX.is_match(text.trim())
}

/// Returns true if `text` looks like a phone number, either in North
/// American notation or as an international number with separators.
pub fn is_valid_phone_number(text: &str) -> bool {
    let text = text.trim();
    if US_PHONE_REGEX.is_match(text) {
        return true;
    }
    let compact: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    INTERNATIONAL_PHONE_REGEX.is_match(&compact)
}

/// Checks that `column` holds an email address. Blank values pass.
pub fn check_email(ctx: &ValidationContext, column: &str) -> ValidationResult {
    check_text(ctx, column, is_valid_email, "a valid email address")
}

/// Checks that `column` holds a phone number. Blank values pass.
pub fn check_phone_number(ctx: &ValidationContext, column: &str) -> ValidationResult {
    check_text(ctx, column, is_valid_phone_number, "a valid phone number")
}

fn check_text(
    ctx: &ValidationContext,
    column: &str,
    matches: fn(&str) -> bool,
    expected: &str,
) -> ValidationResult {
    match ctx.get_value(column).filter(|value| !value.is_blank()) {
        Some(value) if !matches(&value.as_text()) => {
            ValidationResult::error(format!("{column} must be {expected}"))
        }
        _ => ValidationResult::success(),
    }
}
