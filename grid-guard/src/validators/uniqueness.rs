//! Cross-row uniqueness.

use crate::core::{RowSet, ValidationContext, ValidationResult};

/// Fails when another row of `rows` holds the same value in `column` as the
/// current row.
///
/// Values are compared as trimmed text, case-sensitively. Blank values are
/// never duplicates. The current row is identified by its row index, so the
/// snapshot may carry an older value for it without causing a false match.
///
/// Lookups go through [`RowSet::index`], so the first call on a snapshot
/// scans every row and later calls are hash lookups.
pub fn check_unique(ctx: &ValidationContext, rows: &RowSet, column: &str) -> ValidationResult {
    let Some(value) = ctx.get_value(column).filter(|value| !value.is_blank()) else {
        return ValidationResult::success();
    };

    let text = value.as_text();
    let index = rows.index(column);
    let duplicates: Vec<String> = index
        .rows_with(&text)
        .iter()
        .filter(|&&row| row != ctx.row_index())
        .map(|row| row.to_string())
        .collect();

    if duplicates.is_empty() {
        ValidationResult::success()
    } else {
        ValidationResult::error(format!(
            "{column} '{}' must be unique (also in row {})",
            text.trim(),
            duplicates.join(", ")
        ))
    }
}
