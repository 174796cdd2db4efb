//! Integration tests for cross-row rules and whole-dataset runs.

use grid_guard::core::{Rule, RuleSet, Severity, ThrottlingConfig, ValidationResult};
use grid_guard::formatters::{JsonFormatter, ResultFormatter};
use grid_guard::grid::InMemoryGrid;

fn emails(values: &[&str]) -> InMemoryGrid {
    let grid = InMemoryGrid::new(["Email"]);
    for value in values {
        grid.push_row([("Email", *value)]);
    }
    grid
}

#[tokio::test]
async fn test_unique_in_column_flags_every_duplicate() {
    let rules = RuleSet::builder("contacts")
        .add_unique_validation("Email")
        .build()
        .unwrap();
    let grid = emails(&["a@b.com", "c@d.com", "a@b.com"]);

    assert_eq!(
        rules.validate_cell(&grid, 0, "Email").await.unwrap(),
        vec!["Email 'a@b.com' must be unique (also in row 2)".to_string()]
    );
    assert!(rules.validate_cell(&grid, 1, "Email").await.unwrap().is_empty());
    assert_eq!(
        rules.validate_cell(&grid, 2, "Email").await.unwrap(),
        vec!["Email 'a@b.com' must be unique (also in row 0)".to_string()]
    );

    let report = rules.validate_all_rows_report(&grid).await.unwrap();
    let flagged: Vec<usize> = report.issues.iter().map(|issue| issue.row).collect();
    assert_eq!(flagged, vec![0, 2]);
    assert!(!report.is_valid());
    assert!(!rules.validate_all_rows(&grid).await.unwrap());
}

#[tokio::test]
async fn test_uniqueness_ignores_blanks_and_surrounding_whitespace() {
    let rules = RuleSet::builder("contacts")
        .add_unique_validation("Email")
        .build()
        .unwrap();
    let grid = emails(&["", "  ", " x@y.io", "x@y.io ", "X@Y.IO"]);

    let report = rules.validate_all_rows_report(&grid).await.unwrap();
    let flagged: Vec<usize> = report.issues.iter().map(|issue| issue.row).collect();
    assert_eq!(flagged, vec![2, 3]);
}

#[tokio::test]
async fn test_edit_is_seen_by_next_evaluation() {
    let rules = RuleSet::builder("contacts")
        .add_unique_validation("Email")
        .build()
        .unwrap();
    let grid = emails(&["a@b.com", "a@b.com"]);
    assert!(!rules.validate_cell(&grid, 0, "Email").await.unwrap().is_empty());

    grid.set_cell(1, "Email", "z@b.com").unwrap();
    assert!(rules.validate_cell(&grid, 0, "Email").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_custom_cross_row_rule_sees_other_rows() {
    let rules = RuleSet::builder("ledger")
        .add_rule(
            Rule::builder("amount_not_above_total")
                .for_column("Amount")
                .then_cross_row(|ctx, rows| {
                    let total: f64 = rows
                        .iter()
                        .filter_map(|row| row.get_value("Amount").and_then(|v| v.as_f64()))
                        .sum();
                    let amount = ctx
                        .get_value("Amount")
                        .and_then(|v| v.as_f64())
                        .unwrap_or_default();
                    if amount * 2.0 > total {
                        ValidationResult::warning("Amount is more than half of the ledger")
                    } else {
                        ValidationResult::success()
                    }
                })
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let grid = InMemoryGrid::new(["Amount"])
        .with_row([("Amount", 10)])
        .with_row([("Amount", 15)])
        .with_row([("Amount", 40)]);

    let report = rules.validate_all_rows_report(&grid).await.unwrap();
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].row, 2);
    assert_eq!(report.issues[0].severity, Severity::Warning);
    // Warnings do not make the dataset invalid.
    assert!(report.is_valid());
}

#[tokio::test]
async fn test_all_rows_report_metrics_and_json() {
    let rules = RuleSet::builder("customers")
        .add_required("Name")
        .add_email_validation("Email")
        .add_date_range_validation("Start", "End")
        .throttling(ThrottlingConfig::default().with_batch_size(2))
        .build()
        .unwrap();
    let grid = InMemoryGrid::new(["Name", "Email", "Start", "End"])
        .with_row([
            ("Name", "Ada"),
            ("Email", "ada@example.com"),
            ("Start", "2024-01-01"),
            ("End", "2024-02-01"),
        ])
        .with_row([
            ("Name", ""),
            ("Email", "not-an-email"),
            ("Start", "2024-03-01"),
            ("End", "2024-02-01"),
        ])
        .with_row([("Name", "Grace")]);

    let report = rules.validate_all_rows_report(&grid).await.unwrap();
    assert_eq!(report.metrics.rows, 3);
    // Name, Email, Start and End per row.
    assert_eq!(report.metrics.cells_evaluated, 12);
    // Row 1: Name, Email, Start and End are all invalid.
    assert_eq!(report.metrics.invalid_cells, 4);
    assert_eq!(report.issues_for_row(1).len(), 4);
    assert!(report.issues_for_row(2).is_empty());

    let json = JsonFormatter::new().format(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["status"], "failed");
    assert_eq!(value["total_issues"], 4);
}
