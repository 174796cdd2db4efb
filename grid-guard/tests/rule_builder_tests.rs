//! Integration tests for rule construction and per-cell evaluation.

use grid_guard::core::{
    ExecutionMode, Rule, RuleSet, RuleStatus, Severity, ThrottlingConfig, ValidationResult,
};
use grid_guard::error::GridError;
use grid_guard::grid::InMemoryGrid;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn people() -> InMemoryGrid {
    InMemoryGrid::new(["Name", "Email", "Phone", "Age"])
        .with_row([("Name", "Ada"), ("Email", "ada@example.com"), ("Age", "36")])
        .with_row([("Name", ""), ("Email", ""), ("Phone", "+44 20 7946 0958")])
}

#[test]
fn test_build_without_validator_fails() {
    let err = Rule::builder("email_required")
        .for_column("Email")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        GridError::IncompleteRule { ref rule, ref reason }
            if rule == "email_required" && reason == "no validator attached"
    ));
}

#[test]
fn test_build_with_empty_name_fails() {
    for name in ["", "   "] {
        let err = Rule::builder(name)
            .for_column("Email")
            .then_required()
            .build()
            .unwrap_err();
        assert!(matches!(err, GridError::IncompleteRule { .. }));
    }
}

#[test]
fn test_build_without_target_column_fails() {
    let err = Rule::builder("floating")
        .then_check(|_| true)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("no target column"));
}

#[tokio::test]
async fn test_when_column_is_empty_skips_rule() {
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executed);
    let rules = RuleSet::builder("contact")
        .add_rule(
            Rule::builder("phone_when_no_email")
                .for_column("Phone")
                .when_column_is_empty("Email")
                .then(move |ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if ctx.has_value("Phone") {
                        ValidationResult::success()
                    } else {
                        ValidationResult::error("Phone or Email is required")
                    }
                })
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let grid = people();

    // Row 0 has an email: the guard is false and the validator never runs.
    let report = rules
        .evaluate_cell(&grid, 0, "Phone", &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.is_valid());
    assert_eq!(report.outcomes[0].status, RuleStatus::Skipped);
    assert_eq!(executed.load(Ordering::SeqCst), 0);

    // Row 1 has no email: the validator runs.
    let messages = rules.validate_cell(&grid, 1, "Phone").await.unwrap();
    assert!(messages.is_empty());
    assert_eq!(executed.load(Ordering::SeqCst), 1);

    // The guard reads Email, so editing Email re-validates Phone.
    assert!(rules.dependent_columns("Email").contains("Phone"));
}

#[tokio::test]
async fn test_in_range_boundaries_are_inclusive() {
    let rules = RuleSet::builder("people")
        .add_range_validation("Age", 0.0, 120.0)
        .build()
        .unwrap();
    let grid = InMemoryGrid::new(["Age"]);
    for age in [0, 120, -1, 121] {
        grid.push_row([("Age", age)]);
    }

    let mut verdicts = Vec::new();
    for row in 0..grid.len() {
        verdicts.push(rules.validate_cell(&grid, row, "Age").await.unwrap().is_empty());
    }
    assert_eq!(verdicts, vec![true, true, false, false]);

    let messages = rules.validate_cell(&grid, 2, "Age").await.unwrap();
    assert_eq!(messages, vec!["Age must be between 0 and 120".to_string()]);
}

#[tokio::test]
async fn test_stop_on_first_error_skips_later_rules() {
    let hint_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hint_runs);
    let rules = RuleSet::builder("people")
        .add_rule(
            Rule::builder("age_hint")
                .for_column("Age")
                .priority(10)
                .severity(Severity::Warning)
                .then_check(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    false
                })
                .build()
                .unwrap(),
        )
        .add_range_validation("Age", 0.0, 120.0)
        .execution_mode(ExecutionMode::StopOnFirstError)
        .build()
        .unwrap();
    let grid = InMemoryGrid::new(["Age"]).with_row([("Age", "-5")]);

    let report = rules
        .evaluate_cell(&grid, 0, "Age", &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.halted);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].rule_name, "Age_range");
    assert_eq!(report.result.severity(), Severity::Error);
    assert_eq!(hint_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_process_all_reports_warning_and_error() {
    let rules = RuleSet::builder("people")
        .add_range_validation("Age", 0.0, 120.0)
        .add_rule(
            Rule::builder("age_hint")
                .for_column("Age")
                .priority(10)
                .severity(Severity::Warning)
                .message("{column} value {value} in row {row} looks wrong")
                .then_check(|ctx| {
                    ctx.get_value("Age")
                        .and_then(|age| age.as_f64())
                        .is_some_and(|age| age > 0.0)
                })
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let grid = InMemoryGrid::new(["Age"]).with_row([("Age", "-5")]);

    let messages = rules.validate_cell(&grid, 0, "Age").await.unwrap();
    assert_eq!(
        messages,
        vec![
            "Age must be between 0 and 120".to_string(),
            "Age value -5 in row 0 looks wrong".to_string()
        ]
    );
}

#[tokio::test]
async fn test_panicking_validator_is_reported_as_error() {
    let rules = RuleSet::builder("people")
        .add_rule(
            Rule::builder("explodes")
                .for_column("Name")
                .then(|_| panic!("lookup table missing"))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let grid = people();

    let report = rules
        .evaluate_cell(&grid, 0, "Name", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcomes[0].status, RuleStatus::Faulted);
    assert_eq!(report.result.severity(), Severity::Error);
    assert!(report.result.message().contains("Rule 'explodes' failed to execute"));
    assert!(report.result.message().contains("lookup table missing"));
}

#[tokio::test]
async fn test_faulting_rule_does_not_stop_sibling_rules() {
    let rules = RuleSet::builder("people")
        .add_rule(
            Rule::builder("explodes")
                .for_column("Name")
                .priority(0)
                .then(|_| panic!("lookup table missing"))
                .build()
                .unwrap(),
        )
        .add_rule(
            Rule::builder("name_length")
                .for_column("Name")
                .priority(1)
                .then(|_| ValidationResult::warning("Name is too short"))
                .build()
                .unwrap(),
        )
        .execution_mode(ExecutionMode::ProcessAll)
        .build()
        .unwrap();
    let grid = people();

    let report = rules
        .evaluate_cell(&grid, 0, "Name", &CancellationToken::new())
        .await
        .unwrap();

    let statuses: Vec<(&str, RuleStatus)> = report
        .outcomes
        .iter()
        .map(|outcome| (outcome.rule_name.as_str(), outcome.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("explodes", RuleStatus::Faulted),
            ("name_length", RuleStatus::Failed)
        ]
    );
    assert!(!report.halted);
    assert_eq!(report.result.severity(), Severity::Error);
    assert_eq!(
        report.result.message(),
        "Rule 'explodes' failed to execute: lookup table missing; Name is too short"
    );
}

#[test]
fn test_throttling_clone_is_independent() {
    let original = ThrottlingConfig::default();
    let mut copy = original.clone();
    copy.debounce_ms = 5;
    copy.max_concurrent_validations = 1;
    copy.enable_async = false;

    assert_eq!(original.debounce_ms, 300);
    assert_eq!(original.max_concurrent_validations, 5);
    assert!(original.enable_async);
    assert!(original.enable_batch);
}
