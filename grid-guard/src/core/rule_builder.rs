//! Fluent construction of [`Rule`]s.

use super::rule::{FailureStyle, MessageTemplate, ValidatorError};
use super::{
    Guard, RowScope, RowSet, Rule, Severity, ValidationContext, ValidationResult, Validator,
};
use crate::error::{GridError, Result};
use crate::validators;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

/// A validator waiting for [`RuleBuilder::build`].
///
/// Built-in and predicate validators are restyled with the rule's severity
/// and message at build time; full result functions are kept as written.
enum DraftValidator {
    Custom(Validator),
    Styled(Validator),
}

/// Builder for constructing [`Rule`] instances.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::{Rule, Severity};
///
/// # fn example() -> grid_guard::prelude::Result<()> {
/// let rule = Rule::builder("ship_date_required")
///     .for_column("ShipDate")
///     .when_column_equals("Status", "shipped")
///     .then_required()
///     .message("{column} is required once an order has shipped")
///     .build()?;
///
/// assert!(rule.depends_on("Status"));
/// # Ok(())
/// # }
/// ```
pub struct RuleBuilder {
    name: String,
    description: Option<String>,
    target_columns: BTreeSet<String>,
    dependency_columns: BTreeSet<String>,
    read_columns: BTreeSet<String>,
    guard: Option<Guard>,
    validators: Vec<DraftValidator>,
    row_scopes: Vec<RowScope>,
    severity: Severity,
    priority: i32,
    message: Option<String>,
}

impl RuleBuilder {
    /// Creates a new rule builder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            target_columns: BTreeSet::new(),
            dependency_columns: BTreeSet::new(),
            read_columns: BTreeSet::new(),
            guard: None,
            validators: Vec::new(),
            row_scopes: Vec::new(),
            severity: Severity::default(),
            priority: 0,
            message: None,
        }
    }

    /// Adds a column whose edits this rule validates.
    pub fn for_column(mut self, column: impl Into<String>) -> Self {
        self.target_columns.insert(column.into());
        self
    }

    /// Adds several target columns.
    pub fn for_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declares a column the rule reads without validating it. Edits of a
    /// dependency column re-validate the rule's target columns in that row.
    ///
    /// Columns named by guards and built-in validators are recorded
    /// automatically.
    pub fn depends_on(mut self, column: impl Into<String>) -> Self {
        self.dependency_columns.insert(column.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the severity given to predicate and built-in validator failures.
    ///
    /// The default is [`Severity::Error`].
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the priority. Lower priorities run first; equal priorities run in
    /// insertion order.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the failure message for predicate and built-in validators.
    ///
    /// The message may contain `{rule}`, `{column}`, `{value}` and `{row}`
    /// placeholders.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    // Guards

    /// Sets the guard predicate, replacing any earlier guard.
    ///
    /// Use [`and_when`](Self::and_when) or [`or_when`](Self::or_when) to
    /// combine predicates.
    pub fn when<F>(mut self, guard: F) -> Self
    where
        F: Fn(&ValidationContext) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Requires both the current guard and `guard` to hold.
    pub fn and_when<F>(mut self, guard: F) -> Self
    where
        F: Fn(&ValidationContext) -> bool + Send + Sync + 'static,
    {
        let combined: Guard = match self.guard.take() {
            Some(existing) => Arc::new(move |ctx: &ValidationContext| existing(ctx) && guard(ctx)),
            None => Arc::new(guard),
        };
        self.guard = Some(combined);
        self
    }

    /// Requires either the current guard or `guard` to hold.
    ///
    /// Without a current guard the rule always applies, so `guard` alone is
    /// used.
    pub fn or_when<F>(mut self, guard: F) -> Self
    where
        F: Fn(&ValidationContext) -> bool + Send + Sync + 'static,
    {
        let combined: Guard = match self.guard.take() {
            Some(existing) => Arc::new(move |ctx: &ValidationContext| existing(ctx) || guard(ctx)),
            None => Arc::new(guard),
        };
        self.guard = Some(combined);
        self
    }

    /// Runs the rule only when `column` equals `value`, ignoring case and
    /// surrounding whitespace.
    ///
    /// This is whole-value equality: `"shipped"` does not match
    /// `"unshipped"`. Use [`when_column_contains`](Self::when_column_contains)
    /// for case-insensitive containment.
    pub fn when_column_equals(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        let column = self.reads(column);
        let expected = value.into().trim().to_lowercase();
        self.when(move |ctx| ctx.get_string_value(&column).trim().to_lowercase() == expected)
    }

    /// Runs the rule only when `column` is present and not blank.
    pub fn when_column_has_value(mut self, column: impl Into<String>) -> Self {
        let column = self.reads(column);
        self.when(move |ctx| ctx.has_value(&column))
    }

    /// Runs the rule only when `column` is missing or blank.
    pub fn when_column_is_empty(mut self, column: impl Into<String>) -> Self {
        let column = self.reads(column);
        self.when(move |ctx| !ctx.has_value(&column))
    }

    /// Runs the rule only when `column` contains `fragment`, ignoring case.
    pub fn when_column_contains(
        mut self,
        column: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        let column = self.reads(column);
        let fragment = fragment.into().to_lowercase();
        self.when(move |ctx| {
            ctx.get_string_value(&column)
                .to_lowercase()
                .contains(&fragment)
        })
    }

    // Validators

    /// Adds a validator returning a full [`ValidationResult`], used as is.
    pub fn then<F>(mut self, validate: F) -> Self
    where
        F: Fn(&ValidationContext) -> ValidationResult + Send + Sync + 'static,
    {
        self.validators
            .push(DraftValidator::Custom(Validator::sync(move |ctx| {
                Ok(validate(ctx))
            })));
        self
    }

    /// Adds a boolean predicate. A false answer fails with the rule's
    /// severity and message.
    pub fn then_check<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ValidationContext) -> bool + Send + Sync + 'static,
    {
        let fallback = format!("Rule '{}' failed", self.name);
        self.validators
            .push(DraftValidator::Styled(Validator::sync(move |ctx| {
                Ok(ValidationResult::from_check(
                    predicate(ctx),
                    Severity::Error,
                    fallback.as_str(),
                ))
            })));
        self
    }

    /// Adds a fallible validator. An `Err` is reported as an Error-severity
    /// failure naming the rule.
    pub fn then_try<F, E>(mut self, validate: F) -> Self
    where
        F: Fn(&ValidationContext) -> std::result::Result<ValidationResult, E>
            + Send
            + Sync
            + 'static,
        E: Into<ValidatorError>,
    {
        self.validators
            .push(DraftValidator::Custom(Validator::sync(move |ctx| {
                validate(ctx).map_err(Into::into)
            })));
        self
    }

    /// Adds an asynchronous validator. It runs after every synchronous
    /// validator of the rule has passed.
    pub fn then_async<F, Fut>(mut self, validate: F) -> Self
    where
        F: Fn(ValidationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ValidationResult> + Send + 'static,
    {
        self.validators
            .push(DraftValidator::Custom(Validator::async_fn(move |ctx| {
                validate(ctx).map(Ok).boxed()
            })));
        self
    }

    /// Adds a validator that sees every row of the dataset. It runs last.
    pub fn then_cross_row<F>(mut self, validate: F) -> Self
    where
        F: Fn(&ValidationContext, &RowSet) -> ValidationResult + Send + Sync + 'static,
    {
        self.validators
            .push(DraftValidator::Custom(Validator::cross_row(move |ctx, rows| {
                Ok(validate(ctx, rows))
            })));
        self.row_scopes.push(RowScope::AllRows);
        self
    }

    // Shortcuts

    /// The cell under validation must not be blank.
    pub fn then_required(self) -> Self {
        self.styled(|ctx| validators::check_required(ctx))
    }

    /// Every one of `columns` must be filled in the row.
    pub fn then_required_fields<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(|c| self.reads(c)).collect();
        self.styled(move |ctx| validators::check_required_fields(ctx, &columns))
    }

    /// `column` must be a number in `[min, max]` (inclusive).
    pub fn then_in_range(mut self, column: impl Into<String>, min: f64, max: f64) -> Self {
        let column = self.reads(column);
        self.styled(move |ctx| validators::check_in_range(ctx, &column, min, max))
    }

    /// The date in `start` must not be after the date in `end`.
    pub fn then_start_before_end(
        mut self,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        let start = self.reads(start);
        let end = self.reads(end);
        self.styled(move |ctx| validators::check_start_before_end(ctx, &start, &end))
    }

    /// No other row may hold the same value in `column`.
    pub fn then_unique_in_column(mut self, column: impl Into<String>) -> Self {
        let column = self.reads(column);
        self.row_scopes.push(RowScope::SameValue(column.clone()));
        self.validators
            .push(DraftValidator::Styled(Validator::cross_row(move |ctx, rows| {
                Ok(validators::check_unique(ctx, rows, &column))
            })));
        self
    }

    /// The cell under validation must hold an email address.
    pub fn then_valid_email(self) -> Self {
        self.styled(|ctx| match ctx.current_column() {
            Some(column) => validators::check_email(ctx, column),
            None => ValidationResult::success(),
        })
    }

    /// The cell under validation must hold a phone number.
    pub fn then_valid_phone_number(self) -> Self {
        self.styled(|ctx| match ctx.current_column() {
            Some(column) => validators::check_phone_number(ctx, column),
            None => ValidationResult::success(),
        })
    }

    /// Builds the rule.
    ///
    /// Fails with [`GridError::IncompleteRule`] if the name is blank, no
    /// target column was given, or no validator was attached.
    pub fn build(self) -> Result<Rule> {
        if self.name.trim().is_empty() {
            return Err(GridError::incomplete_rule(&self.name, "rule name is empty"));
        }
        if self.target_columns.is_empty() {
            return Err(GridError::incomplete_rule(&self.name, "no target column"));
        }
        if self.validators.is_empty() {
            return Err(GridError::incomplete_rule(&self.name, "no validator attached"));
        }

        let message = self.message.unwrap_or_default();
        let style = Arc::new(FailureStyle {
            severity: self.severity,
            message: (!message.trim().is_empty())
                .then(|| MessageTemplate::new(&self.name, &message)),
        });

        let mut validators: Vec<Validator> = self
            .validators
            .into_iter()
            .map(|draft| match draft {
                DraftValidator::Custom(validator) => validator,
                DraftValidator::Styled(validator) => validator.restyle(Arc::clone(&style)),
            })
            .collect();
        validators.sort_by_key(Validator::kind);

        let mut dependency_columns = self.dependency_columns;
        dependency_columns.extend(
            self.read_columns
                .into_iter()
                .filter(|column| !self.target_columns.contains(column)),
        );

        Ok(Rule {
            name: self.name,
            description: self.description,
            target_columns: self.target_columns,
            dependency_columns,
            guard: self.guard,
            validators,
            row_scopes: self.row_scopes,
            severity: self.severity,
            priority: self.priority,
            message,
        })
    }

    fn reads(&mut self, column: impl Into<String>) -> String {
        let column = column.into();
        self.read_columns.insert(column.clone());
        column
    }

    fn styled<F>(mut self, validate: F) -> Self
    where
        F: Fn(&ValidationContext) -> ValidationResult + Send + Sync + 'static,
    {
        self.validators
            .push(DraftValidator::Styled(Validator::sync(move |ctx| {
                Ok(validate(ctx))
            })));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RuleStatus, ValidatorKind};
    use tokio_util::sync::CancellationToken;

    async fn run(rule: &Rule, ctx: &ValidationContext) -> crate::core::RuleOutcome {
        rule.evaluate(ctx, &RowSet::default(), &CancellationToken::new())
            .await
            .unwrap()
    }

    #[test]
    fn test_build_requires_name_targets_and_validator() {
        let err = Rule::builder("").for_column("A").then_required().build().unwrap_err();
        assert!(matches!(err, GridError::IncompleteRule { .. }));

        let err = Rule::builder("r").then_required().build().unwrap_err();
        assert!(err.to_string().contains("no target column"));

        let err = Rule::builder("r").for_column("A").build().unwrap_err();
        assert!(err.to_string().contains("no validator attached"));
    }

    #[test]
    fn test_validators_are_ordered_by_stage() {
        let rule = Rule::builder("r")
            .for_column("A")
            .then_cross_row(|_, _| ValidationResult::success())
            .then_async(|_| async { ValidationResult::success() })
            .then_required()
            .build()
            .unwrap();

        let kinds: Vec<ValidatorKind> = rule.validators().iter().map(Validator::kind).collect();
        assert_eq!(
            kinds,
            vec![ValidatorKind::Sync, ValidatorKind::Async, ValidatorKind::CrossRow]
        );
    }

    #[test]
    fn test_dependency_columns_are_inferred() {
        let rule = Rule::builder("r")
            .for_column("End")
            .when_column_has_value("Status")
            .then_start_before_end("Start", "End")
            .depends_on("Owner")
            .build()
            .unwrap();

        let deps: Vec<&str> = rule.dependency_columns().iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["Owner", "Start", "Status"]);
        assert!(!rule.depends_on("End"));
    }

    #[tokio::test]
    async fn test_when_column_is_empty_skips_filled_rows() {
        let rule = Rule::builder("fallback_contact")
            .for_column("Phone")
            .when_column_is_empty("Email")
            .then_required()
            .build()
            .unwrap();

        let has_email = ValidationContext::new(0)
            .with_value("Email", "a@b.com")
            .with_pending_value("Phone", "");
        assert_eq!(run(&rule, &has_email).await.status, RuleStatus::Skipped);

        let no_email = ValidationContext::new(0)
            .with_value("Email", "")
            .with_pending_value("Phone", "");
        assert_eq!(run(&rule, &no_email).await.status, RuleStatus::Failed);
    }

    #[tokio::test]
    async fn test_when_column_equals_matches_whole_value() {
        let equals = Rule::builder("ship_date")
            .for_column("ShipDate")
            .when_column_equals("Status", "shipped")
            .then_required()
            .build()
            .unwrap();
        let contains = Rule::builder("ship_date")
            .for_column("ShipDate")
            .when_column_contains("Status", "shipped")
            .then_required()
            .build()
            .unwrap();

        let row = |status: &str| {
            ValidationContext::new(0)
                .with_value("Status", status)
                .with_pending_value("ShipDate", "")
        };

        assert_eq!(run(&equals, &row(" Shipped ")).await.status, RuleStatus::Failed);
        assert_eq!(run(&equals, &row("unshipped")).await.status, RuleStatus::Skipped);
        assert_eq!(run(&contains, &row("UNSHIPPED")).await.status, RuleStatus::Failed);
    }

    #[tokio::test]
    async fn test_when_replaces_and_and_when_conjoins() {
        let ctx = ValidationContext::new(0)
            .with_value("Kind", "a")
            .with_pending_value("X", "");

        let replaced = Rule::builder("r")
            .for_column("X")
            .when(|_| false)
            .when(|_| true)
            .then_required()
            .build()
            .unwrap();
        assert_eq!(run(&replaced, &ctx).await.status, RuleStatus::Failed);

        let conjoined = Rule::builder("r")
            .for_column("X")
            .when(|_| true)
            .and_when(|_| false)
            .then_required()
            .build()
            .unwrap();
        assert_eq!(run(&conjoined, &ctx).await.status, RuleStatus::Skipped);

        let disjoined = Rule::builder("r")
            .for_column("X")
            .when(|_| false)
            .or_when(|ctx| ctx.get_string_value("Kind") == "a")
            .then_required()
            .build()
            .unwrap();
        assert_eq!(run(&disjoined, &ctx).await.status, RuleStatus::Failed);
    }

    #[tokio::test]
    async fn test_string_guards_ignore_case() {
        let ctx = ValidationContext::new(0)
            .with_value("Status", " Shipped ")
            .with_value("Notes", "Handle With CARE")
            .with_pending_value("X", "");

        let equals = Rule::builder("r")
            .for_column("X")
            .when_column_equals("Status", "SHIPPED")
            .then_required()
            .build()
            .unwrap();
        assert_eq!(run(&equals, &ctx).await.status, RuleStatus::Failed);

        let contains = Rule::builder("r")
            .for_column("X")
            .when_column_contains("Notes", "care")
            .then_required()
            .build()
            .unwrap();
        assert_eq!(run(&contains, &ctx).await.status, RuleStatus::Failed);
    }

    #[tokio::test]
    async fn test_predicate_uses_rule_severity_and_message() {
        let rule = Rule::builder("even")
            .for_column("N")
            .then_check(|ctx| ctx.current_value().and_then(|v| v.as_f64()) == Some(2.0))
            .severity(Severity::Warning)
            .message("{column} in row {row} should be 2, got {value}")
            .build()
            .unwrap();

        let outcome = run(&rule, &ValidationContext::new(4).with_pending_value("N", 3)).await;
        assert_eq!(outcome.result.severity(), Severity::Warning);
        assert_eq!(outcome.result.message(), "N in row 4 should be 2, got 3");
    }

    #[tokio::test]
    async fn test_predicate_without_message_names_rule() {
        let rule = Rule::builder("never")
            .for_column("N")
            .then_check(|_| false)
            .build()
            .unwrap();

        let outcome = run(&rule, &ValidationContext::new(0).with_pending_value("N", 1)).await;
        assert_eq!(outcome.result.message(), "Rule 'never' failed");
        assert_eq!(outcome.result.severity(), Severity::Error);
    }

    #[tokio::test]
    async fn test_full_result_is_not_restyled() {
        let rule = Rule::builder("custom")
            .for_column("N")
            .then(|_| ValidationResult::info("just so you know"))
            .severity(Severity::Error)
            .message("ignored")
            .build()
            .unwrap();

        let outcome = run(&rule, &ValidationContext::new(0).with_pending_value("N", 1)).await;
        assert_eq!(outcome.result.severity(), Severity::Info);
        assert_eq!(outcome.result.message(), "just so you know");
    }

    #[tokio::test]
    async fn test_then_try_error_is_a_fault() {
        let rule = Rule::builder("lookup")
            .for_column("N")
            .then_try(|_| Err::<ValidationResult, _>("backend unavailable"))
            .build()
            .unwrap();

        let outcome = run(&rule, &ValidationContext::new(0).with_pending_value("N", 1)).await;
        assert_eq!(outcome.status, RuleStatus::Faulted);
        assert!(outcome.result.message().contains("backend unavailable"));
        assert!(outcome.result.message().contains("lookup"));
    }
}
