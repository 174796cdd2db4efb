//! Rules and the validators they run.
//!
//! A [`Rule`] is produced by [`RuleBuilder::build`](super::RuleBuilder::build)
//! and is immutable afterwards. Its validators are stored as a tagged
//! [`Validator`] variant so evaluation dispatch is exhaustive rather than a
//! series of null checks.

use super::{RowSet, RuleOutcome, RuleStatus, Severity, ValidationContext, ValidationResult};
use crate::error::{GridError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Error type a fallible validator may return.
pub type ValidatorError = Box<dyn std::error::Error + Send + Sync>;

/// What a validator produces: a result, or a fault that is converted into an
/// Error-severity failure.
pub type ValidatorOutput = std::result::Result<ValidationResult, ValidatorError>;

/// Predicate deciding whether a rule's validators run for a row.
pub type Guard = Arc<dyn Fn(&ValidationContext) -> bool + Send + Sync>;

/// Validator that only needs the current row.
pub type SyncValidatorFn = Arc<dyn Fn(&ValidationContext) -> ValidatorOutput + Send + Sync>;

/// Validator that awaits other work (I/O, lookups) before answering.
pub type AsyncValidatorFn =
    Arc<dyn Fn(ValidationContext) -> BoxFuture<'static, ValidatorOutput> + Send + Sync>;

/// Validator that inspects the current row together with every row of the
/// dataset.
pub type CrossRowValidatorFn =
    Arc<dyn Fn(&ValidationContext, &RowSet) -> ValidatorOutput + Send + Sync>;

/// The stages a rule's validators run in, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidatorKind {
    Sync,
    Async,
    CrossRow,
}

impl ValidatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorKind::Sync => "sync",
            ValidatorKind::Async => "async",
            ValidatorKind::CrossRow => "cross_row",
        }
    }
}

/// Which other rows a cross-row validator looks at.
///
/// The scheduler uses it to find the cells of other rows whose outcome may
/// change after an edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowScope {
    /// Rows holding the same trimmed, non-blank value in this column
    SameValue(String),
    /// Any row of the dataset
    AllRows,
}

/// A validator attached to a rule.
#[derive(Clone)]
pub enum Validator {
    Sync(SyncValidatorFn),
    Async(AsyncValidatorFn),
    CrossRow(CrossRowValidatorFn),
}

impl Validator {
    /// Wraps a validator that only needs the current row.
    pub fn sync<F>(validate: F) -> Self
    where
        F: Fn(&ValidationContext) -> ValidatorOutput + Send + Sync + 'static,
    {
        Validator::Sync(Arc::new(validate))
    }

    /// Wraps a validator returning a future.
    pub fn async_fn<F>(validate: F) -> Self
    where
        F: Fn(ValidationContext) -> BoxFuture<'static, ValidatorOutput> + Send + Sync + 'static,
    {
        Validator::Async(Arc::new(validate))
    }

    /// Wraps a validator that needs every row of the dataset.
    pub fn cross_row<F>(validate: F) -> Self
    where
        F: Fn(&ValidationContext, &RowSet) -> ValidatorOutput + Send + Sync + 'static,
    {
        Validator::CrossRow(Arc::new(validate))
    }

    pub fn kind(&self) -> ValidatorKind {
        match self {
            Validator::Sync(_) => ValidatorKind::Sync,
            Validator::Async(_) => ValidatorKind::Async,
            Validator::CrossRow(_) => ValidatorKind::CrossRow,
        }
    }

    /// Wraps the validator so every failure it reports takes the given
    /// severity, and the rendered template as message when one is set.
    pub(crate) fn restyle(self, style: Arc<FailureStyle>) -> Self {
        match self {
            Validator::Sync(inner) => Validator::sync(move |ctx| {
                inner(ctx).map(|result| style.apply(result, ctx))
            }),
            Validator::Async(inner) => Validator::async_fn(move |ctx| {
                let style = Arc::clone(&style);
                let pending = inner(ctx.clone());
                async move { pending.await.map(|result| style.apply(result, &ctx)) }.boxed()
            }),
            Validator::CrossRow(inner) => Validator::cross_row(move |ctx, rows| {
                inner(ctx, rows).map(|result| style.apply(result, ctx))
            }),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator::{}", self.kind().as_str())
    }
}

/// Message text with `{rule}`, `{column}`, `{value}` and `{row}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    rule: String,
    template: String,
}

impl MessageTemplate {
    pub fn new(rule: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            template: template.into(),
        }
    }

    pub fn render(&self, ctx: &ValidationContext) -> String {
        let column = ctx.current_column().unwrap_or_default();
        let value = ctx.current_value().map(|v| v.as_text()).unwrap_or_default();
        self.template
            .replace("{rule}", &self.rule)
            .replace("{column}", column)
            .replace("{value}", &value)
            .replace("{row}", &ctx.row_index().to_string())
    }
}

/// Severity and optional message applied to the failures of built-in
/// validators.
#[derive(Debug)]
pub(crate) struct FailureStyle {
    pub(crate) severity: Severity,
    pub(crate) message: Option<MessageTemplate>,
}

impl FailureStyle {
    fn apply(&self, result: ValidationResult, ctx: &ValidationContext) -> ValidationResult {
        if result.is_valid() {
            return result;
        }
        let message = match &self.message {
            Some(template) => template.render(ctx),
            None => result.message().to_string(),
        };
        ValidationResult::failure(self.severity, message)
    }
}

/// A named, immutable validation rule.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::{Rule, Severity};
///
/// # fn example() -> grid_guard::prelude::Result<()> {
/// let rule = Rule::builder("age_range")
///     .for_column("Age")
///     .then_in_range("Age", 0.0, 120.0)
///     .severity(Severity::Warning)
///     .build()?;
///
/// assert!(rule.applies_to("Age"));
/// assert_eq!(rule.severity(), Severity::Warning);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Rule {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) target_columns: BTreeSet<String>,
    pub(crate) dependency_columns: BTreeSet<String>,
    pub(crate) guard: Option<Guard>,
    pub(crate) validators: Vec<Validator>,
    pub(crate) row_scopes: Vec<RowScope>,
    pub(crate) severity: Severity,
    pub(crate) priority: i32,
    pub(crate) message: String,
}

impl Rule {
    /// Creates a new builder for a rule with the given name.
    pub fn builder(name: impl Into<String>) -> super::RuleBuilder {
        super::RuleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target_columns(&self) -> &BTreeSet<String> {
        &self.target_columns
    }

    pub fn dependency_columns(&self) -> &BTreeSet<String> {
        &self.dependency_columns
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Lower priorities run first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The configured message template (may be empty).
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    /// Returns true if edits of `column` are validated by this rule.
    pub fn applies_to(&self, column: &str) -> bool {
        self.target_columns.contains(column)
    }

    /// Returns true if the rule reads `column` without validating it.
    pub fn depends_on(&self, column: &str) -> bool {
        self.dependency_columns.contains(column)
    }

    /// Returns true if any validator needs the dataset-wide row snapshot.
    pub fn needs_rows(&self) -> bool {
        self.validators
            .iter()
            .any(|v| v.kind() == ValidatorKind::CrossRow)
    }

    pub fn row_scopes(&self) -> &[RowScope] {
        &self.row_scopes
    }

    /// Returns true if editing `column` in one row can change this rule's
    /// outcome in other rows.
    pub fn spans_rows_on(&self, column: &str) -> bool {
        self.row_scopes.iter().any(|scope| match scope {
            RowScope::SameValue(key) => key == column,
            RowScope::AllRows => self.applies_to(column) || self.depends_on(column),
        })
    }

    /// Evaluates the rule against one row.
    ///
    /// Validators run in stage order and stop at the first failure. Panics
    /// and validator errors become Error-severity failures. Returns
    /// [`GridError::Cancelled`] if `cancel` fires while an async validator
    /// is pending.
    pub async fn evaluate(
        &self,
        ctx: &ValidationContext,
        rows: &RowSet,
        cancel: &CancellationToken,
    ) -> Result<RuleOutcome> {
        if let Some(guard) = &self.guard {
            match catch_unwind(AssertUnwindSafe(|| guard(ctx))) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        rule.name = %self.name,
                        cell.row = ctx.row_index(),
                        cell.column = ?ctx.current_column(),
                        "Guard is false, skipping rule"
                    );
                    return Ok(RuleOutcome::skipped(&self.name));
                }
                Err(payload) => return Ok(self.fault(ctx, "guard", &panic_message(&payload))),
            }
        }

        for validator in &self.validators {
            if cancel.is_cancelled() {
                return Err(GridError::Cancelled);
            }

            let output = match validator {
                Validator::Sync(validate) => catch_unwind(AssertUnwindSafe(|| validate(ctx))),
                Validator::Async(validate) => {
                    match catch_unwind(AssertUnwindSafe(|| validate(ctx.clone()))) {
                        Ok(pending) => {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => return Err(GridError::Cancelled),
                                output = AssertUnwindSafe(pending).catch_unwind() => output,
                            }
                        }
                        Err(payload) => Err(payload),
                    }
                }
                Validator::CrossRow(validate) => {
                    catch_unwind(AssertUnwindSafe(|| validate(ctx, rows)))
                }
            };

            let stage = validator.kind().as_str();
            match output {
                Ok(Ok(result)) if result.is_failure() => {
                    debug!(
                        rule.name = %self.name,
                        rule.stage = stage,
                        cell.row = ctx.row_index(),
                        failure.severity = %result.severity(),
                        failure.message = %result.message(),
                        "Rule failed"
                    );
                    return Ok(RuleOutcome {
                        rule_name: self.name.clone(),
                        status: RuleStatus::Failed,
                        result,
                    });
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Ok(self.fault(ctx, stage, &err.to_string())),
                Err(payload) => return Ok(self.fault(ctx, stage, &panic_message(&payload))),
            }
        }

        debug!(rule.name = %self.name, cell.row = ctx.row_index(), "Rule passed");
        Ok(RuleOutcome {
            rule_name: self.name.clone(),
            status: RuleStatus::Passed,
            result: ValidationResult::success(),
        })
    }

    fn fault(&self, ctx: &ValidationContext, stage: &str, detail: &str) -> RuleOutcome {
        error!(
            rule.name = %self.name,
            rule.stage = stage,
            cell.row = ctx.row_index(),
            cell.column = ?ctx.current_column(),
            error = %detail,
            error.type = "validator_fault",
            "Validator faulted"
        );
        RuleOutcome {
            rule_name: self.name.clone(),
            status: RuleStatus::Faulted,
            result: ValidationResult::error(format!(
                "Rule '{}' failed to execute: {detail}",
                self.name
            )),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("target_columns", &self.target_columns)
            .field("dependency_columns", &self.dependency_columns)
            .field("has_guard", &self.guard.is_some())
            .field("validators", &self.validators)
            .field("severity", &self.severity)
            .field("priority", &self.priority)
            .field("message", &self.message)
            .finish()
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
