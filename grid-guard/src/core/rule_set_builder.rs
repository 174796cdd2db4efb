//! Fluent construction of [`RuleSet`]s.

use super::{ExecutionMode, Rule, RuleBuilder, RuleSet, ThrottlingConfig};
use crate::error::Result;
use crate::grid::ColumnMetadata;

/// Builder for constructing [`RuleSet`] instances.
///
/// Besides whole rules, the builder offers shortcuts that each add one rule
/// named after the column(s) it covers. Rule construction errors are
/// reported by [`build`](Self::build).
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::{ExecutionMode, RuleSet, ThrottlingConfig};
///
/// # fn example() -> grid_guard::prelude::Result<()> {
/// let rules = RuleSet::builder("customers")
///     .add_required("Name")
///     .add_email_validation("Email")
///     .add_unique_validation("Email")
///     .add_range_validation("Age", 0.0, 120.0)
///     .add_date_range_validation("ContractStart", "ContractEnd")
///     .add_conditional_required("VatNumber", "Country", "DE")
///     .execution_mode(ExecutionMode::StopOnFirstError)
///     .throttling(ThrottlingConfig::default().with_debounce_ms(150))
///     .build()?;
///
/// assert_eq!(rules.len(), 6);
/// assert!(rules.rule("Email_unique").is_some());
/// # Ok(())
/// # }
/// ```
pub struct RuleSetBuilder {
    name: String,
    rules: Vec<Result<Rule>>,
    execution_mode: ExecutionMode,
    throttling: ThrottlingConfig,
}

impl RuleSetBuilder {
    /// Creates a new rule set builder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            execution_mode: ExecutionMode::default(),
            throttling: ThrottlingConfig::default(),
        }
    }

    /// Adds a built rule.
    pub fn add_rule(mut self, rule: Rule) -> Self {
        self.rules.push(Ok(rule));
        self
    }

    /// Adds a rule from its builder. A build failure surfaces from
    /// [`build`](Self::build).
    pub fn rule(mut self, builder: RuleBuilder) -> Self {
        self.rules.push(builder.build());
        self
    }

    /// `column` must not be blank.
    pub fn add_required(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.rule(
            Rule::builder(format!("{column}_required"))
                .for_column(column)
                .then_required(),
        )
    }

    /// `column` must hold an email address when filled.
    pub fn add_email_validation(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.rule(
            Rule::builder(format!("{column}_email"))
                .for_column(column)
                .then_valid_email(),
        )
    }

    /// `column` must be a number within `[min, max]` when filled.
    pub fn add_range_validation(self, column: impl Into<String>, min: f64, max: f64) -> Self {
        let column = column.into();
        self.rule(
            Rule::builder(format!("{column}_range"))
                .for_column(column.clone())
                .then_in_range(column, min, max),
        )
    }

    /// No two rows may share a value in `column`.
    pub fn add_unique_validation(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.rule(
            Rule::builder(format!("{column}_unique"))
                .for_column(column.clone())
                .then_unique_in_column(column),
        )
    }

    /// The date in `start` must not be after the date in `end`. Edits of
    /// either column are validated.
    pub fn add_date_range_validation(
        self,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        let start = start.into();
        let end = end.into();
        self.rule(
            Rule::builder(format!("{start}_before_{end}"))
                .for_columns([start.clone(), end.clone()])
                .then_start_before_end(start, end),
        )
    }

    /// `column` must not be blank when `condition_column` equals
    /// `condition_value` (ignoring case).
    pub fn add_conditional_required(
        self,
        column: impl Into<String>,
        condition_column: impl Into<String>,
        condition_value: impl Into<String>,
    ) -> Self {
        let column = column.into();
        let condition_column = condition_column.into();
        self.rule(
            Rule::builder(format!("{column}_required_when_{condition_column}"))
                .for_column(column)
                .when_column_equals(condition_column, condition_value)
                .then_required(),
        )
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Shorthand for [`ExecutionMode::StopOnFirstError`].
    pub fn stop_on_first_error(self) -> Self {
        self.execution_mode(ExecutionMode::StopOnFirstError)
    }

    pub fn throttling(mut self, throttling: ThrottlingConfig) -> Self {
        self.throttling = throttling;
        self
    }

    /// Builds the rule set.
    ///
    /// Fails on the first incomplete or duplicate rule, or on an invalid
    /// throttling configuration.
    pub fn build(self) -> Result<RuleSet> {
        let mut rule_set = RuleSet::new(self.name);
        rule_set.set_execution_mode(self.execution_mode);
        rule_set.set_throttling(self.throttling)?;
        for rule in self.rules {
            rule_set.add_rule(rule?)?;
        }
        Ok(rule_set)
    }

    /// Builds the rule set and checks its columns against the grid's
    /// schema.
    pub fn build_for(self, metadata: &dyn ColumnMetadata) -> Result<RuleSet> {
        let rule_set = self.build()?;
        rule_set.verify_columns(metadata)?;
        Ok(rule_set)
    }
}
