//! Rendering of [`GridReport`]s.
//!
//! A [`GridReport`] from an all-rows run can be written as JSON for tools,
//! as human-readable text for terminals and logs, or as Markdown for
//! documentation and pull request comments.
//!
//! # Examples
//!
//! ```rust
//! use grid_guard::core::GridReport;
//! use grid_guard::formatters::{FormatterConfig, HumanFormatter, ResultFormatter};
//!
//! let report = GridReport::new("contacts");
//! let output = HumanFormatter::with_config(FormatterConfig::ci())
//!     .format(&report)
//!     .unwrap();
//! assert!(output.contains("Validation PASSED"));
//! ```

use crate::core::{CellIssue, GridMetrics, GridReport, Severity};
use crate::error::Result;
use serde::Serialize;
use std::fmt::Write;

/// Configuration options for formatting grid reports.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the run metrics
    pub include_metrics: bool,
    /// Include individual issue details
    pub include_issues: bool,
    /// Maximum number of issues to display (`None` for all)
    pub max_issues: Option<usize>,
    /// Whether to use colorized output (for human formatter)
    pub use_colors: bool,
    /// Whether to include timestamps in output
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_metrics: true,
            include_issues: true,
            max_issues: None,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Creates a minimal configuration showing only the summary.
    pub fn minimal() -> Self {
        Self {
            include_metrics: true,
            include_issues: false,
            max_issues: Some(0),
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Creates a detailed configuration showing everything.
    pub fn detailed() -> Self {
        Self::default()
    }

    /// Creates a configuration suitable for CI environments.
    pub fn ci() -> Self {
        Self {
            include_metrics: true,
            include_issues: true,
            max_issues: Some(50),
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_metrics(mut self, include: bool) -> Self {
        self.include_metrics = include;
        self
    }

    pub fn with_issues(mut self, include: bool) -> Self {
        self.include_issues = include;
        self
    }

    /// Sets the maximum number of issues to display.
    pub fn with_max_issues(mut self, max: usize) -> Self {
        self.max_issues = Some(max);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_timestamps(mut self, include: bool) -> Self {
        self.include_timestamps = include;
        self
    }

    /// The issues of `report` this configuration displays.
    fn visible_issues<'a>(&self, report: &'a GridReport) -> &'a [CellIssue] {
        if !self.include_issues {
            return &[];
        }
        match self.max_issues {
            Some(max) => &report.issues[..max.min(report.issues.len())],
            None => &report.issues,
        }
    }
}

/// Trait for formatting grid reports into different output formats.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::GridReport;
/// use grid_guard::formatters::ResultFormatter;
///
/// struct OneLine;
///
/// impl ResultFormatter for OneLine {
///     fn format(&self, report: &GridReport) -> grid_guard::prelude::Result<String> {
///         Ok(format!("{}: {} issues", report.rule_set_name, report.issues.len()))
///     }
/// }
///
/// assert_eq!(OneLine.format(&GridReport::new("orders")).unwrap(), "orders: 0 issues");
/// ```
pub trait ResultFormatter {
    /// Formats a report into a string representation.
    fn format(&self, report: &GridReport) -> Result<String>;

    /// Formats a report with a custom configuration.
    ///
    /// The default implementation ignores the configuration.
    fn format_with_config(&self, report: &GridReport, _config: &FormatterConfig) -> Result<String> {
        self.format(report)
    }
}

fn status_label(report: &GridReport) -> &'static str {
    if report.is_valid() {
        "passed"
    } else {
        "failed"
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    status: &'static str,
    rule_set_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<&'a GridMetrics>,
    issues: &'a [CellIssue],
    total_issues: usize,
}

/// Formats grid reports as structured JSON.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::GridReport;
/// use grid_guard::formatters::{JsonFormatter, ResultFormatter};
///
/// let json = JsonFormatter::new().with_pretty(false).format(&GridReport::new("t")).unwrap();
/// assert!(json.starts_with("{\"status\":\"passed\""));
/// ```
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, report: &GridReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &GridReport, config: &FormatterConfig) -> Result<String> {
        let view = JsonReport {
            status: status_label(report),
            rule_set_name: &report.rule_set_name,
            timestamp: config
                .include_timestamps
                .then_some(report.timestamp.as_str()),
            metrics: config.include_metrics.then_some(&report.metrics),
            issues: config.visible_issues(report),
            total_issues: report.issues.len(),
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&view)?
        } else {
            serde_json::to_string(&view)?
        };
        Ok(json)
    }
}

/// Formats grid reports for console output.
///
/// # Examples
///
/// ```rust
/// use grid_guard::core::GridReport;
/// use grid_guard::formatters::{HumanFormatter, ResultFormatter};
///
/// let output = HumanFormatter::new().format(&GridReport::new("contacts")).unwrap();
/// assert!(output.contains("Rule set: contacts"));
/// ```
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn paint(text: impl std::fmt::Display, color: &str, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{color}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn severity_symbol(severity: Severity, use_colors: bool) -> String {
    match severity {
        Severity::Error => paint("🚨", "31", use_colors),
        Severity::Warning => paint("⚠️", "33", use_colors),
        Severity::Info => paint("ℹ️", "34", use_colors),
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, report: &GridReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &GridReport, config: &FormatterConfig) -> Result<String> {
        let mut output = String::new();
        let colors = config.use_colors;

        writeln!(output)?;
        if report.is_valid() {
            writeln!(output, "✅ {}", paint("Validation PASSED", "32", colors))?;
        } else {
            writeln!(output, "❌ {}", paint("Validation FAILED", "31", colors))?;
        }

        writeln!(output)?;
        writeln!(output, "Rule set: {}", report.rule_set_name)?;
        if config.include_timestamps {
            writeln!(output, "Timestamp: {}", report.timestamp)?;
        }

        if config.include_metrics {
            let metrics = &report.metrics;
            writeln!(output)?;
            writeln!(output, "📊 Summary Statistics:")?;
            writeln!(output, "   Rows: {}", metrics.rows)?;
            writeln!(output, "   Cells Evaluated: {}", metrics.cells_evaluated)?;
            writeln!(
                output,
                "   ❌ Invalid Cells: {}",
                paint(metrics.invalid_cells, "31", colors)
            )?;
            writeln!(
                output,
                "   Rules: {} evaluated, {} failed, {} skipped",
                metrics.rules_evaluated, metrics.rules_failed, metrics.rules_skipped
            )?;
            if metrics.faults > 0 {
                writeln!(output, "   💥 Faults: {}", paint(metrics.faults, "33", colors))?;
            }
            writeln!(output, "   Valid Cell Rate: {:.1}%", metrics.valid_cell_rate())?;
            writeln!(output, "   Execution Time: {}ms", metrics.execution_time_ms)?;
        }

        let issues = config.visible_issues(report);
        if !issues.is_empty() {
            writeln!(output)?;
            writeln!(output, "🔍 Issues Found:")?;

            for (i, issue) in issues.iter().enumerate() {
                writeln!(output)?;
                writeln!(
                    output,
                    "   {} Issue #{}: row {}, column {}",
                    severity_symbol(issue.severity, colors),
                    i + 1,
                    issue.row,
                    issue.column
                )?;
                writeln!(output, "      Rule: {}", issue.rule_name)?;
                writeln!(output, "      Severity: {}", issue.severity)?;
                writeln!(output, "      Message: {}", issue.message)?;
            }

            if report.issues.len() > issues.len() {
                writeln!(output)?;
                writeln!(
                    output,
                    "   ... and {} more issues",
                    report.issues.len() - issues.len()
                )?;
            }
        }

        writeln!(output)?;
        Ok(output)
    }
}

/// Formats grid reports as Markdown.
///
/// Issues are rendered as one table so large reports stay readable.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the base heading level for the output, clamped to `1..=6`.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes the characters that would break a Markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

impl ResultFormatter for MarkdownFormatter {
    fn format(&self, report: &GridReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &GridReport, config: &FormatterConfig) -> Result<String> {
        let mut output = String::new();
        let h = "#".repeat(self.heading_level as usize);

        if report.is_valid() {
            writeln!(output, "{h} ✅ Grid Validation Report - PASSED")?;
        } else {
            writeln!(output, "{h} ❌ Grid Validation Report - FAILED")?;
        }

        writeln!(output)?;
        writeln!(output, "**Rule set:** {}", report.rule_set_name)?;
        if config.include_timestamps {
            writeln!(output, "**Timestamp:** {}", report.timestamp)?;
        }

        if config.include_metrics {
            let metrics = &report.metrics;
            writeln!(output)?;
            writeln!(output, "{h}# Summary")?;
            writeln!(output)?;
            writeln!(output, "| Metric | Value |")?;
            writeln!(output, "|--------|-------|")?;
            writeln!(output, "| Rows | {} |", metrics.rows)?;
            writeln!(output, "| Cells Evaluated | {} |", metrics.cells_evaluated)?;
            writeln!(output, "| Invalid Cells | {} |", metrics.invalid_cells)?;
            writeln!(output, "| Rules Evaluated | {} |", metrics.rules_evaluated)?;
            writeln!(output, "| Rules Failed | {} |", metrics.rules_failed)?;
            writeln!(output, "| Rules Skipped | {} |", metrics.rules_skipped)?;
            writeln!(output, "| Faults | {} |", metrics.faults)?;
            writeln!(
                output,
                "| Valid Cell Rate | {:.1}% |",
                metrics.valid_cell_rate()
            )?;
            writeln!(output, "| Execution Time | {}ms |", metrics.execution_time_ms)?;
        }

        let issues = config.visible_issues(report);
        if !issues.is_empty() {
            writeln!(output)?;
            writeln!(output, "{h}# Issues")?;
            writeln!(output)?;
            writeln!(output, "| # | Severity | Row | Column | Rule | Message |")?;
            writeln!(output, "|---|----------|-----|--------|------|---------|")?;
            for (i, issue) in issues.iter().enumerate() {
                writeln!(
                    output,
                    "| {} | {} | {} | {} | {} | {} |",
                    i + 1,
                    issue.severity,
                    issue.row,
                    table_cell(&issue.column),
                    table_cell(&issue.rule_name),
                    table_cell(&issue.message)
                )?;
            }

            if report.issues.len() > issues.len() {
                writeln!(output)?;
                writeln!(
                    output,
                    "> **Note:** {} additional issues not shown in this report.",
                    report.issues.len() - issues.len()
                )?;
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_report() -> GridReport {
        let mut report = GridReport::new("contacts");
        report.metrics = GridMetrics {
            rows: 3,
            cells_evaluated: 6,
            invalid_cells: 2,
            rules_evaluated: 9,
            rules_skipped: 1,
            rules_failed: 2,
            faults: 0,
            execution_time_ms: 12,
        };
        report.issues.push(CellIssue {
            row: 0,
            column: "Email".to_string(),
            rule_name: "Email_unique".to_string(),
            severity: Severity::Error,
            message: "Email 'a@b.io' must be unique (also in row 2)".to_string(),
        });
        report.issues.push(CellIssue {
            row: 1,
            column: "Age".to_string(),
            rule_name: "age_plausible".to_string(),
            severity: Severity::Warning,
            message: "Age looks | unusual".to_string(),
        });
        report
    }

    #[test]
    fn test_formatter_config() {
        let config = FormatterConfig::default();
        assert!(config.include_metrics);
        assert!(config.include_issues);
        assert!(config.use_colors);
        assert_eq!(config.max_issues, None);

        let minimal = FormatterConfig::minimal();
        assert!(!minimal.include_issues);
        assert!(!minimal.use_colors);

        let ci = FormatterConfig::ci();
        assert!(!ci.use_colors);
        assert_eq!(ci.max_issues, Some(50));
    }

    #[test]
    fn test_json_formatter() {
        let report = create_test_report();
        let output = JsonFormatter::new().format(&report).unwrap();
        assert!(output.contains("\"status\": \"failed\""));
        assert!(output.contains("\"rule_set_name\": \"contacts\""));
        assert!(output.contains("Email_unique"));
        assert!(output.contains("\"total_issues\": 2"));

        let output = JsonFormatter::new()
            .format_with_config(&report, &FormatterConfig::minimal())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(value["issues"].as_array().unwrap().is_empty());
        assert!(value.get("timestamp").is_none());
        assert_eq!(value["metrics"]["invalid_cells"], 2);
    }

    #[test]
    fn test_human_formatter() {
        let report = create_test_report();
        let output = HumanFormatter::new().format(&report).unwrap();
        assert!(output.contains("Validation FAILED"));
        assert!(output.contains("Rule set: contacts"));
        assert!(output.contains("Cells Evaluated: 6"));
        assert!(output.contains("Issue #1: row 0, column Email"));
        assert!(output.contains("Rule: Email_unique"));

        let config = FormatterConfig::default().with_colors(false);
        let output = HumanFormatter::new()
            .format_with_config(&report, &config)
            .unwrap();
        assert!(output.contains("Valid Cell Rate: 66.7%"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_warnings_only_report_passes() {
        let mut report = create_test_report();
        report.issues.remove(0);
        let output = HumanFormatter::with_config(FormatterConfig::minimal())
            .format(&report)
            .unwrap();
        assert!(output.contains("Validation PASSED"));
        assert!(!output.contains("Issues Found"));
    }

    #[test]
    fn test_markdown_formatter() {
        let report = create_test_report();
        let output = MarkdownFormatter::new().format(&report).unwrap();
        assert!(output.contains("## ❌ Grid Validation Report - FAILED"));
        assert!(output.contains("**Rule set:** contacts"));
        assert!(output.contains("| Cells Evaluated | 6 |"));
        assert!(output.contains("| 2 | warning | 1 | Age | age_plausible | Age looks \\| unusual |"));

        let output = MarkdownFormatter::new()
            .with_heading_level(1)
            .format(&report)
            .unwrap();
        assert!(output.starts_with("# ❌"));
    }

    #[test]
    fn test_config_max_issues() {
        let report = create_test_report();
        let config = FormatterConfig::default().with_max_issues(1);

        let output = HumanFormatter::new()
            .format_with_config(&report, &config)
            .unwrap();
        assert!(output.contains("Issue #1"));
        assert!(!output.contains("Issue #2"));
        assert!(output.contains("... and 1 more issues"));

        let output = MarkdownFormatter::new()
            .format_with_config(&report, &config)
            .unwrap();
        assert!(output.contains("1 additional issues not shown"));
    }
}
