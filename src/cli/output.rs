//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::command::DeploymentState;
use crate::config::ValidationResult;
use crate::driver::{ApplyReport, ResourceStatus};
use crate::kinds::{KindEntry, UpdateOutcome};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Result")]
    status: String,
    #[tabled(rename = "Source")]
    source: String,
}

/// Registry row for table display.
#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "API version")]
    api_version: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Resource")]
    plural: String,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Update")]
    update_mode: String,
}

/// Outcome of a pipeline run, as shown to the user.
#[derive(Debug, Serialize)]
pub struct DeploymentSummary<'a> {
    /// Whether the pipeline ended in success.
    pub success: bool,
    /// Final pipeline state.
    pub state: DeploymentState,
    /// Last error line, when the run failed.
    pub last_error: Option<&'a str>,
    /// Variables exported back to the host.
    pub extra_env: &'a BTreeMap<String, String>,
    /// Report of the apply batch, when one ran.
    pub report: Option<&'a ApplyReport>,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the outcome of a pipeline run.
    #[must_use]
    pub fn format_deployment(&self, summary: &DeploymentSummary<'_>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => Self::format_deployment_text(summary),
        }
    }

    fn format_deployment_text(summary: &DeploymentSummary<'_>) -> String {
        let mut output = String::new();

        if let Some(report) = summary.report {
            output.push_str(&Self::format_report_text(report));
        }

        for (key, value) in summary.extra_env {
            let _ = writeln!(output, "   {key}={value}");
        }

        if summary.success {
            let _ = writeln!(output, "\n{} Deployment finished ({})", "✓".green(), summary.state);
        } else {
            let reason = summary.last_error.unwrap_or("no error was logged");
            let _ = writeln!(output, "\n{} Deployment failed: {reason}", "✗".red());
        }

        output
    }

    /// Formats an apply report.
    #[must_use]
    pub fn format_report(&self, report: &ApplyReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &ApplyReport) -> String {
        let mut output = String::new();

        let title = if report.delete_mode { "Delete" } else { "Apply" };
        let _ = write!(
            output,
            "\n{title} started {}\n\n",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        if report.resources.is_empty() {
            output.push_str("   No resources in the workspace manifests.\n");
        } else {
            let rows: Vec<ResourceRow> = report
                .resources
                .iter()
                .enumerate()
                .map(|(i, r)| ResourceRow {
                    index: i + 1,
                    kind: format!("{} ({})", r.kind, r.api_version),
                    name: r.name.clone().unwrap_or_default(),
                    namespace: r.namespace.clone().unwrap_or_else(|| String::from("-")),
                    status: Self::format_status(r.status),
                    source: Self::truncate(&r.source, 40),
                })
                .collect();

            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = writeln!(
            output,
            "\n{report} in {} ms",
            report.duration().num_milliseconds()
        );

        output
    }

    /// Formats the kind registry.
    #[must_use]
    pub fn format_kinds(&self, entries: &[&KindEntry]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(entries).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<KindRow> = entries
                    .iter()
                    .map(|e| KindRow {
                        api_version: e.api.api_version(),
                        kind: e.kind.to_string(),
                        plural: e.plural.to_string(),
                        scope: if e.namespaced { "namespaced" } else { "cluster" }.to_string(),
                        update_mode: e.update_mode.to_string(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = writeln!(output, "\n{} supported kinds", entries.len());
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        let warnings: &[String] = if show_warnings { &result.warnings } else { &[] };

        match self.format {
            OutputFormat::Json => {
                let errors: Vec<_> = result
                    .errors
                    .iter()
                    .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
                    .collect();
                let json = serde_json::json!({
                    "valid": result.errors.is_empty(),
                    "errors": errors,
                    "warnings": warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.errors.is_empty() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {}: {}", error.field, error.message);
                    }
                    output
                };

                if !warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats a derived secret name.
    #[must_use]
    pub fn format_secret_name(&self, name: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "secret_name": name }))
                    .unwrap_or_default()
            }
            OutputFormat::Text => name.to_string(),
        }
    }

    /// Formats a per-resource status with color.
    fn format_status(status: ResourceStatus) -> String {
        match status {
            ResourceStatus::Reconciled(UpdateOutcome::Created) => "created".green().to_string(),
            ResourceStatus::Reconciled(UpdateOutcome::Applied) => "applied".yellow().to_string(),
            ResourceStatus::Reconciled(UpdateOutcome::Deleted) => "deleted".red().to_string(),
            ResourceStatus::Reconciled(UpdateOutcome::NotFound) => {
                "not found".dimmed().to_string()
            }
            ResourceStatus::Skipped => "skipped".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
