//! Output formatting for compliance reports.
//!
//! Supports a colored plain text report and JSON.

use crate::analyzer::stig::runner::Report;
use crate::analyzer::stig::types::{CheckResult, Status};
use crate::config::types::OutputFormat;
use colored::{ColoredString, Colorize};

/// Rendering switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub format: OutputFormat,
    /// Leave passed, skipped and accepted results out of plain reports.
    pub only_findings: bool,
}

/// Format a report to string.
pub fn format_report_to_string(report: &Report, options: FormatOptions) -> serde_json::Result<String> {
    match options.format {
        OutputFormat::Plain => Ok(format_plain(report, options.only_findings)),
        OutputFormat::Json => serde_json::to_string_pretty(report),
    }
}

/// Whether a status needs attention.
pub fn is_finding(status: Status) -> bool {
    matches!(status, Status::Failed | Status::Warning | Status::Errored)
}

fn status_label(status: Status) -> ColoredString {
    let label = format!("{:<8}", status.as_str());
    match status {
        Status::Passed => label.green(),
        Status::Failed => label.red().bold(),
        Status::Warning => label.yellow(),
        Status::Errored => label.bright_red(),
        Status::Skipped => label.dimmed(),
        Status::Accepted => label.cyan(),
    }
}

fn format_check(result: &CheckResult) -> String {
    let mut line = format!("  {} {}", status_label(result.status), result.message);
    if !result.target.is_empty() {
        line.push_str(&format!(" {}", format!("[{}]", result.target).dimmed()));
    }
    line.push('\n');
    line
}

fn format_plain(report: &Report, only_findings: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", "KUBERNETES STIG COMPLIANCE REPORT".bright_white().bold()));
    if let Some(cluster) = &report.cluster {
        output.push_str(&format!("{} {}\n", "Cluster:".dimmed(), cluster.cyan()));
    }
    output.push_str(&format!(
        "{} {}\n",
        "Generated:".dimmed(),
        report.generated_at.format("%Y-%m-%dT%H:%M:%SZ")
    ));

    for rule in &report.rules {
        let checks: Vec<&CheckResult> = rule
            .check_results
            .iter()
            .filter(|r| !only_findings || is_finding(r.status))
            .collect();
        if only_findings && checks.is_empty() {
            continue;
        }

        output.push_str(&format!(
            "\n{} {}\n",
            format!("[{}]", rule.rule_id).bright_cyan(),
            rule.rule_name.bold()
        ));
        for check in checks {
            output.push_str(&format_check(check));
        }
    }

    let summary = report.summary();
    let counts: Vec<String> = Status::ALL
        .iter()
        .map(|status| format!("{} {}", summary.get(*status), status.as_str().to_lowercase()))
        .collect();
    output.push_str(&format!(
        "\n{} {} checks in {} rules: {}\n",
        "Summary:".bold(),
        summary.total(),
        report.rules.len(),
        counts.join(", ")
    ));

    output
}
