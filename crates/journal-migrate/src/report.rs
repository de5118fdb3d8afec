//! Markdown reports for migration, validation and rollback runs.

use std::fmt::Write;

use crate::outcome::{
    MigrationSummary, OutcomeStatus, RollbackSummary, RunSummary, Tally, ValidationStatus,
    ValidationSummary,
};

/// Formats `part / whole` as a percentage with two decimals, `0%` when
/// `whole` is zero.
#[must_use]
pub fn success_rate(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", part as f64 * 100.0 / whole as f64)
}

/// Renders a migration report.
#[must_use]
pub fn create_migration_report(summary: &MigrationSummary) -> String {
    let mut out = String::new();
    header(&mut out, "Migration Report", "Success", summary);

    for (entity, result) in &summary.results {
        section(&mut out, entity.label(), "Success", result);
        let failures: Vec<_> = result
            .details
            .iter()
            .filter(|d| d.status == OutcomeStatus::Failed)
            .collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "### Failed {} Migrations\n", entity.label());
            for (i, d) in failures.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. `{}`: {}",
                    i + 1,
                    d.source_id,
                    d.error.as_deref().unwrap_or("unknown error")
                );
            }
            out.push('\n');
        }
    }

    overall(&mut out, summary);
    out
}

/// Renders a validation report, listing each field difference.
#[must_use]
pub fn create_validation_report(summary: &ValidationSummary) -> String {
    let mut out = String::new();
    header(&mut out, "Validation Report", "Validated", summary);

    for (entity, result) in &summary.results {
        section(&mut out, entity.label(), "Validated", result);
        let failures: Vec<_> = result
            .details
            .iter()
            .filter(|d| d.status == ValidationStatus::Failed)
            .collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "### Failed {} Validations\n", entity.label());
            for (i, d) in failures.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. `{}`: {}",
                    i + 1,
                    d.source_id,
                    d.reason.as_deref().unwrap_or("unknown reason")
                );
                for diff in &d.differences {
                    let _ = writeln!(
                        out,
                        "   - `{}`: source `{}`, target `{}`",
                        diff.field, diff.source_value, diff.target_value
                    );
                }
            }
            out.push('\n');
        }
    }

    overall(&mut out, summary);
    out
}

/// Renders a rollback report.
#[must_use]
pub fn create_rollback_report(summary: &RollbackSummary) -> String {
    let mut out = String::new();
    header(&mut out, "Rollback Report", "Success", summary);

    for (entity, result) in &summary.results {
        section(&mut out, entity.label(), "Success", result);
        let failures: Vec<_> = result
            .details
            .iter()
            .filter(|d| d.status == OutcomeStatus::Failed)
            .collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "### Failed {} Rollbacks\n", entity.label());
            for (i, d) in failures.iter().enumerate() {
                let source = d
                    .source_id
                    .as_deref()
                    .map(|id| format!(" (source `{}`)", id))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{}. `{}`{}: {}",
                    i + 1,
                    d.target_id,
                    source,
                    d.error.as_deref().unwrap_or("unknown error")
                );
            }
            out.push('\n');
        }
    }

    overall(&mut out, summary);
    out
}

fn header<R: Tally>(out: &mut String, title: &str, success_label: &str, summary: &RunSummary<R>) {
    let _ = writeln!(out, "# {}\n", title);
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "| Entity | Total | {} | Failed |", success_label);
    let _ = writeln!(out, "|--------|-------|{}|--------|", "-".repeat(success_label.len() + 2));
    for (entity, result) in &summary.results {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            entity.label(),
            result.total(),
            result.succeeded(),
            result.failed()
        );
    }
    out.push('\n');
}

fn section<R: Tally>(out: &mut String, label: &str, success_label: &str, result: &R) {
    let _ = writeln!(out, "## {}\n", label);
    let _ = writeln!(out, "- Total: {}", result.total());
    let _ = writeln!(out, "- {}: {}", success_label, result.succeeded());
    let _ = writeln!(out, "- Failed: {}\n", result.failed());
}

fn overall<R: Tally>(out: &mut String, summary: &RunSummary<R>) {
    let _ = writeln!(out, "## Overall\n");
    let _ = writeln!(
        out,
        "Overall success rate: {} ({}/{})",
        success_rate(summary.succeeded(), summary.total()),
        summary.succeeded(),
        summary.total()
    );
}
