//! Text rendering for CLI surfaces.

use crate::core::catalog::MigrationDefinition;
use crate::core::ledger::VersionRecord;
use crate::core::runner::{RunOutcome, RunReport, RunState};
use crate::core::validate::ValidationReport;
use colored::Colorize;
use std::path::PathBuf;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

pub fn render_run_report(report: &RunReport) -> String {
    let mut out = String::new();
    match &report.outcome {
        RunOutcome::UpToDate => {
            out.push_str(&format!(
                "{} store is up to date at v{}\n",
                "✓".bright_green(),
                report.to_version
            ));
        }
        RunOutcome::FastForwarded => {
            out.push_str(&format!(
                "{} existing schema detected, ledger fast-forwarded to v{}\n",
                "✓".bright_green(),
                report.to_version
            ));
        }
        RunOutcome::Migrated { applied, skipped } => {
            out.push_str(&format!(
                "{} migrated v{} → v{}\n",
                "✓".bright_green(),
                report.from_version,
                report.to_version.to_string().bright_green()
            ));
            for v in applied {
                out.push_str(&format!("  {} v{} applied\n", "●".bright_cyan(), v));
            }
            for v in skipped {
                out.push_str(&format!(
                    "  {} v{} already satisfied, recorded only\n",
                    "○".dimmed(),
                    v
                ));
            }
        }
    }
    if let Some(path) = report.backup.as_ref().and_then(|b| b.path.as_ref()) {
        out.push_str(&format!("  backup: {}\n", path.display()));
    }
    out
}

pub fn render_validation(report: &ValidationReport) -> String {
    if report.is_valid {
        return format!("{} schema matches the application\n", "✓".bright_green());
    }
    let mut out = format!(
        "{} {} schema gap(s)\n",
        "✗".bright_red(),
        report.missing.len()
    );
    for gap in &report.missing {
        out.push_str(&format!("  - {}\n", compact_line(gap, 120)));
    }
    out
}

pub fn render_status(
    current: i64,
    latest: i64,
    state: RunState,
    pending: &[MigrationDefinition],
) -> String {
    let state_label = match state {
        RunState::Current => "current".bright_green(),
        RunState::Behind => "behind".bright_yellow(),
        RunState::Unversioned => "unversioned".bright_yellow(),
    };
    let mut out = format!(
        "current: v{}  latest: v{}  state: {}\n",
        current, latest, state_label
    );
    for def in pending {
        let detail = if def.is_noop() {
            "nothing to execute".to_string()
        } else {
            def.statements
                .iter()
                .map(|op| op.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        out.push_str(&format!(
            "  v{} {}: {}\n",
            def.version,
            def.description,
            compact_line(&detail, 100)
        ));
    }
    out
}

pub fn render_history(records: &[VersionRecord]) -> String {
    if records.is_empty() {
        return "no versions recorded\n".to_string();
    }
    records
        .iter()
        .map(|r| format!("v{:<4} {}  {}\n", r.version, r.applied_at, r.description))
        .collect()
}

pub fn render_backups(backups: &[PathBuf]) -> String {
    if backups.is_empty() {
        return "no backups\n".to_string();
    }
    backups
        .iter()
        .map(|p| format!("{}\n", p.display()))
        .collect()
}
