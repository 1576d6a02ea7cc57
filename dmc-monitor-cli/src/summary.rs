//! Terminal rendering of refresh outcomes and snapshot history.

use dmc_monitor_core::differ::{Delta, DistrictStatus};
use dmc_monitor_core::{RefreshOutcome, ReportPolicy, Snapshot, Warning};
use std::fmt::Write;

/// Largest number of changed metrics listed before summarizing the rest
const MAX_LISTED_CHANGES: usize = 40;

pub fn format_delta(delta: &Delta) -> String {
    match delta {
        Delta::Count(n) => format!("{n:+}"),
        Delta::Measure(v) => format!("{v:+.2}"),
        Delta::Categorical { changed: true } => "changed".to_string(),
        Delta::Categorical { changed: false } => "same".to_string(),
        Delta::Unknown => "unknown".to_string(),
    }
}

pub fn render_snapshot_header(snapshot: &Snapshot) -> String {
    let unresolved = snapshot.unresolved().count();
    let mut line = format!(
        "📄 {} @ {} ({} records",
        snapshot.report_type().display_name(),
        snapshot.published().format("%Y-%m-%d %H:%M"),
        snapshot.records().len()
    );
    if unresolved > 0 {
        let _ = write!(line, ", {unresolved} unresolved");
    }
    line.push(')');
    line
}

pub fn render_totals(snapshot: &Snapshot, policy: &ReportPolicy) -> Option<String> {
    let totals = policy.totals(snapshot);
    if totals.is_empty() {
        return None;
    }
    let parts: Vec<String> = totals
        .iter()
        .map(|(key, value)| format!("{key} {value}"))
        .collect();
    Some(format!("📊 Totals: {}", parts.join(", ")))
}

pub fn render_warnings(warnings: &[Warning]) -> Option<String> {
    if warnings.is_empty() {
        return None;
    }
    let mut out = format!("⚠️  {} warning(s):", warnings.len());
    for warning in warnings {
        let _ = write!(out, "\n   {warning}");
    }
    Some(out)
}

pub fn render_outcome(outcome: &RefreshOutcome, policy: &ReportPolicy) -> String {
    let mut lines = vec![
        render_snapshot_header(&outcome.snapshot),
        format!("   Source: {}", outcome.snapshot.source_url()),
    ];
    lines.extend(render_totals(&outcome.snapshot, policy));

    let diff = &outcome.diff;
    match &diff.previous {
        None => lines.push("🆕 No earlier snapshot; every record is new".to_string()),
        Some(previous) => {
            let changed: Vec<_> = diff.changed().collect();
            if changed.is_empty() {
                lines.push(format!(
                    "✅ No changes since {}",
                    previous.published.format("%Y-%m-%d %H:%M")
                ));
            } else {
                lines.push(format!(
                    "📈 {} change(s) since {}:",
                    changed.len(),
                    previous.published.format("%Y-%m-%d %H:%M")
                ));
                for result in changed.iter().take(MAX_LISTED_CHANGES) {
                    lines.push(format!(
                        "   {:<20} {:<26} {} → {} ({})",
                        result.district.key(),
                        result.metric,
                        result.previous,
                        result.current,
                        format_delta(&result.delta)
                    ));
                }
                if changed.len() > MAX_LISTED_CHANGES {
                    lines.push(format!("   … and {} more", changed.len() - MAX_LISTED_CHANGES));
                }
            }

            for (status, label) in [
                (DistrictStatus::New, "🆕 New"),
                (DistrictStatus::Removed, "🗑️  No longer reported"),
            ] {
                let names: Vec<&str> = diff.with_status(status).map(|d| d.key()).collect();
                if !names.is_empty() {
                    lines.push(format!("{label}: {}", names.join(", ")));
                }
            }
        }
    }

    lines.extend(render_warnings(&outcome.warnings));
    lines.push(if outcome.appended {
        "💾 Snapshot stored".to_string()
    } else {
        "ℹ️  Snapshot already stored; nothing appended".to_string()
    });
    lines.join("\n")
}

/// One line per stored snapshot, oldest first
pub fn render_history(snapshots: &[Snapshot], policy: &ReportPolicy) -> String {
    if snapshots.is_empty() {
        return "📭 No snapshots stored yet".to_string();
    }
    let mut lines = Vec::new();
    for snapshot in snapshots {
        let mut line = format!(
            "{}  {:>3} records",
            snapshot.published().format("%Y-%m-%d %H:%M"),
            snapshot.records().len()
        );
        for (key, value) in policy.totals(snapshot) {
            let _ = write!(line, "  {key}={value}");
        }
        lines.push(line);
    }
    lines.join("\n")
}
