//! End-of-run reporting: the summary line and the grouped manual-review list.

use colored::Colorize;
use std::collections::BTreeMap;

use super::common::{FixSummary, ManualReviewEntry};

/// Manual-review entries grouped by issue code, codes in alphabetical order.
pub fn group_by_code(
    entries: &[ManualReviewEntry],
) -> BTreeMap<&'static str, Vec<&ManualReviewEntry>> {
    let mut groups: BTreeMap<&'static str, Vec<&ManualReviewEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.issue.code()).or_default().push(entry);
    }
    groups
}

/// Human-readable report for stdout.
pub fn format_human(summary: &FixSummary) -> String {
    let mut out = String::new();

    if summary.dry_run {
        out.push_str(&format!("{}", "Dry run: no files were changed".yellow().bold()));
        if let Some(reason) = &summary.reason {
            out.push_str(&format!(" ({})", reason));
        }
        out.push('\n');
    }
    if summary.interrupted {
        out.push_str(&format!("{}\n", "Stopped early; remaining issues were not visited".yellow()));
    }

    out.push_str(&format!(
        "{} fixed, {} skipped, {} failed, {} remaining\n",
        summary.fixed.to_string().green(),
        summary.skipped.to_string().yellow(),
        if summary.failed > 0 {
            summary.failed.to_string().red()
        } else {
            summary.failed.to_string().normal()
        },
        summary.remaining
    ));

    if summary.manual_review.is_empty() {
        return out;
    }

    out.push_str(&format!("\n{}\n", "Needs manual review:".bold()));
    for (code, entries) in group_by_code(&summary.manual_review) {
        out.push_str(&format!("  {} ({})\n", code.cyan(), entries.len()));
        for entry in entries {
            out.push_str(&format!("    {}: {}\n", entry.file, entry.issue.message));
        }
    }
    out
}
