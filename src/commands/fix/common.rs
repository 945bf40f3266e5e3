//! Common types for fix runs.
//!
//! Both orchestrators produce the same shapes: one [`FixResult`] per issue answered, folded into
//! a [`FixSummary`], plus the set of issues left for manual review.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::audit::AuditIssue;
use crate::note::{Frontmatter, NoteStore};
use crate::output::Output;
use crate::schema::Schema;

/// Default number of candidates offered when migrating an unknown field.
pub const DEFAULT_SIMILAR_FIELD_LIMIT: usize = 5;

/// What a single fix attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    Fixed(String),
    /// Nothing was written; the message says why
    Skipped(String),
    Failed(String),
}

impl FixOutcome {
    pub fn fixed(message: impl Into<String>) -> Self {
        FixOutcome::Fixed(message.into())
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        FixOutcome::Skipped(message.into())
    }

    pub fn action(&self) -> FixAction {
        match self {
            FixOutcome::Fixed(_) => FixAction::Fixed,
            FixOutcome::Skipped(_) => FixAction::Skipped,
            FixOutcome::Failed(_) => FixAction::Failed,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FixOutcome::Fixed(m) | FixOutcome::Skipped(m) | FixOutcome::Failed(m) => m,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, FixOutcome::Fixed(_))
    }
}

/// Turn an error raised inside one fix into a `Failed` outcome carrying the full chain.
pub fn contain(result: Result<FixOutcome>) -> FixOutcome {
    result.unwrap_or_else(|e| FixOutcome::Failed(format!("{e:#}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixAction {
    Fixed,
    Skipped,
    Failed,
}

/// Outcome of one fix attempt for one issue.
#[derive(Debug, Clone)]
pub struct FixResult<'a> {
    pub file: &'a str,
    pub issue: &'a AuditIssue,
    pub action: FixAction,
    /// Present whenever the issue was not fixed
    pub message: Option<String>,
}

impl<'a> FixResult<'a> {
    pub fn new(file: &'a str, issue: &'a AuditIssue, outcome: &FixOutcome) -> Self {
        let action = outcome.action();
        let message = match outcome {
            FixOutcome::Fixed(m) if m.is_empty() => None,
            other => Some(other.message().to_string()),
        };
        Self {
            file,
            issue,
            action,
            message,
        }
    }
}

/// An issue still needing human attention at the end of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualReviewEntry {
    pub file: String,
    #[serde(flatten)]
    pub issue: AuditIssue,
}

/// Deduplicating collector for manual-review entries, keyed by (file, code, field, message).
#[derive(Debug, Default)]
pub struct ManualReview {
    entries: Vec<ManualReviewEntry>,
    seen: HashSet<(String, &'static str, Option<String>, String)>,
}

impl ManualReview {
    pub fn add(&mut self, file: &str, issue: &AuditIssue) {
        let key = (
            file.to_string(),
            issue.code(),
            issue.field().map(str::to_string),
            issue.message.clone(),
        );
        if self.seen.insert(key) {
            self.entries.push(ManualReviewEntry {
                file: file.to_string(),
                issue: issue.clone(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ManualReviewEntry> {
        self.entries
    }
}

/// Aggregate of a whole fix run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSummary {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub fixed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Issues still needing manual review
    pub remaining: usize,
    /// The user quit an interactive run before it finished
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
    pub manual_review: Vec<ManualReviewEntry>,
}

impl FixSummary {
    pub fn new(dry_run: bool, reason: Option<String>) -> Self {
        Self {
            dry_run,
            reason,
            ..Default::default()
        }
    }

    pub fn record(&mut self, action: FixAction) {
        match action {
            FixAction::Fixed => self.fixed += 1,
            FixAction::Skipped => self.skipped += 1,
            FixAction::Failed => self.failed += 1,
        }
    }

    /// Fold in the manual-review set once the run is over.
    pub fn finish(&mut self, review: ManualReview) {
        self.remaining = review.len();
        self.manual_review = review.into_entries();
    }

    /// Nothing failed and nothing is left for manual review.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.remaining == 0 && !self.interrupted
    }
}

/// Running totals and the manual-review set for one run.
#[derive(Debug)]
pub struct FixRun {
    summary: FixSummary,
    review: ManualReview,
}

impl FixRun {
    pub fn new(options: &FixOptions) -> Self {
        Self {
            summary: FixSummary::new(options.dry_run, options.dry_run_reason.clone()),
            review: ManualReview::default(),
        }
    }

    /// Report one outcome, count it, and send anything not fixed to manual review.
    pub fn record(
        &mut self,
        output: &Output,
        file: &str,
        issue: &AuditIssue,
        outcome: &FixOutcome,
    ) {
        let result = FixResult::new(file, issue, outcome);
        print_fix_result(output, &result);
        self.summary.record(result.action);
        if result.action != FixAction::Fixed {
            self.review.add(file, issue);
        }
    }

    /// Register an issue for manual review without attempting a fix.
    pub fn needs_review(&mut self, file: &str, issue: &AuditIssue) {
        self.review.add(file, issue);
    }

    pub fn interrupt(&mut self) {
        self.summary.interrupted = true;
    }

    pub fn finish(mut self) -> FixSummary {
        self.summary.finish(self.review);
        self.summary
    }
}

/// Options shared by both orchestrators.
#[derive(Debug, Clone)]
pub struct FixOptions {
    pub dry_run: bool,
    /// Shown in the summary so a reader knows why nothing was written
    pub dry_run_reason: Option<String>,
    pub similar_field_limit: usize,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            dry_run_reason: None,
            similar_field_limit: DEFAULT_SIMILAR_FIELD_LIMIT,
        }
    }
}

/// Read-only handle passed to every fix.
pub struct FixContext<'a> {
    pub schema: &'a Schema,
    pub vault_dir: &'a Path,
    pub store: NoteStore,
    pub output: &'a Output,
    pub similar_field_limit: usize,
}

impl<'a> FixContext<'a> {
    pub fn new(
        schema: &'a Schema,
        vault_dir: &'a Path,
        options: &FixOptions,
        output: &'a Output,
    ) -> Self {
        Self {
            schema,
            vault_dir,
            store: NoteStore::new(options.dry_run),
            output,
            similar_field_limit: options.similar_field_limit,
        }
    }

    /// Schema field order for the note's resolved type, or none if the type is unknown.
    pub fn field_order_for(&self, frontmatter: &Frontmatter) -> Vec<String> {
        self.schema
            .resolve_type(frontmatter)
            .map(|type_path| self.schema.field_order(&type_path))
            .unwrap_or_default()
    }

    /// Vault-relative display path.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.vault_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.vault_dir.join(path)
        }
    }
}

/// Print one result line to the status stream.
pub fn print_fix_result(output: &Output, result: &FixResult<'_>) {
    let field = result
        .issue
        .field()
        .map(|f| format!(" [{}]", f))
        .unwrap_or_default();
    let detail = result.message.as_deref().unwrap_or("fixed");
    let line = match result.action {
        FixAction::Fixed => format!(
            "  {} {}{}: {}",
            "✓".green(),
            result.issue.code(),
            field,
            detail
        ),
        FixAction::Skipped => format!(
            "  {} {}{}: {}",
            "⊘".yellow(),
            result.issue.code(),
            field,
            detail
        ),
        FixAction::Failed => format!(
            "  {} {}{}: {}",
            "✗".red(),
            result.issue.code(),
            field,
            detail.red()
        ),
    };
    output.info(&line);
}
