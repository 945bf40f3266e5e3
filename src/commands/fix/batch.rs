//! Unattended fixing: apply every fix that is safe without a human, defer the rest.
//!
//! Per file the order is:
//! 1. scalar coercions
//! 2. directory moves (later fixes use the new path)
//! 3. a second look at issues not flagged auto-fixable, resolving confident stale references
//!    and unambiguous field migrations
//! 4. everything still unresolved goes to manual review
//! 5. the remaining auto-fixable issues, per code
//!
//! Migrations that wait on a pending key rename for the same field run after step 5.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::Path;

use super::common::{contain, FixContext, FixOptions, FixOutcome, FixRun, FixSummary};
use super::moves::move_to_directory;
use super::structural::{self, DuplicateStrategy};
use super::values;
use crate::audit::{AuditIssue, FileAuditResult, IssueKind};
use crate::coerce::ScalarKind;
use crate::output::Output;
use crate::schema::Schema;
use crate::suggest::{auto_migration_target, single_confident_candidate};

/// Fix everything safe across all files and return the run summary.
pub fn run_auto_fix(
    results: &[FileAuditResult],
    schema: &Schema,
    vault_dir: &Path,
    options: &FixOptions,
    output: &Output,
) -> FixSummary {
    let ctx = FixContext::new(schema, vault_dir, options, output);
    let mut run = FixRun::new(options);

    if options.dry_run {
        output.info(&format!("{}", "Dry run: no files will be changed".yellow()));
    }
    let total: usize = results.iter().map(|r| r.issues.len()).sum();
    output.info(&format!(
        "Fixing {} issue(s) in {} file(s)",
        total,
        results.iter().filter(|r| !r.issues.is_empty()).count()
    ));

    for file in results.iter().filter(|r| !r.issues.is_empty()) {
        fix_file(&ctx, file, &mut run);
    }

    run.finish()
}

fn fix_file(ctx: &FixContext<'_>, file: &FileAuditResult, run: &mut FixRun) {
    let rel = file.relative_path.as_str();
    let mut path = ctx.resolve_path(&file.path);
    ctx.output.info(&format!("{}", rel.bold()));

    let (fixable, manual): (Vec<&AuditIssue>, Vec<&AuditIssue>) =
        file.issues.iter().partition(|issue| issue.auto_fixable);

    // 1. scalar coercions
    let (coercions, fixable): (Vec<&AuditIssue>, Vec<&AuditIssue>) = fixable
        .into_iter()
        .partition(|issue| issue.kind.is_scalar_coercion());
    for issue in coercions {
        let outcome = contain(apply_coercion(ctx, &path, issue));
        run.record(ctx.output, rel, issue, &outcome);
    }

    // 2. directory moves
    let mut pending = Vec::with_capacity(fixable.len());
    for issue in fixable {
        let IssueKind::WrongDirectory { expected_directory } = &issue.kind else {
            pending.push(issue);
            continue;
        };
        let outcome = match move_to_directory(ctx, &path, expected_directory) {
            Ok((outcome, new_path)) => {
                // A dry run leaves the note where it is; later fixes must still read it.
                if !ctx.store.is_dry_run() {
                    path = new_path;
                }
                outcome
            }
            Err(e) => FixOutcome::Failed(format!("{e:#}")),
        };
        run.record(ctx.output, rel, issue, &outcome);
    }

    // 3. second look at issues not flagged auto-fixable
    let mut deferred = Vec::new();
    let mut unresolved = Vec::new();
    for issue in manual {
        match &issue.kind {
            IssueKind::StaleReference {
                field,
                target_name,
                similar_files,
                list_index,
                ..
            } => {
                if let Some(candidate) = single_confident_candidate(target_name, similar_files) {
                    let target = candidate_target(candidate);
                    let outcome =
                        contain(values::replace_link(ctx, &path, field, *list_index, target));
                    run.record(ctx.output, rel, issue, &outcome);
                    continue;
                }
            }
            IssueKind::UnknownField { field, .. } => {
                if pending.iter().any(|p| p.kind.renames_field(field)) {
                    deferred.push(issue);
                    continue;
                }
                if let Ok(Migration::Target(target)) = plan_migration(ctx, &path, field) {
                    let outcome = contain(values::migrate_field(ctx, &path, field, &target, false));
                    run.record(ctx.output, rel, issue, &outcome);
                    continue;
                }
            }
            _ => {}
        }
        unresolved.push(issue);
    }

    // 4. manual review
    for issue in unresolved {
        ctx.output.verbose(&format!("  - {} needs manual review", issue.code()));
        run.needs_review(rel, issue);
    }

    // 5. everything else, per code
    for issue in pending {
        let outcome = contain(apply_fix(ctx, &path, issue));
        run.record(ctx.output, rel, issue, &outcome);
    }

    for issue in deferred {
        let IssueKind::UnknownField { field, .. } = &issue.kind else {
            continue;
        };
        match plan_migration(ctx, &path, field) {
            Ok(Migration::Target(target)) => {
                let outcome = contain(values::migrate_field(ctx, &path, field, &target, false));
                run.record(ctx.output, rel, issue, &outcome);
            }
            Ok(Migration::Gone) => {
                ctx.output
                    .verbose(&format!("  - '{}' was resolved by a rename", field));
            }
            Ok(Migration::Unresolved) | Err(_) => run.needs_review(rel, issue),
        }
    }
}

/// Similar-file entries may carry a `.md` extension; link targets don't.
fn candidate_target(candidate: &str) -> &str {
    candidate.strip_suffix(".md").unwrap_or(candidate)
}

enum Migration {
    /// The field no longer exists in the note
    Gone,
    Target(String),
    Unresolved,
}

fn plan_migration(ctx: &FixContext<'_>, path: &Path, field: &str) -> Result<Migration> {
    let note = ctx.store.read_note(path)?;
    let Some(value) = note.frontmatter.get(field) else {
        return Ok(Migration::Gone);
    };
    Ok(
        match auto_migration_target(ctx.schema, &note.frontmatter, field, Some(value)) {
            Some(target) => Migration::Target(target),
            None => Migration::Unresolved,
        },
    )
}

fn apply_coercion(ctx: &FixContext<'_>, path: &Path, issue: &AuditIssue) -> Result<FixOutcome> {
    let (field, kind) = match &issue.kind {
        IssueKind::InvalidBooleanCoercion { field, .. } => (field, ScalarKind::Boolean),
        IssueKind::WrongScalarType {
            field,
            expected_type,
            ..
        } => (field, *expected_type),
        _ => bail!("not a scalar coercion: {}", issue.code()),
    };
    Ok(match values::coerce_scalar(ctx, path, field, kind)? {
        FixOutcome::Fixed(message) => FixOutcome::Fixed(format!("coerced {}", message)),
        other => other,
    })
}

fn supplied<'v>(value: &'v Option<serde_yaml::Value>, what: &str) -> Result<&'v serde_yaml::Value> {
    match value {
        Some(value) => Ok(value),
        None => bail!("no {} supplied", what),
    }
}

/// Unattended fix for one auto-fixable issue.
fn apply_fix(ctx: &FixContext<'_>, path: &Path, issue: &AuditIssue) -> Result<FixOutcome> {
    match &issue.kind {
        IssueKind::OrphanFile { inferred_type } => match inferred_type {
            Some(type_path) => values::inject_type(ctx, path, type_path, false),
            None => Ok(FixOutcome::skipped("no type could be inferred")),
        },
        IssueKind::MissingRequired { field, value }
        | IssueKind::EmptyStringRequired { field, value } => {
            values::set_field(ctx, path, field, supplied(value, "default value")?)
        }
        IssueKind::InvalidOption {
            field, suggestion, ..
        }
        | IssueKind::InvalidSourceType {
            field, suggestion, ..
        } => values::set_field(ctx, path, field, supplied(suggestion, "suggestion")?),
        IssueKind::UnknownField { field, .. } => match plan_migration(ctx, path, field)? {
            Migration::Target(target) => values::migrate_field(ctx, path, field, &target, false),
            Migration::Gone => Ok(FixOutcome::skipped(format!("'{}' no longer present", field))),
            Migration::Unresolved => Ok(FixOutcome::skipped(
                "no unambiguous schema field to migrate to",
            )),
        },
        IssueKind::WrongDirectory { expected_directory } => {
            move_to_directory(ctx, path, expected_directory).map(|(outcome, _)| outcome)
        }
        IssueKind::FormatViolation {
            field,
            expected_format,
        } => values::convert_format(ctx, path, field, *expected_format),
        IssueKind::StaleReference {
            field,
            target_name,
            similar_files,
            list_index,
            ..
        } => match single_confident_candidate(target_name, similar_files) {
            Some(candidate) => {
                values::replace_link(ctx, path, field, *list_index, candidate_target(candidate))
            }
            None => Ok(FixOutcome::skipped("no single confident replacement")),
        },
        IssueKind::InvalidDateFormat {
            field, suggestion, ..
        } => match suggestion {
            Some(date) => {
                values::set_field(ctx, path, field, &serde_yaml::Value::String(date.clone()))
            }
            None => bail!("no normalized date supplied"),
        },
        IssueKind::FrontmatterNotAtTop => structural::move_block_to_top(&ctx.store, path),
        IssueKind::DuplicateFrontmatterKeys { duplicate_key } => {
            structural::resolve_duplicate_key(
                &ctx.store,
                path,
                duplicate_key,
                DuplicateStrategy::Auto,
            )
        }
        IssueKind::MalformedWikilink {
            field,
            list_index,
            fixed_value,
            ..
        } => structural::fix_malformed_wikilink(
            &ctx.store,
            path,
            field,
            *list_index,
            fixed_value.as_deref(),
        ),
        IssueKind::InvalidBooleanCoercion { .. } | IssueKind::WrongScalarType { .. } => {
            apply_coercion(ctx, path, issue)
        }
        IssueKind::UnknownEnumCasing {
            field,
            canonical_value,
            ..
        } => values::set_field(
            ctx,
            path,
            field,
            &serde_yaml::Value::String(canonical_value.clone()),
        ),
        IssueKind::DuplicateListValues { field } => values::dedupe_list(ctx, path, field),
        IssueKind::FrontmatterKeyCasing {
            field,
            canonical_key,
        }
        | IssueKind::SingularPluralMismatch {
            field,
            canonical_key,
        } => values::rename_key(ctx, path, field, canonical_key),
        IssueKind::TrailingWhitespace { field } => values::trim_whitespace(ctx, path, field),
        IssueKind::InvalidType { .. }
        | IssueKind::AmbiguousLinkTarget { .. }
        | IssueKind::OwnedNoteReferenced { .. }
        | IssueKind::ParentCycle { .. }
        | IssueKind::SelfReference { .. }
        | IssueKind::InvalidListElement { .. } => {
            Ok(FixOutcome::skipped("requires interactive fix"))
        }
    }
}
