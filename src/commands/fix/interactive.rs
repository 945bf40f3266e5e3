//! Interactive fixing: walk every issue and let the user decide.
//!
//! Each issue code has a dialogue handler. Cancelling any prompt (Esc, or picking `[quit]`)
//! stops the whole run; counts for the issues already answered are kept. Destructive choices
//! in conflict situations ask for one extra confirmation before writing.

use anyhow::Result;
use colored::Colorize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

use super::common::{FixContext, FixOptions, FixOutcome, FixRun, FixSummary};
use super::moves::move_to_directory;
use super::structural::{self, auto_keep, DuplicateStrategy};
use super::values::{self, MergeSide};
use crate::audit::{AuditIssue, FileAuditResult, IssueKind};
use crate::coerce::{coerce_boolean, coerce_number, ScalarKind};
use crate::dates::{normalize_to_iso_date, suggest_iso_date};
use crate::links::{link_target, parse_link, repair_wikilink, wikilink, LinkFormat};
use crate::note::{display_value, is_empty_value};
use crate::output::Output;
use crate::prompt::{self, Prompter};
use crate::schema::{leaf_name, FieldDef, FieldKind, Schema};
use crate::suggest::{best_match, similar_field_candidates};

/// What a handler did with one issue.
enum Step {
    Done(FixOutcome),
    Quit,
}

/// The user's pick from a selection list.
enum Choice {
    /// Index into the caller's options
    Pick(usize),
    Skip,
    Quit,
    Clear,
    Remove,
    Manual,
}

/// Walk every issue in scan order, asking the user how to resolve each one.
pub fn run_interactive_fix(
    results: &[FileAuditResult],
    schema: &Schema,
    vault_dir: &Path,
    options: &FixOptions,
    output: &Output,
    prompter: &mut dyn Prompter,
) -> FixSummary {
    let ctx = FixContext::new(schema, vault_dir, options, output);
    let mut run = FixRun::new(options);

    if options.dry_run {
        output.info(&format!("{}", "Dry run: no files will be changed".yellow()));
    }

    'files: for file in results.iter().filter(|r| !r.issues.is_empty()) {
        let rel = file.relative_path.as_str();
        let mut path = ctx.resolve_path(&file.path);
        output.info(&format!("\n{}", rel.bold()));

        for issue in &file.issues {
            output.info(&format!("  {} {}", issue.code().cyan(), issue.message));
            let outcome = match handle_issue(&ctx, prompter, &mut path, issue) {
                Ok(Step::Done(outcome)) => outcome,
                Ok(Step::Quit) => {
                    output.info("Quitting; remaining issues were left as they are");
                    run.interrupt();
                    break 'files;
                }
                Err(e) => FixOutcome::Failed(format!("{e:#}")),
            };
            run.record(output, rel, issue, &outcome);
        }
    }

    run.finish()
}

fn handle_issue(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &mut PathBuf,
    issue: &AuditIssue,
) -> Result<Step> {
    match &issue.kind {
        IssueKind::OrphanFile { inferred_type } => {
            choose_type(ctx, prompter, path, inferred_type.as_deref(), false)
        }
        IssueKind::InvalidType { value, .. } => {
            let current = value.as_ref().and_then(Value::as_str);
            choose_type(ctx, prompter, path, current, true)
        }
        IssueKind::MissingRequired { field, value }
        | IssueKind::EmptyStringRequired { field, value } => {
            ask_value(ctx, prompter, path, field, value.as_ref())
        }
        IssueKind::InvalidOption {
            field,
            value,
            expected,
            suggestion,
        } => choose_option(
            ctx,
            prompter,
            path,
            field,
            expected,
            suggestion.as_ref().or(value.as_ref()),
        ),
        IssueKind::InvalidSourceType {
            field, candidates, ..
        } => {
            let label = format!("Link '{}' to", field);
            match choose(prompter, &label, candidates, &[prompt::CLEAR_FIELD]) {
                Choice::Pick(i) => done(values::replace_link(
                    ctx,
                    path,
                    field,
                    None,
                    candidate_target(&candidates[i]),
                )),
                Choice::Clear => done(values::clear_field(ctx, path, field, None)),
                other => Ok(leftover(other)),
            }
        }
        IssueKind::UnknownField { field, .. } => migrate_unknown_field(ctx, prompter, path, field),
        IssueKind::WrongDirectory { expected_directory } => {
            let label = format!(
                "Move {} to {}/?",
                ctx.relative(path),
                expected_directory.trim_matches('/')
            );
            if let Some(stop) = gate(prompter, &label) {
                return Ok(stop);
            }
            let (outcome, new_path) = move_to_directory(ctx, path, expected_directory)?;
            if !ctx.store.is_dry_run() {
                *path = new_path;
            }
            Ok(Step::Done(outcome))
        }
        IssueKind::FormatViolation {
            field,
            expected_format,
        } => confirm_then(
            prompter,
            &format!("Convert '{}' to {} links?", field, expected_format),
            || values::convert_format(ctx, path, field, *expected_format),
        ),
        IssueKind::StaleReference {
            field,
            target_name,
            similar_files,
            list_index,
            ..
        } => {
            let label = format!(
                "'{}' points at missing note '{}'. Replace with",
                field, target_name
            );
            let extras = [prompt::ENTER_MANUALLY, prompt::CLEAR_FIELD];
            match choose(prompter, &label, similar_files, &extras) {
                Choice::Pick(i) => done(values::replace_link(
                    ctx,
                    path,
                    field,
                    *list_index,
                    candidate_target(&similar_files[i]),
                )),
                Choice::Manual => {
                    let Some(text) = prompter.input_text("Link target", Some(target_name)) else {
                        return Ok(Step::Quit);
                    };
                    if text.trim().is_empty() {
                        return Ok(Step::Done(FixOutcome::skipped("no target entered")));
                    }
                    done(values::replace_link(ctx, path, field, *list_index, &link_target(&text)))
                }
                Choice::Clear => done(values::clear_field(ctx, path, field, *list_index)),
                other => Ok(leftover(other)),
            }
        }
        IssueKind::AmbiguousLinkTarget {
            field,
            target_name,
            candidates,
            list_index,
        } => {
            let label = format!("'{}' matches several notes. Link '{}' to", target_name, field);
            match choose(prompter, &label, candidates, &[]) {
                Choice::Pick(i) => done(values::replace_link(
                    ctx,
                    path,
                    field,
                    *list_index,
                    candidate_target(&candidates[i]),
                )),
                other => Ok(leftover(other)),
            }
        }
        IssueKind::OwnedNoteReferenced { field, owner_path } => {
            ctx.output.info(&format!(
                "    '{}' links to a note owned by {}; link the owner instead",
                field, owner_path
            ));
            Ok(Step::Done(FixOutcome::skipped(format!(
                "target is owned by {}; needs manual relinking",
                owner_path
            ))))
        }
        IssueKind::ParentCycle { field, cycle_path } => {
            ctx.output
                .info(&format!("    cycle: {}", cycle_path.join(" -> ")));
            let label = format!("Break the cycle through '{}'?", field);
            match choose(prompter, &label, &[], &[prompt::CLEAR_FIELD]) {
                Choice::Clear => done(values::clear_field(ctx, path, field, None)),
                other => Ok(leftover(other)),
            }
        }
        IssueKind::SelfReference { field, list_index } => confirm_then(
            prompter,
            &format!("Remove the self-reference in '{}'?", field),
            || values::clear_field(ctx, path, field, *list_index),
        ),
        IssueKind::InvalidListElement {
            field,
            list_index,
            value,
        } => {
            let shown = value.as_ref().map(display_value).unwrap_or_default();
            confirm_then(
                prompter,
                &format!("Remove element {} ({}) from '{}'?", list_index, shown, field),
                || values::remove_list_element(ctx, path, field, *list_index, value.as_ref()),
            )
        }
        IssueKind::InvalidDateFormat {
            field,
            value,
            suggestion,
        } => fix_date(ctx, prompter, path, field, value.as_ref(), suggestion.as_deref()),
        IssueKind::FrontmatterNotAtTop => confirm_then(
            prompter,
            "Move the frontmatter block to the top of the file?",
            || structural::move_block_to_top(&ctx.store, path),
        ),
        IssueKind::DuplicateFrontmatterKeys { duplicate_key } => {
            resolve_duplicates(ctx, prompter, path, duplicate_key)
        }
        IssueKind::MalformedWikilink {
            field,
            list_index,
            value,
            fixed_value,
        } => {
            let current = value.as_ref().map(display_value).unwrap_or_default();
            let Some(replacement) = fixed_value.clone().or_else(|| repair_wikilink(&current)) else {
                return Ok(Step::Done(FixOutcome::skipped("no repair available")));
            };
            confirm_then(
                prompter,
                &format!("Replace '{}' with '{}'?", current, replacement),
                || {
                    structural::fix_malformed_wikilink(
                        &ctx.store,
                        path,
                        field,
                        *list_index,
                        Some(replacement.as_str()),
                    )
                },
            )
        }
        IssueKind::InvalidBooleanCoercion { field, .. } => confirm_then(
            prompter,
            &format!("Convert '{}' to a boolean?", field),
            || values::coerce_scalar(ctx, path, field, ScalarKind::Boolean),
        ),
        IssueKind::WrongScalarType {
            field,
            expected_type,
            ..
        } => confirm_then(
            prompter,
            &format!("Convert '{}' to a {}?", field, expected_type),
            || values::coerce_scalar(ctx, path, field, *expected_type),
        ),
        IssueKind::UnknownEnumCasing {
            field,
            canonical_value,
            ..
        } => confirm_then(
            prompter,
            &format!("Change '{}' to '{}'?", field, canonical_value),
            || values::set_field(ctx, path, field, &Value::String(canonical_value.clone())),
        ),
        IssueKind::DuplicateListValues { field } => confirm_then(
            prompter,
            &format!("Remove duplicate values from '{}'?", field),
            || values::dedupe_list(ctx, path, field),
        ),
        IssueKind::FrontmatterKeyCasing {
            field,
            canonical_key,
        }
        | IssueKind::SingularPluralMismatch {
            field,
            canonical_key,
        } => rename_or_merge(ctx, prompter, path, field, canonical_key),
        IssueKind::TrailingWhitespace { field } => confirm_then(
            prompter,
            &format!("Trim whitespace from '{}'?", field),
            || values::trim_whitespace(ctx, path, field),
        ),
    }
}

fn done(result: Result<FixOutcome>) -> Result<Step> {
    result.map(Step::Done)
}

/// Ask a yes/no question. `Some` is the step to return early with (declined or quit).
fn gate(prompter: &mut dyn Prompter, label: &str) -> Option<Step> {
    match prompter.confirm(label) {
        Some(true) => None,
        Some(false) => Some(Step::Done(FixOutcome::skipped("declined"))),
        None => Some(Step::Quit),
    }
}

fn confirm_then<F>(prompter: &mut dyn Prompter, label: &str, apply: F) -> Result<Step>
where
    F: FnOnce() -> Result<FixOutcome>,
{
    if let Some(stop) = gate(prompter, label) {
        return Ok(stop);
    }
    done(apply())
}

/// Offer `options` plus `extras`, `[skip]`, and `[quit]`.
fn choose(prompter: &mut dyn Prompter, label: &str, options: &[String], extras: &[&str]) -> Choice {
    let mut all: Vec<String> = options.to_vec();
    all.extend(extras.iter().map(|s| s.to_string()));
    all.push(prompt::SKIP.to_string());
    all.push(prompt::QUIT.to_string());

    let Some(answer) = prompter.select_one(label, &all) else {
        return Choice::Quit;
    };
    if let Some(i) = options.iter().position(|o| *o == answer) {
        return Choice::Pick(i);
    }
    match answer.as_str() {
        prompt::CLEAR_FIELD => Choice::Clear,
        prompt::REMOVE_FIELD => Choice::Remove,
        prompt::ENTER_MANUALLY => Choice::Manual,
        prompt::QUIT => Choice::Quit,
        _ => Choice::Skip,
    }
}

/// Step for a choice the handler has no special meaning for.
fn leftover(choice: Choice) -> Step {
    match choice {
        Choice::Quit => Step::Quit,
        _ => Step::Done(FixOutcome::skipped("skipped")),
    }
}

fn candidate_target(candidate: &str) -> &str {
    candidate.strip_suffix(".md").unwrap_or(candidate)
}

fn choose_type(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &Path,
    hint: Option<&str>,
    replace: bool,
) -> Result<Step> {
    let mut types = ctx.schema.concrete_type_names();
    if types.is_empty() {
        return Ok(Step::Done(FixOutcome::skipped("schema defines no types")));
    }
    if let Some(hinted) = hint.and_then(|h| ctx.schema.type_path(leaf_name(h))) {
        if let Some(pos) = types.iter().position(|t| *t == hinted) {
            let hinted = types.remove(pos);
            types.insert(0, hinted);
        }
    }
    match choose(prompter, "Note type", &types, &[]) {
        Choice::Pick(i) => done(values::inject_type(ctx, path, &types[i], replace)),
        other => Ok(leftover(other)),
    }
}

fn note_type(ctx: &FixContext<'_>, path: &Path) -> Result<Option<String>> {
    let note = ctx.store.read_note(path)?;
    Ok(ctx.schema.resolve_type(&note.frontmatter))
}

fn field_def(ctx: &FixContext<'_>, path: &Path, field: &str) -> Result<Option<FieldDef>> {
    Ok(note_type(ctx, path)?
        .and_then(|type_path| ctx.schema.fields_for_type(&type_path).remove(field)))
}

/// Turn typed text into a value of the field's kind.
fn parse_input(def: Option<&FieldDef>, text: &str) -> Result<Value> {
    let text = text.trim();
    let Some(def) = def else {
        return Ok(Value::String(text.to_string()));
    };
    if def.expects_list() {
        let items = text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect();
        return Ok(Value::Sequence(items));
    }
    Ok(match def.kind {
        FieldKind::Number => match coerce_number(text) {
            Some(n) => Value::Number(n),
            None => anyhow::bail!("'{}' is not a number", text),
        },
        FieldKind::Boolean => match coerce_boolean(text) {
            Some(b) => Value::Bool(b),
            None => anyhow::bail!("'{}' is not a boolean", text),
        },
        FieldKind::Date => Value::String(normalize_to_iso_date(text)?),
        FieldKind::Relation if parse_link(text).style == LinkFormat::Plain => {
            Value::String(wikilink(text))
        }
        _ => Value::String(text.to_string()),
    })
}

fn ask_value(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &Path,
    field: &str,
    default: Option<&Value>,
) -> Result<Step> {
    let def = field_def(ctx, path, field)?;
    let label = format!("Value for '{}'", field);
    let options = def.as_ref().map(|d| d.options.clone()).unwrap_or_default();
    if !options.is_empty() {
        return match choose(prompter, &label, &options, &[]) {
            Choice::Pick(i) => done(values::set_field(
                ctx,
                path,
                field,
                &Value::String(options[i].clone()),
            )),
            other => Ok(leftover(other)),
        };
    }

    let default_text = default.filter(|v| !is_empty_value(v)).map(display_value);
    let Some(text) = prompter.input_text(&label, default_text.as_deref()) else {
        return Ok(Step::Quit);
    };
    if text.trim().is_empty() {
        return Ok(Step::Done(FixOutcome::skipped("no value entered")));
    }
    let value = parse_input(def.as_ref(), &text)?;
    done(values::set_field(ctx, path, field, &value))
}

fn choose_option(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &Path,
    field: &str,
    expected: &[String],
    hint: Option<&Value>,
) -> Result<Step> {
    let mut options = if expected.is_empty() {
        note_type(ctx, path)?
            .map(|type_path| ctx.schema.options_for_field(&type_path, field))
            .unwrap_or_default()
    } else {
        expected.to_vec()
    };
    // The audit's suggestion, or the closest option to the current value
    let closest = hint
        .and_then(Value::as_str)
        .and_then(|h| best_match(h, &options, 2))
        .map(str::to_string);
    if let Some(suggested) = closest {
        if let Some(pos) = options.iter().position(|o| *o == suggested) {
            let suggested = options.remove(pos);
            options.insert(0, suggested);
        }
    }
    let label = format!("Value for '{}'", field);
    match choose(prompter, &label, &options, &[prompt::CLEAR_FIELD]) {
        Choice::Pick(i) => done(values::set_field(
            ctx,
            path,
            field,
            &Value::String(options[i].clone()),
        )),
        Choice::Clear => done(values::clear_field(ctx, path, field, None)),
        other => Ok(leftover(other)),
    }
}

fn migrate_unknown_field(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &Path,
    field: &str,
) -> Result<Step> {
    let note = ctx.store.read_note(path)?;
    let Some(value) = note.frontmatter.get(field).cloned() else {
        return Ok(Step::Done(FixOutcome::skipped(format!(
            "'{}' no longer present",
            field
        ))));
    };
    let candidates = match ctx.schema.resolve_type(&note.frontmatter) {
        Some(type_path) => similar_field_candidates(
            field,
            &ctx.schema.fields_for_type(&type_path),
            Some(&value),
            ctx.similar_field_limit,
        ),
        None => Vec::new(),
    };
    let labels: Vec<String> = candidates
        .iter()
        .map(|c| {
            if c.shape_mismatch {
                format!("{} (different shape)", c.name)
            } else {
                c.name.clone()
            }
        })
        .collect();

    ctx.output
        .info(&format!("    value: {}", display_value(&value)));
    let label = format!("Move '{}' to", field);
    match choose(prompter, &label, &labels, &[prompt::REMOVE_FIELD]) {
        Choice::Pick(i) => {
            let target = &candidates[i].name;
            if candidates[i].shape_mismatch {
                let question = format!(
                    "'{}' expects a different kind of value than {}. Move it anyway?",
                    target,
                    display_value(&value)
                );
                if let Some(stop) = gate(prompter, &question) {
                    return Ok(stop);
                }
            }
            let existing = note
                .frontmatter
                .get(target.as_str())
                .filter(|v| !is_empty_value(v));
            if let Some(existing) = existing {
                let question = format!(
                    "'{}' already holds {}. Overwrite it?",
                    target,
                    display_value(existing)
                );
                if let Some(stop) = gate(prompter, &question) {
                    return Ok(stop);
                }
            }
            done(values::migrate_field(ctx, path, field, target, existing.is_some()))
        }
        Choice::Remove => done(values::remove_field(ctx, path, field)),
        other => Ok(leftover(other)),
    }
}

fn fix_date(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &Path,
    field: &str,
    value: Option<&Value>,
    suggestion: Option<&str>,
) -> Result<Step> {
    let current = value.map(display_value).unwrap_or_default();
    let suggestion = suggestion
        .map(str::to_string)
        .or_else(|| suggest_iso_date(&current));

    if let Some(date) = suggestion {
        match prompter.confirm(&format!("Use {} for '{}'?", date, field)) {
            None => return Ok(Step::Quit),
            Some(true) => {
                return done(values::set_field(ctx, path, field, &Value::String(date)));
            }
            Some(false) => {}
        }
    }

    let label = format!("Date for '{}' (YYYY-MM-DD)", field);
    let Some(text) = prompter.input_text(&label, Some(&current)) else {
        return Ok(Step::Quit);
    };
    if text.trim().is_empty() {
        return Ok(Step::Done(FixOutcome::skipped("no date entered")));
    }
    let date = normalize_to_iso_date(&text)?;
    done(values::set_field(ctx, path, field, &Value::String(date)))
}

fn resolve_duplicates(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &Path,
    key: &str,
) -> Result<Step> {
    let found = structural::duplicate_values(&ctx.store, path, key)?;
    if found.len() < 2 || auto_keep(&found).is_some() {
        return done(structural::resolve_duplicate_key(
            &ctx.store,
            path,
            key,
            DuplicateStrategy::Auto,
        ));
    }

    let (first, last) = (&found[0], &found[found.len() - 1]);
    let options = vec![
        format!("keep first ({})", display_value(first)),
        format!("keep last ({})", display_value(last)),
    ];
    let label = format!("'{}' has {} different values", key, found.len());
    let strategy = match choose(prompter, &label, &options, &[]) {
        Choice::Pick(0) => DuplicateStrategy::KeepFirst,
        Choice::Pick(_) => DuplicateStrategy::KeepLast,
        other => return Ok(leftover(other)),
    };
    let question = format!("Remove the other occurrence(s) of '{}'?", key);
    confirm_then(prompter, &question, || {
        structural::resolve_duplicate_key(&ctx.store, path, key, strategy)
    })
}

fn rename_or_merge(
    ctx: &FixContext<'_>,
    prompter: &mut dyn Prompter,
    path: &Path,
    field: &str,
    canonical: &str,
) -> Result<Step> {
    let note = ctx.store.read_note(path)?;
    let source = note.frontmatter.get(field).filter(|v| !is_empty_value(v));
    let target = note.frontmatter.get(canonical).filter(|v| !is_empty_value(v));

    let (Some(source), Some(target)) = (source, target) else {
        return confirm_then(
            prompter,
            &format!("Rename '{}' to '{}'?", field, canonical),
            || values::rename_key(ctx, path, field, canonical),
        );
    };

    let options = vec![
        format!("keep '{}' value ({})", field, display_value(source)),
        format!("keep '{}' value ({})", canonical, display_value(target)),
    ];
    let label = format!("'{}' and '{}' both have values", field, canonical);
    let (side, discarded) = match choose(prompter, &label, &options, &[]) {
        Choice::Pick(0) => (MergeSide::Source, target),
        Choice::Pick(_) => (MergeSide::Target, source),
        other => return Ok(leftover(other)),
    };
    let question = format!("Discard {}?", display_value(discarded));
    confirm_then(prompter, &question, || {
        values::merge_keys(ctx, path, field, canonical, side)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Severity;
    use crate::note::parse_note_text;
    use crate::prompt::testing::{Answer, ScriptedPrompter};
    use crate::schema::tests::sample_schema;
    use std::fs;
    use tempfile::TempDir;

    const TASK: &str = "---\ntype: objective\nobjective-type: task\n";

    fn issue(kind: IssueKind) -> AuditIssue {
        AuditIssue {
            severity: Severity::Warning,
            message: format!("{} issue", kind.code()),
            auto_fixable: false,
            kind,
        }
    }

    fn trailing(field: &str) -> AuditIssue {
        issue(IssueKind::TrailingWhitespace {
            field: field.to_string(),
        })
    }

    fn file(dir: &TempDir, rel: &str, contents: &str, issues: Vec<AuditIssue>) -> FileAuditResult {
        let path = dir.path().join(rel);
        fs::write(&path, contents).unwrap();
        FileAuditResult {
            path,
            relative_path: rel.to_string(),
            issues,
        }
    }

    fn run(
        dir: &TempDir,
        results: &[FileAuditResult],
        prompter: &mut ScriptedPrompter,
    ) -> FixSummary {
        let schema = sample_schema();
        let output = Output::new(false, true, false);
        run_interactive_fix(
            results,
            &schema,
            dir.path(),
            &FixOptions::default(),
            &output,
            prompter,
        )
    }

    fn frontmatter(dir: &TempDir, rel: &str) -> crate::note::Frontmatter {
        parse_note_text(&fs::read_to_string(dir.path().join(rel)).unwrap())
            .unwrap()
            .frontmatter
    }

    #[test]
    fn test_quit_keeps_counts_of_processed_issues() {
        let dir = TempDir::new().unwrap();
        let body = format!("{TASK}status: 'raw '\ntags: [' a']\n---\n");
        let results = vec![
            file(&dir, "one.md", &body, vec![trailing("status"), trailing("tags")]),
            file(&dir, "two.md", &body, vec![trailing("status"), trailing("tags")]),
            file(&dir, "three.md", &body, vec![trailing("status"), trailing("tags")]),
        ];
        let mut prompter = ScriptedPrompter::new([
            Answer::Yes,
            Answer::Yes,
            Answer::Yes,
            Answer::No,
            Answer::Yes,
            Answer::Cancel,
        ]);

        let summary = run(&dir, &results, &mut prompter);

        assert!(summary.interrupted);
        assert_eq!(summary.fixed, 4);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.remaining, 1);
        assert_eq!(prompter.remaining(), 0);
        assert_eq!(
            frontmatter(&dir, "three.md").get("tags"),
            Some(&Value::Sequence(vec![" a".into()]))
        );
    }

    #[test]
    fn test_quit_sentinel_stops_run() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            &format!("{TASK}---\n"),
            vec![
                issue(IssueKind::ParentCycle {
                    field: "parent".into(),
                    cycle_path: vec!["a".into(), "b".into(), "a".into()],
                }),
                trailing("status"),
            ],
        )];
        let mut prompter = ScriptedPrompter::new([Answer::Pick(prompt::QUIT)]);
        let summary = run(&dir, &results, &mut prompter);
        assert!(summary.interrupted);
        assert_eq!(summary.fixed + summary.skipped + summary.failed, 0);
    }

    #[test]
    fn test_differing_duplicates_need_choice_and_confirmation() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            "---\nstatus: raw\nstatus: done\n---\nbody\n",
            vec![issue(IssueKind::DuplicateFrontmatterKeys {
                duplicate_key: "status".into(),
            })],
        )];
        let mut prompter = ScriptedPrompter::new([Answer::Pick("keep last"), Answer::Yes]);
        let summary = run(&dir, &results, &mut prompter);
        assert_eq!(summary.fixed, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.md")).unwrap(),
            "---\nstatus: done\n---\nbody\n"
        );
    }

    #[test]
    fn test_matching_duplicates_resolve_without_prompt() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            "---\nstatus: raw\nstatus: raw\n---\n",
            vec![issue(IssueKind::DuplicateFrontmatterKeys {
                duplicate_key: "status".into(),
            })],
        )];
        let mut prompter = ScriptedPrompter::new([]);
        let summary = run(&dir, &results, &mut prompter);
        assert_eq!(summary.fixed, 1);
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_key_merge_conflict_confirms() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            &format!("{TASK}Status: active\nstatus: done\n---\n"),
            vec![issue(IssueKind::FrontmatterKeyCasing {
                field: "Status".into(),
                canonical_key: "status".into(),
            })],
        )];
        let mut prompter =
            ScriptedPrompter::new([Answer::Pick("keep 'Status' value"), Answer::No]);
        let summary = run(&dir, &results, &mut prompter);
        assert_eq!(summary.skipped, 1);
        assert_eq!(prompter.asked.len(), 2);

        let mut prompter =
            ScriptedPrompter::new([Answer::Pick("keep 'Status' value"), Answer::Yes]);
        run(&dir, &results, &mut prompter);
        let fm = frontmatter(&dir, "a.md");
        assert_eq!(fm.get("status"), Some(&Value::String("active".into())));
        assert!(fm.get("Status").is_none());
    }

    #[test]
    fn test_unknown_field_picker_flags_shape_mismatch() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            &format!("{TASK}tag: urgent\n---\n"),
            vec![issue(IssueKind::UnknownField {
                field: "tag".into(),
                value: None,
            })],
        )];
        let mut prompter = ScriptedPrompter::new([Answer::Pick("tags"), Answer::Yes]);
        let summary = run(&dir, &results, &mut prompter);
        assert_eq!(summary.fixed, 1);
        assert!(prompter.offered[0].contains(&"tags (different shape)".to_string()));
        assert!(prompter.offered[0].contains(&prompt::REMOVE_FIELD.to_string()));
        assert!(prompter.asked[1].contains("different kind of value"));
        assert_eq!(
            frontmatter(&dir, "a.md").get("tags"),
            Some(&Value::String("urgent".into()))
        );
    }

    #[test]
    fn test_stale_reference_manual_entry() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            &format!("{TASK}parent: '[[Old Plan]]'\n---\n"),
            vec![issue(IssueKind::StaleReference {
                field: "parent".into(),
                value: None,
                target_name: "Old Plan".into(),
                similar_files: vec!["Plan A".into(), "Plan B".into()],
                list_index: None,
            })],
        )];
        let mut prompter = ScriptedPrompter::new([
            Answer::Pick(prompt::ENTER_MANUALLY),
            Answer::Text("New Plan"),
        ]);
        run(&dir, &results, &mut prompter);
        assert_eq!(
            frontmatter(&dir, "a.md").get("parent"),
            Some(&Value::String("[[New Plan]]".into()))
        );
    }

    #[test]
    fn test_emptied_text_answer_skips_without_quitting() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            &format!("{TASK}status: 'raw '\n---\n"),
            vec![
                issue(IssueKind::MissingRequired {
                    field: "priority".into(),
                    value: None,
                }),
                trailing("status"),
            ],
        )];
        let mut prompter = ScriptedPrompter::new([Answer::Text(""), Answer::Yes]);
        let summary = run(&dir, &results, &mut prompter);
        assert!(!summary.interrupted);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.fixed, 1);
        assert_eq!(prompter.remaining(), 0);
        assert!(frontmatter(&dir, "a.md").get("priority").is_none());
    }

    #[test]
    fn test_date_suggestion_declined_then_typed() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            &format!("{TASK}due: 03/05/2024\n---\n"),
            vec![issue(IssueKind::InvalidDateFormat {
                field: "due".into(),
                value: Some("03/05/2024".into()),
                suggestion: None,
            })],
        )];
        let mut prompter = ScriptedPrompter::new([Answer::No, Answer::Text("5.3.2024")]);
        let summary = run(&dir, &results, &mut prompter);
        assert_eq!(summary.fixed, 1);
        assert!(prompter.asked[0].contains("2024-03-05"));
        assert_eq!(
            frontmatter(&dir, "a.md").get("due"),
            Some(&Value::String("2024-03-05".into()))
        );
    }

    #[test]
    fn test_orphan_offers_inferred_type_first() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            "---\nstatus: raw\n---\n",
            vec![issue(IssueKind::OrphanFile {
                inferred_type: Some("milestone".into()),
            })],
        )];
        let mut prompter = ScriptedPrompter::new([Answer::Pick("objective/milestone")]);
        run(&dir, &results, &mut prompter);
        assert_eq!(prompter.offered[0][0], "objective/milestone");
        let fm = frontmatter(&dir, "a.md");
        assert_eq!(fm.get("objective-type"), Some(&Value::String("milestone".into())));
    }

    #[test]
    fn test_failures_are_recorded_not_fatal() {
        let dir = TempDir::new().unwrap();
        let results = vec![file(
            &dir,
            "a.md",
            &format!("{TASK}priority: high\n---\n"),
            vec![
                issue(IssueKind::WrongScalarType {
                    field: "priority".into(),
                    value: None,
                    expected_type: ScalarKind::Number,
                }),
                issue(IssueKind::OwnedNoteReferenced {
                    field: "parent".into(),
                    owner_path: "Objectives/Owner.md".into(),
                }),
            ],
        )];
        let mut prompter = ScriptedPrompter::new([Answer::Yes]);
        let summary = run(&dir, &results, &mut prompter);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.remaining, 2);
        assert_eq!(summary.manual_review[0].issue.code(), "wrong-scalar-type");
    }
}
