//! Value fixes on the parsed frontmatter mapping.
//!
//! Every fix re-reads the note, edits the mapping, and rewrites the whole note in the schema's
//! field order, so a fix always sees the result of the one before it.

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::Path;

use super::common::{FixContext, FixOutcome};
use crate::coerce::ScalarKind;
use crate::links::{convert_link, retarget, LinkFormat};
use crate::note::{display_value, is_empty_value, parse_note_text, Frontmatter};
use crate::schema::{discriminator_fields, leaf_name};
use crate::splice;

/// Read, edit, and write back a note. Only `Fixed` outcomes are written.
///
/// A note whose header block sits below other content is refused: rendering would put a fresh
/// header on top and leave the real one in the body.
fn edit_note<F>(ctx: &FixContext<'_>, path: &Path, edit: F) -> Result<FixOutcome>
where
    F: FnOnce(&mut Frontmatter) -> Result<FixOutcome>,
{
    let text = ctx.store.read_text(path)?;
    let scan = splice::scan(&text);
    let misplaced = match scan.primary() {
        Some(block) => !splice::is_at_top(&text, block),
        None => scan.unterminated,
    };
    if misplaced {
        bail!(
            "frontmatter is not at the top of {}; move it before editing",
            path.display()
        );
    }
    let note =
        parse_note_text(&text).with_context(|| format!("parse note: {}", path.display()))?;
    let mut frontmatter = note.frontmatter;
    let outcome = edit(&mut frontmatter)?;
    if outcome.is_fixed() {
        let order = ctx.field_order_for(&frontmatter);
        ctx.store.write_note(path, &frontmatter, &note.body, &order)?;
    }
    Ok(outcome)
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

fn require<'m>(frontmatter: &'m Frontmatter, field: &str) -> Result<&'m Value> {
    match frontmatter.get(field) {
        Some(value) => Ok(value),
        None => bail!("field '{}' not found", field),
    }
}

fn require_mut<'m>(frontmatter: &'m mut Frontmatter, field: &str) -> Result<&'m mut Value> {
    match frontmatter.get_mut(field) {
        Some(value) => Ok(value),
        None => bail!("field '{}' not found", field),
    }
}

/// Replace key `old` with `new` at the same position, carrying `value`.
fn rekey(frontmatter: &Frontmatter, old: &str, new: &str, value: Value) -> Frontmatter {
    let mut out = Mapping::with_capacity(frontmatter.len());
    for (k, v) in frontmatter {
        if k.as_str() == Some(old) {
            out.insert(key(new), value.clone());
        } else if k.as_str() != Some(new) {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

pub fn set_field(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    value: &Value,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        fm.insert(key(field), value.clone());
        Ok(FixOutcome::fixed(format!(
            "set '{}' to {}",
            field,
            display_value(value)
        )))
    })
}

pub fn remove_field(ctx: &FixContext<'_>, path: &Path, field: &str) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| match fm.shift_remove(field) {
        Some(_) => Ok(FixOutcome::fixed(format!("removed '{}'", field))),
        None => Ok(FixOutcome::skipped(format!("'{}' already absent", field))),
    })
}

/// Empty a field, or drop one element when it is a list.
pub fn clear_field(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    list_index: Option<usize>,
) -> Result<FixOutcome> {
    match list_index {
        Some(index) => remove_list_element(ctx, path, field, index, None),
        None => edit_note(ctx, path, |fm| {
            *require_mut(fm, field)? = Value::Null;
            Ok(FixOutcome::fixed(format!("cleared '{}'", field)))
        }),
    }
}

/// Drop element `index` of a list field. With `expected`, the element must still hold that
/// value, so a list edited since the audit isn't trimmed at the wrong spot.
pub fn remove_list_element(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    index: usize,
    expected: Option<&Value>,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let Value::Sequence(items) = require_mut(fm, field)? else {
            bail!("'{}' is not a list", field);
        };
        let Some(current) = items.get(index) else {
            bail!("'{}' has no element {}", field, index);
        };
        if let Some(expected) = expected {
            if current != expected {
                bail!(
                    "element {} of '{}' is {} (expected {}); list changed since the audit",
                    index,
                    field,
                    display_value(current),
                    display_value(expected)
                );
            }
        }
        let removed = items.remove(index);
        Ok(FixOutcome::fixed(format!(
            "removed {} from '{}'",
            display_value(&removed),
            field
        )))
    })
}

/// Point a link (or one list element) at `new_target`, keeping the link's style and alias.
pub fn replace_link(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    list_index: Option<usize>,
    new_target: &str,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let value = require_mut(fm, field)?;
        let slot = match (value, list_index) {
            (Value::Sequence(items), Some(index)) => match items.get_mut(index) {
                Some(slot) => slot,
                None => bail!("'{}' has no element {}", field, index),
            },
            (Value::Sequence(_), None) => {
                bail!("'{}' is a list; an element index is required", field)
            }
            (slot, _) => slot,
        };
        let old = match &*slot {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => bail!(
                "'{}' holds a {}, not a link",
                field,
                crate::note::describe_value(other)
            ),
        };
        let new = retarget(&old, new_target);
        *slot = Value::String(new.clone());
        Ok(FixOutcome::fixed(format!("'{}' -> '{}'", old, new)))
    })
}

/// Re-render a link field (or each string element of a list) in another style.
pub fn convert_format(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    format: LinkFormat,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let value = require_mut(fm, field)?;
        let changed = match value {
            Value::String(s) => convert_in_place(s, format),
            Value::Sequence(items) => items
                .iter_mut()
                .filter_map(|item| match item {
                    Value::String(s) => Some(convert_in_place(s, format)),
                    _ => None,
                })
                .fold(false, |acc, changed| acc || changed),
            other => bail!(
                "'{}' holds a {}; only strings and lists convert",
                field,
                crate::note::describe_value(other)
            ),
        };
        if !changed {
            return Ok(FixOutcome::skipped(format!(
                "'{}' already uses {} links",
                field, format
            )));
        }
        Ok(FixOutcome::fixed(format!("converted '{}' to {} links", field, format)))
    })
}

fn convert_in_place(text: &mut String, format: LinkFormat) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let converted = convert_link(text, format);
    if converted == *text {
        return false;
    }
    *text = converted;
    true
}

/// Coerce a string value to a boolean or number.
pub fn coerce_scalar(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    kind: ScalarKind,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let value = require_mut(fm, field)?;
        if kind.matches(value) {
            return Ok(FixOutcome::skipped(format!("'{}' is already a {}", field, kind)));
        }
        let text = match &*value {
            Value::String(text) => text.clone(),
            other => bail!(
                "'{}' holds a {}; only strings can be coerced",
                field,
                crate::note::describe_value(other)
            ),
        };
        let Some(coerced) = kind.coerce(&text) else {
            bail!("cannot convert '{}' to a {}", text, kind);
        };
        let message = format!("'{}': '{}' -> {}", field, text, display_value(&coerced));
        *value = coerced;
        Ok(FixOutcome::fixed(message))
    })
}

/// Remove case-insensitive duplicates from a list, keeping first occurrences in order.
pub fn dedupe_list(ctx: &FixContext<'_>, path: &Path, field: &str) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let Value::Sequence(items) = require_mut(fm, field)? else {
            bail!("'{}' is not a list", field);
        };
        let before = items.len();
        *items = dedupe_values(std::mem::take(items));
        let removed = before - items.len();
        if removed == 0 {
            return Ok(FixOutcome::skipped(format!("'{}' has no duplicates", field)));
        }
        Ok(FixOutcome::fixed(format!(
            "removed {} duplicate(s) from '{}'",
            removed, field
        )))
    })
}

pub fn dedupe_values(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(display_value(item).to_lowercase()))
        .collect()
}

/// Trim surrounding whitespace from a string value or each string element of a list.
pub fn trim_whitespace(ctx: &FixContext<'_>, path: &Path, field: &str) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let mut changed = false;
        let mut trim = |s: &mut String| {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
                changed = true;
            }
        };
        match require_mut(fm, field)? {
            Value::String(s) => trim(s),
            Value::Sequence(items) => {
                for item in items.iter_mut() {
                    if let Value::String(s) = item {
                        trim(s);
                    }
                }
            }
            _ => {}
        }
        if !changed {
            return Ok(FixOutcome::skipped(format!("'{}' has no surrounding whitespace", field)));
        }
        Ok(FixOutcome::fixed(format!("trimmed '{}'", field)))
    })
}

/// Rename `field` to `canonical`. Fails when both keys hold non-empty values.
pub fn rename_key(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    canonical: &str,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let source = require(fm, field)?.clone();
        let target_occupied = fm.get(canonical).is_some_and(|v| !is_empty_value(v));
        if target_occupied && !is_empty_value(&source) {
            bail!(
                "'{}' and '{}' both have values; manual merge required",
                field,
                canonical
            );
        }
        if target_occupied {
            fm.shift_remove(field);
            return Ok(FixOutcome::fixed(format!(
                "removed empty '{}' (kept '{}')",
                field, canonical
            )));
        }
        *fm = rekey(fm, field, canonical, source);
        Ok(FixOutcome::fixed(format!("renamed '{}' to '{}'", field, canonical)))
    })
}

/// Which value survives when two keys are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSide {
    /// Keep the value under the key being renamed
    Source,
    /// Keep the value already under the canonical key
    Target,
}

/// Merge `field` into `canonical`, keeping the chosen side's value.
pub fn merge_keys(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    canonical: &str,
    keep: MergeSide,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let source = require(fm, field)?.clone();
        match keep {
            MergeSide::Source => {
                fm.shift_remove(canonical);
                *fm = rekey(fm, field, canonical, source);
            }
            MergeSide::Target => {
                fm.shift_remove(field);
            }
        }
        let kept = match keep {
            MergeSide::Source => field,
            MergeSide::Target => canonical,
        };
        Ok(FixOutcome::fixed(format!(
            "merged '{}' into '{}' keeping the '{}' value",
            field, canonical, kept
        )))
    })
}

/// Move an unknown field's value onto a schema field. An occupied target needs `overwrite`.
pub fn migrate_field(
    ctx: &FixContext<'_>,
    path: &Path,
    field: &str,
    target: &str,
    overwrite: bool,
) -> Result<FixOutcome> {
    edit_note(ctx, path, |fm| {
        let Some(value) = fm.get(field).cloned() else {
            return Ok(FixOutcome::skipped(format!("'{}' no longer present", field)));
        };
        let occupied = fm.get(target).is_some_and(|v| !is_empty_value(v));
        if occupied && !overwrite {
            bail!("'{}' already has a value; not overwriting", target);
        }
        fm.shift_remove(target);
        *fm = rekey(fm, field, target, value);
        Ok(FixOutcome::fixed(format!("migrated '{}' to '{}'", field, target)))
    })
}

/// Set the discriminator fields for a type (full path or leaf name). With `replace`, existing
/// discriminators go first; otherwise a note that already has a type is left alone.
pub fn inject_type(
    ctx: &FixContext<'_>,
    path: &Path,
    type_path: &str,
    replace: bool,
) -> Result<FixOutcome> {
    let Some(type_path) = ctx.schema.type_path(leaf_name(type_path)) else {
        bail!("unknown type '{}'", type_path);
    };
    let type_path = type_path.as_str();
    edit_note(ctx, path, |fm| {
        let has_type = fm.get("type").is_some_and(|v| !is_empty_value(v));
        if has_type && !replace {
            return Ok(FixOutcome::skipped("note already has a type"));
        }
        let mut updated = discriminator_fields(type_path);
        for (k, v) in fm.iter() {
            let is_discriminator = k
                .as_str()
                .is_some_and(|name| ctx.schema.is_discriminator_key(name));
            if replace && is_discriminator {
                continue;
            }
            if !updated.contains_key(k) {
                updated.insert(k.clone(), v.clone());
            }
        }
        *fm = updated;
        Ok(FixOutcome::fixed(format!("set type to '{}'", type_path)))
    })
}
