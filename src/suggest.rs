//! Name similarity heuristics: edit distance, high-confidence matches, and field migration
//! candidates for unknown frontmatter keys.

use serde_yaml::Value;
use std::collections::BTreeMap;

use crate::note::{is_empty_value, Frontmatter};
use crate::schema::{FieldDef, Schema};

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            cur[j + 1] = std::cmp::min(std::cmp::min(cur[j] + 1, prev[j + 1] + 1), prev[j] + cost);
        }
        prev.clone_from_slice(&cur);
    }

    prev[b.len()]
}

/// Return the closest candidate within `max_distance`, preferring lower distance.
pub fn best_match<'a>(
    needle: &str,
    candidates: &'a [String],
    max_distance: usize,
) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let dist = levenshtein(&needle.to_lowercase(), &candidate.to_lowercase());
        let current_best = best.map(|(_, d)| d).unwrap_or(usize::MAX);
        if dist < current_best {
            best = Some((candidate.as_str(), dist));
        }
    }

    match best {
        Some((cand, dist)) if dist <= max_distance => Some(cand),
        _ => None,
    }
}

/// Whether `candidate` is close enough to `target` to substitute without asking.
///
/// Case-insensitive equality, a prefix relation with at most two extra characters, or an edit
/// distance of at most two. Comparison is case-folded, so the relation is symmetric.
pub fn is_high_confidence_match(target: &str, candidate: &str) -> bool {
    let a = target.trim().to_lowercase();
    let b = candidate.trim().to_lowercase();
    if a == b {
        return true;
    }
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (&a, &b)
    } else {
        (&b, &a)
    };
    if !short.is_empty()
        && long.starts_with(short.as_str())
        && long.chars().count() - short.chars().count() <= 2
    {
        return true;
    }
    levenshtein(&a, &b) <= 2
}

/// The single candidate that is a high-confidence match for `target`, if there is exactly one
/// candidate and it qualifies.
pub fn single_confident_candidate<'a>(target: &str, candidates: &'a [String]) -> Option<&'a str> {
    match candidates {
        [only] if is_high_confidence_match(target, crate::links::basename(only)) => {
            Some(only.as_str())
        }
        _ => None,
    }
}

/// Coarse value shape used to flag migrations that would change a field's structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    List,
    Mapping,
}

pub fn shape_of(value: &Value) -> Shape {
    match value {
        Value::Sequence(_) => Shape::List,
        Value::Mapping(_) => Shape::Mapping,
        _ => Shape::Scalar,
    }
}

fn expected_shape(field: &FieldDef) -> Shape {
    if field.expects_list() {
        Shape::List
    } else {
        Shape::Scalar
    }
}

/// Whether `value` fits the structure `field` expects. Empty values fit anything.
pub fn shape_fits(field: &FieldDef, value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(v) if is_empty_value(v) => true,
        Some(v) => shape_of(v) == expected_shape(field),
    }
}

/// Lowercase and drop separators so `due-date`, `Due_Date`, and `dueDate` compare equal.
fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn singular(name: &str) -> &str {
    name.strip_suffix('s').unwrap_or(name)
}

/// A schema field offered as a migration target for an unknown field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCandidate {
    pub name: String,
    pub distance: usize,
    /// The value's shape differs from what the field expects
    pub shape_mismatch: bool,
}

/// Rank schema fields by name similarity to `field_name`, closest first.
pub fn similar_field_candidates(
    field_name: &str,
    schema_fields: &BTreeMap<String, FieldDef>,
    value: Option<&Value>,
    limit: usize,
) -> Vec<FieldCandidate> {
    let needle = normalize_field_name(field_name);
    let mut candidates: Vec<FieldCandidate> = schema_fields
        .iter()
        .filter(|(name, _)| name.as_str() != field_name)
        .filter_map(|(name, def)| {
            let normalized = normalize_field_name(name);
            let distance = levenshtein(&needle, &normalized);
            let related = distance <= std::cmp::max(2, needle.chars().count() / 3)
                || (!needle.is_empty() && normalized.contains(&needle))
                || (!normalized.is_empty() && needle.contains(&normalized));
            related.then(|| FieldCandidate {
                name: name.clone(),
                distance,
                shape_mismatch: !shape_fits(def, value),
            })
        })
        .collect();
    candidates.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.name.cmp(&b.name)));
    candidates.truncate(limit);
    candidates
}

/// The schema field an unknown field should migrate to without asking, if exactly one field
/// of the note's type is an unambiguous match: same name up to casing, separators, or a plural
/// `s`, or a high-confidence match; a compatible shape; and no non-empty value already there.
pub fn auto_migration_target(
    schema: &Schema,
    frontmatter: &Frontmatter,
    field_name: &str,
    value: Option<&Value>,
) -> Option<String> {
    let type_path = schema.resolve_type(frontmatter)?;
    let fields = schema.fields_for_type(&type_path);
    let needle = normalize_field_name(field_name);

    let matches: Vec<&String> = fields
        .iter()
        .filter(|(name, def)| {
            if name.as_str() == field_name {
                return false;
            }
            let normalized = normalize_field_name(name);
            let name_match = normalized == needle
                || singular(&normalized) == singular(&needle)
                || is_high_confidence_match(field_name, name);
            let occupied = frontmatter
                .get(name.as_str())
                .is_some_and(|v| !is_empty_value(v));
            name_match && shape_fits(def, value) && !occupied
        })
        .map(|(name, _)| name)
        .collect();

    match matches.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}
