//! Structural repairs on raw header text: block position, duplicate keys, malformed links.
//!
//! These run before the header can be parsed as a mapping, so they work on the line node
//! model in [`crate::header`] and splice the edited header back into the original bytes.

use anyhow::{bail, Context, Result};
use serde_yaml::Value;
use std::path::Path;

use super::common::FixOutcome;
use crate::header::{self, Header, Node, SeqItem};
use crate::links::repair_wikilink;
use crate::note::{display_value, is_empty_value, parse_header, NoteStore};
use crate::splice::{self, Block};

/// Which occurrence of a duplicated key survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateStrategy {
    KeepFirst,
    KeepLast,
    /// Keep the only non-empty value, or the last occurrence when all are empty
    Auto,
}

fn header_block(text: &str, path: &Path) -> Result<Block> {
    splice::scan(text)
        .primary()
        .cloned()
        .with_context(|| format!("no frontmatter block in {}", path.display()))
}

/// Move the frontmatter block to the start of the file.
pub fn move_block_to_top(store: &NoteStore, path: &Path) -> Result<FixOutcome> {
    let text = store.read_text(path)?;
    let scan = splice::scan(&text);
    let Some(block) = scan.primary() else {
        return Ok(FixOutcome::skipped(
            "no frontmatter block found; manual fix required",
        ));
    };
    if splice::is_at_top(&text, block) {
        return Ok(FixOutcome::skipped("already at top"));
    }
    if scan.blocks.len() != 1
        || scan.unterminated
        || parse_header(&text[block.content.clone()]).is_err()
    {
        return Ok(FixOutcome::skipped(
            "ambiguous frontmatter position; manual fix required",
        ));
    }

    let moved = splice::move_to_top(&text, block);
    store.write_text(path, &moved)?;
    Ok(FixOutcome::fixed("moved frontmatter to top"))
}

/// Position of the occurrence the automatic strategy keeps, or `None` when the non-empty
/// values disagree.
pub fn auto_keep(values: &[Value]) -> Option<usize> {
    let non_empty: Vec<usize> = (0..values.len())
        .filter(|&i| !is_empty_value(&values[i]))
        .collect();
    let Some(&last) = non_empty.last() else {
        return values.len().checked_sub(1);
    };
    let all_same = non_empty.iter().all(|&i| values[i] == values[last]);
    all_same.then_some(last)
}

/// Values of every occurrence of `key`, in text order.
pub fn duplicate_values(store: &NoteStore, path: &Path, key: &str) -> Result<Vec<Value>> {
    let text = store.read_text(path)?;
    let block = header_block(&text, path)?;
    let header = Header::parse(&text[block.content.clone()]);
    header
        .find(key)
        .into_iter()
        .map(|i| header.entry_value(&header.entries[i]))
        .collect()
}

/// Remove all but one occurrence of a duplicated key.
pub fn resolve_duplicate_key(
    store: &NoteStore,
    path: &Path,
    key: &str,
    strategy: DuplicateStrategy,
) -> Result<FixOutcome> {
    let text = store.read_text(path)?;
    let block = header_block(&text, path)?;
    let header = Header::parse(&text[block.content.clone()]);

    let indices = header.find(key);
    if indices.len() < 2 {
        return Ok(FixOutcome::skipped(format!(
            "'{}' is no longer duplicated",
            key
        )));
    }
    let values = indices
        .iter()
        .map(|&i| header.entry_value(&header.entries[i]))
        .collect::<Result<Vec<_>>>()?;

    let keep = match strategy {
        DuplicateStrategy::KeepFirst => 0,
        DuplicateStrategy::KeepLast => indices.len() - 1,
        DuplicateStrategy::Auto => match auto_keep(&values) {
            Some(pos) => pos,
            None => {
                return Ok(FixOutcome::skipped(
                    "duplicate values differ; run interactive fix",
                ))
            }
        },
    };

    let remove: Vec<usize> = indices
        .iter()
        .enumerate()
        .filter(|(pos, _)| *pos != keep)
        .map(|(_, &i)| i)
        .collect();
    let new_header = header.without_entries(&remove);
    header::check_edit(header.text(), &new_header)
        .context("header does not parse after removing duplicates")?;

    store.write_text(path, &splice::replace_content(&text, &block, &new_header))?;
    Ok(FixOutcome::fixed(format!(
        "kept occurrence {} of {} for '{}' ({})",
        keep + 1,
        indices.len(),
        key,
        display_value(&values[keep])
    )))
}

/// Replace the raw text of a link value with a corrected one.
///
/// Without `fixed_value`, the bracket repair heuristic supplies the replacement.
pub fn fix_malformed_wikilink(
    store: &NoteStore,
    path: &Path,
    field: &str,
    list_index: Option<usize>,
    fixed_value: Option<&str>,
) -> Result<FixOutcome> {
    let text = store.read_text(path)?;
    let block = header_block(&text, path)?;
    let content = &text[block.content.clone()];
    let header = Header::parse(content);

    let Some(entry) = header.first(field) else {
        bail!("field '{}' not found", field);
    };
    let range = match (&entry.value, list_index) {
        (Node::Scalar(range), None) => range.clone(),
        (Node::Sequence(items), Some(i)) => match items.get(i) {
            Some(SeqItem {
                scalar: Some(range),
            }) => range.clone(),
            Some(_) => bail!("element {} of '{}' is not a plain scalar", i, field),
            None => bail!("'{}' has no element {}", field, i),
        },
        (Node::Sequence(_), None) => bail!("'{}' is a list; an element index is required", field),
        (_, Some(i)) => bail!("'{}' is not a list (element {} requested)", field, i),
        _ => bail!("'{}' is not a plain scalar", field),
    };

    let raw = &content[range.clone()];
    let current = match header.scalar_value(range.clone()) {
        Value::String(s) => s,
        _ => raw.to_string(),
    };
    let replacement = match fixed_value {
        Some(value) => value.to_string(),
        None => repair_wikilink(&current)
            .with_context(|| format!("cannot work out a repair for '{}'", current))?,
    };
    let quoted = header::quote_scalar(&replacement);
    if raw == quoted {
        return Ok(FixOutcome::skipped("link is already well-formed"));
    }

    let new_header = header.replace(range, &quoted);
    header::check_edit(content, &new_header).context("header does not parse after link repair")?;
    store.write_text(path, &splice::replace_content(&text, &block, &new_header))?;
    Ok(FixOutcome::fixed(format!("'{}' -> '{}'", current, replacement)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn note(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("note.md");
        fs::write(&path, contents).unwrap();
        path
    }

    fn live() -> NoteStore {
        NoteStore::new(false)
    }

    #[test]
    fn test_case_differing_duplicates_are_skipped() {
        let dir = TempDir::new().unwrap();
        let text = "---\nstatus: \"Raw\"\nstatus: \"raw\"\n---\nbody\n";
        let path = note(&dir, text);
        let outcome =
            resolve_duplicate_key(&live(), &path, "status", DuplicateStrategy::Auto).unwrap();
        assert!(matches!(outcome, FixOutcome::Skipped(ref m) if m.contains("differ")));
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_all_empty_duplicates_keep_last() {
        assert_eq!(
            auto_keep(&[Value::Null, Value::String(String::new()), Value::Sequence(vec![])]),
            Some(2)
        );
    }

    #[test]
    fn test_single_distinct_value_keeps_its_last_occurrence() {
        let raw = Value::String("raw".into());
        assert_eq!(auto_keep(&[raw.clone(), Value::Null, raw.clone(), Value::Null]), Some(2));
        assert_eq!(
            auto_keep(&[raw, Value::String("done".into())]),
            None
        );
    }

    #[test]
    fn test_resolve_duplicate_splices_header_only() {
        let dir = TempDir::new().unwrap();
        let path = note(
            &dir,
            "---\ntitle:   spaced\nstatus:\nstatus: done\n---\nBody  with  spacing\r\n",
        );
        let outcome =
            resolve_duplicate_key(&live(), &path, "status", DuplicateStrategy::Auto).unwrap();
        assert!(outcome.is_fixed());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "---\ntitle:   spaced\nstatus: done\n---\nBody  with  spacing\r\n"
        );
    }

    #[test]
    fn test_explicit_strategies() {
        let dir = TempDir::new().unwrap();
        let text = "---\na: 1\na: 2\n---\n";
        let path = note(&dir, text);
        resolve_duplicate_key(&live(), &path, "a", DuplicateStrategy::KeepFirst).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "---\na: 1\n---\n");

        fs::write(&path, text).unwrap();
        resolve_duplicate_key(&live(), &path, "a", DuplicateStrategy::KeepLast).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "---\na: 2\n---\n");
    }

    #[test]
    fn test_move_to_top_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = note(&dir, "# Title\n\n---\ntype: idea\n---\nBody\n");
        let first = move_block_to_top(&live(), &path).unwrap();
        assert!(first.is_fixed());
        let after_first = fs::read_to_string(&path).unwrap();
        assert_eq!(after_first, "---\ntype: idea\n---\n# Title\n\nBody\n");

        let second = move_block_to_top(&live(), &path).unwrap();
        assert_eq!(second, FixOutcome::skipped("already at top"));
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
    }

    #[test]
    fn test_move_to_top_refuses_ambiguous_blocks() {
        let dir = TempDir::new().unwrap();
        let text = "# Title\n\n---\ntype: idea\n---\n\n---\nstatus: raw\n---\n";
        let path = note(&dir, text);
        let outcome = move_block_to_top(&live(), &path).unwrap();
        assert!(matches!(outcome, FixOutcome::Skipped(ref m) if m.contains("ambiguous")));
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_move_to_top_refuses_unparsable_block() {
        let dir = TempDir::new().unwrap();
        let text = "# T\n\n---\na: [x\n---\n";
        let path = note(&dir, text);
        let outcome = move_block_to_top(&live(), &path).unwrap();
        assert!(matches!(outcome, FixOutcome::Skipped(ref m) if m.contains("ambiguous")));
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_move_to_top_refuses_later_unterminated_block() {
        let dir = TempDir::new().unwrap();
        let text = "# T\n\n---\ntype: idea\n---\n\n---\nstatus: raw\n";
        let path = note(&dir, text);
        let outcome = move_block_to_top(&live(), &path).unwrap();
        assert!(matches!(outcome, FixOutcome::Skipped(ref m) if m.contains("ambiguous")));
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_two_malformed_links_repair_one_at_a_time() {
        let dir = TempDir::new().unwrap();
        let path = note(&dir, "---\nparent: [[A]\nrelated: [[B]\n---\nBody\n");
        assert!(fix_malformed_wikilink(&live(), &path, "parent", None, None).unwrap().is_fixed());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "---\nparent: \"[[A]]\"\nrelated: [[B]\n---\nBody\n"
        );
        assert!(fix_malformed_wikilink(&live(), &path, "related", None, None).unwrap().is_fixed());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "---\nparent: \"[[A]]\"\nrelated: \"[[B]]\"\n---\nBody\n"
        );
    }

    #[test]
    fn test_duplicates_resolve_beside_malformed_link() {
        let dir = TempDir::new().unwrap();
        let path = note(&dir, "---\nstatus: raw\nstatus:\nparent: [[A]\n---\n");
        let outcome =
            resolve_duplicate_key(&live(), &path, "status", DuplicateStrategy::Auto).unwrap();
        assert!(outcome.is_fixed());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "---\nstatus: raw\nparent: [[A]\n---\n"
        );
    }

    #[test]
    fn test_fix_malformed_wikilink() {
        let dir = TempDir::new().unwrap();
        let path = note(&dir, "---\nparent: [[Plan]\ntags:\n  - \"[[a]]\"\n  - \"[b]]\"\n---\n");
        let outcome =
            fix_malformed_wikilink(&live(), &path, "parent", None, Some("[[Plan]]")).unwrap();
        assert!(outcome.is_fixed());
        fix_malformed_wikilink(&live(), &path, "tags", Some(1), None).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "---\nparent: \"[[Plan]]\"\ntags:\n  - \"[[a]]\"\n  - \"[[b]]\"\n---\n"
        );
    }

    #[test]
    fn test_fix_malformed_wikilink_rejects_complex_node() {
        let dir = TempDir::new().unwrap();
        let path = note(&dir, "---\nparent:\n  nested: x\n---\n");
        let err =
            fix_malformed_wikilink(&live(), &path, "parent", None, Some("[[X]]")).unwrap_err();
        assert!(err.to_string().contains("not a plain scalar"));
    }
}
