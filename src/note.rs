//! Note I/O: frontmatter parsing, rendering, and the dry-run aware note store.
//!
//! Every write in a fix run goes through [`NoteStore::persist`]. A store built for a dry run
//! computes everything normally and then skips the write, so no call site can forget to honor
//! the flag.

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

use crate::splice;

/// Parsed frontmatter, in insertion order.
pub type Frontmatter = Mapping;

/// A note split into its frontmatter mapping and the text after the header block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Parse note text. Only a header block at the very top of the file counts as frontmatter.
pub fn parse_note_text(text: &str) -> Result<Note> {
    let scan = splice::scan(text);
    let Some(block) = scan.primary().filter(|b| splice::is_at_top(text, b)) else {
        return Ok(Note {
            frontmatter: Frontmatter::new(),
            body: text.to_string(),
        });
    };

    let frontmatter = parse_header(&text[block.content.clone()])?;
    Ok(Note {
        frontmatter,
        body: text[block.range.end..].to_string(),
    })
}

/// Parse header text into a mapping. Empty headers are an empty mapping.
pub fn parse_header(header: &str) -> Result<Frontmatter> {
    if header.trim().is_empty() {
        return Ok(Frontmatter::new());
    }
    match serde_yaml::from_str::<Value>(header).context("invalid frontmatter")? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Frontmatter::new()),
        other => anyhow::bail!(
            "frontmatter is not a mapping (found {})",
            describe_value(&other)
        ),
    }
}

/// Order keys by `field_order` first, then any remaining keys in their current order.
pub fn order_frontmatter(frontmatter: &Frontmatter, field_order: &[String]) -> Frontmatter {
    let mut ordered = Frontmatter::new();
    for name in field_order {
        let key = Value::String(name.clone());
        if let Some(value) = frontmatter.get(&key) {
            ordered.insert(key, value.clone());
        }
    }
    for (key, value) in frontmatter {
        if !ordered.contains_key(key) {
            ordered.insert(key.clone(), value.clone());
        }
    }
    ordered
}

/// Render a full note. An empty mapping renders as body only.
pub fn render_note(
    frontmatter: &Frontmatter,
    body: &str,
    field_order: &[String],
) -> Result<String> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }
    let ordered = order_frontmatter(frontmatter, field_order);
    let yaml = serde_yaml::to_string(&ordered).context("serialize frontmatter")?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 8);
    out.push_str("---\n");
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n");
    out.push_str(body);
    Ok(out)
}

/// Short human description of a YAML value's shape.
pub fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Null, empty string, and empty collections count as empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Sequence(seq) => seq.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
        Value::Tagged(tagged) => is_empty_value(&tagged.value),
    }
}

/// Compact single-line rendering of a value for prompts and messages.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "(empty)".to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}

/// Reads notes and writes them back, unless the run is a dry run.
#[derive(Debug, Clone, Copy)]
pub struct NoteStore {
    dry_run: bool,
}

impl NoteStore {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn read_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("read note: {}", path.display()))
    }

    pub fn read_note(&self, path: &Path) -> Result<Note> {
        let text = self.read_text(path)?;
        parse_note_text(&text).with_context(|| format!("parse note: {}", path.display()))
    }

    /// Write raw text, used by structural fixes that splice the original bytes.
    pub fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        self.persist(path, text)
    }

    /// Rewrite a whole note from its mapping and body.
    pub fn write_note(
        &self,
        path: &Path,
        frontmatter: &Frontmatter,
        body: &str,
        field_order: &[String],
    ) -> Result<()> {
        let text = render_note(frontmatter, body, field_order)?;
        self.persist(path, &text)
    }

    /// The single place file contents are written.
    fn persist(&self, path: &Path, contents: &str) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        fs::write(path, contents).with_context(|| format!("write note: {}", path.display()))
    }
}
