//! Line-oriented node model of a frontmatter header.
//!
//! Serializing the whole header through a YAML library would reorder, requote, and reflow
//! values the user never asked to touch. Instead each top-level `key:` line opens an entry that
//! spans to the next top-level key, and value nodes record byte ranges into the header text.
//! Edits splice those ranges, so every other byte survives.

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::ops::Range;

use crate::note::parse_header;
use crate::splice::{lines_with_offsets, strip_eol};

/// Shape of an entry's value, as far as the line model can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `key:` with nothing after it
    Empty,
    /// Single-line scalar; range covers the raw text, quotes included
    Scalar(Range<usize>),
    /// Flow (`[a, b]`) or block (`- a`) sequence
    Sequence(Vec<SeqItem>),
    /// Nested mappings, block scalars, multi-line values
    Complex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqItem {
    /// Raw text of the item when it is a plain single-line scalar
    pub scalar: Option<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    /// From the key line through the line before the next top-level key
    pub span: Range<usize>,
    pub value: Node,
}

#[derive(Debug, Clone)]
pub struct Header<'a> {
    text: &'a str,
    pub entries: Vec<Entry>,
}

impl<'a> Header<'a> {
    pub fn parse(text: &'a str) -> Self {
        let lines = lines_with_offsets(text);
        let starts: Vec<(usize, String, usize)> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, (offset, line))| {
                parse_key(line).map(|(key, value_at)| (i, key, offset + value_at))
            })
            .collect();

        let entries = starts
            .iter()
            .enumerate()
            .map(|(n, (line_idx, key, value_at))| {
                let end_line = starts.get(n + 1).map(|s| s.0).unwrap_or(lines.len());
                let span_start = lines[*line_idx].0;
                let span_end = lines.get(end_line).map(|l| l.0).unwrap_or(text.len());
                Entry {
                    key: key.clone(),
                    span: span_start..span_end,
                    value: classify(text, &lines[*line_idx..end_line], *value_at),
                }
            })
            .collect();

        Self { text, entries }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Indices of every entry with this key, in text order.
    pub fn find(&self, key: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.key == key)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn first(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Parse one entry on its own. Works even when the full header has duplicate keys.
    pub fn entry_value(&self, entry: &Entry) -> Result<Value> {
        let map = parse_header(&self.text[entry.span.clone()])
            .with_context(|| format!("parse value of '{}'", entry.key))?;
        Ok(map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null))
    }

    /// Value of a raw scalar; text that isn't valid YAML on its own is taken literally.
    pub fn scalar_value(&self, range: Range<usize>) -> Value {
        let raw = &self.text[range];
        serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }

    /// Header text with the given entries cut out.
    pub fn without_entries(&self, indices: &[usize]) -> String {
        let mut spans: Vec<Range<usize>> = indices
            .iter()
            .filter_map(|&i| self.entries.get(i).map(|e| e.span.clone()))
            .collect();
        spans.sort_by(|a, b| b.start.cmp(&a.start));
        let mut out = self.text.to_string();
        for span in spans {
            out.replace_range(span, "");
        }
        out
    }

    pub fn replace(&self, range: Range<usize>, replacement: &str) -> String {
        let mut out = self.text.to_string();
        out.replace_range(range, replacement);
        out
    }
}

/// Raw text of every entry that fails to parse on its own.
fn failing_entries(text: &str) -> Vec<&str> {
    let header = Header::parse(text);
    header
        .entries
        .iter()
        .filter(|entry| header.entry_value(entry).is_err())
        .map(|entry| &text[entry.span.clone()])
        .collect()
}

/// Check that an edit from `before` to `after` leaves no entry broken that wasn't already.
///
/// Entries the edit never touched keep their exact text, so a failure whose text was already
/// failing before is carried over rather than blamed on the edit.
pub fn check_edit(before: &str, after: &str) -> Result<()> {
    let mut known = failing_entries(before);
    let header = Header::parse(after);
    for entry in &header.entries {
        let Err(err) = header.entry_value(entry) else {
            continue;
        };
        let raw = &after[entry.span.clone()];
        match known.iter().position(|k| *k == raw) {
            Some(pos) => {
                known.swap_remove(pos);
            }
            None => return Err(err),
        }
    }
    Ok(())
}

/// Render a string as a double-quoted YAML scalar.
pub fn quote_scalar(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("'{}'", text.replace('\'', "''")))
}

fn parse_key(line: &str) -> Option<(String, usize)> {
    let content = strip_eol(line);
    let first = content.chars().next()?;
    if first.is_whitespace() || matches!(first, '#' | '-' | '[' | '{' | '?') {
        return None;
    }
    let (key, after) = if first == '"' || first == '\'' {
        let close = content[1..].find(first)? + 1;
        (content[1..close].to_string(), close + 1)
    } else {
        let pos = find_key_colon(content)?;
        (content[..pos].trim_end().to_string(), pos)
    };
    let rest = content[after..].strip_prefix(':')?;
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }
    Some((key, after + 1))
}

fn find_key_colon(content: &str) -> Option<usize> {
    content
        .char_indices()
        .find(|&(i, c)| {
            c == ':'
                && content[i + 1..]
                    .chars()
                    .next()
                    .map_or(true, |next| next == ' ' || next == '\t')
        })
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
}

fn trim_range(text: &str, range: Range<usize>) -> Range<usize> {
    let slice = &text[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.end - (slice.len() - slice.trim_end().len());
    if start > end {
        start..start
    } else {
        start..end
    }
}

/// Drop a trailing ` # comment` from an unquoted value.
fn strip_comment(text: &str, range: Range<usize>) -> Range<usize> {
    let raw = &text[range.clone()];
    if let Some(quote) = raw.chars().next().filter(|c| *c == '"' || *c == '\'') {
        return match closing_quote(raw, quote) {
            Some(end) => range.start..range.start + end + 1,
            None => range,
        };
    }
    match raw.find(" #") {
        Some(pos) => trim_range(text, range.start..range.start + pos),
        None => range,
    }
}

/// Byte offset of the quote closing the quoted scalar that starts `raw`.
fn closing_quote(raw: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    let mut chars = raw.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if escaped {
            escaped = false;
        } else if c == '\\' && quote == '"' {
            escaped = true;
        } else if c == quote {
            // '' inside a single-quoted scalar is an escaped quote
            if quote == '\'' && chars.peek().is_some_and(|(_, next)| *next == '\'') {
                chars.next();
                continue;
            }
            return Some(i);
        }
    }
    None
}

fn is_content_line(line: &str) -> bool {
    let trimmed = strip_eol(line).trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn classify(text: &str, lines: &[(usize, &str)], value_at: usize) -> Node {
    let (first_offset, first_line) = lines[0];
    let line_end = first_offset + strip_eol(first_line).len();
    let rest = strip_comment(text, trim_range(text, value_at..line_end));
    let continuation: Vec<(usize, &str)> = lines[1..]
        .iter()
        .copied()
        .filter(|(_, line)| is_content_line(line))
        .collect();

    if rest.is_empty() {
        if continuation.is_empty() {
            return Node::Empty;
        }
        return block_sequence(text, &continuation).unwrap_or(Node::Complex);
    }
    if !continuation.is_empty() {
        return Node::Complex;
    }

    let raw = &text[rest.clone()];
    if raw.starts_with('{') || raw.starts_with('|') || raw.starts_with('>') {
        return Node::Complex;
    }
    if raw.starts_with('[') && !raw.starts_with("[[") {
        if let Some(items) = flow_sequence(text, rest.clone()) {
            return Node::Sequence(items);
        }
    }
    Node::Scalar(rest)
}

fn item_scalar(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let range = strip_comment(text, trim_range(text, range));
    let raw = &text[range.clone()];
    if raw.is_empty()
        || raw.starts_with('{')
        || raw.starts_with('|')
        || raw.starts_with('>')
        || (raw.starts_with('[') && !raw.starts_with("[["))
    {
        return None;
    }
    let quoted = raw.starts_with('"') || raw.starts_with('\'');
    if !quoted && find_key_colon(raw).is_some() {
        return None;
    }
    Some(range)
}

fn block_sequence(text: &str, lines: &[(usize, &str)]) -> Option<Node> {
    let indent_of = |line: &str| line.len() - line.trim_start().len();
    let base = indent_of(lines[0].1);
    let mut items: Vec<SeqItem> = Vec::new();

    for &(offset, line) in lines {
        let content = strip_eol(line);
        let indent = indent_of(content);
        if indent > base {
            items.last_mut()?.scalar = None;
            continue;
        }
        if indent < base {
            return None;
        }
        let after_dash = content[indent..].strip_prefix('-')?;
        if !(after_dash.is_empty() || after_dash.starts_with(' ')) {
            return None;
        }
        let item_start = offset + indent + 1;
        let item_end = offset + content.len();
        items.push(SeqItem {
            scalar: item_scalar(text, item_start..item_end),
        });
    }
    Some(Node::Sequence(items))
}

fn flow_sequence(text: &str, range: Range<usize>) -> Option<Vec<SeqItem>> {
    let raw = &text[range.clone()];
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut item_start = range.start + 1;
    let mut items = Vec::new();

    for (i, c) in raw.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    if i + c.len_utf8() != raw.len() {
                        return None;
                    }
                    let item = trim_range(text, item_start..range.start + i);
                    if !item.is_empty() {
                        items.push(SeqItem {
                            scalar: item_scalar(text, item),
                        });
                    }
                    return Some(items);
                }
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 1 => {
                let item = trim_range(text, item_start..range.start + i);
                items.push(SeqItem {
                    scalar: item_scalar(text, item),
                });
                item_start = range.start + i + 1;
            }
            _ => {}
        }
    }
    None
}
