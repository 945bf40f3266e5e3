//! Raw text splicer for frontmatter blocks.
//!
//! Locates `---` delimited header blocks by byte range so callers can replace or relocate a
//! block without touching any other byte of the file.

use std::ops::Range;

/// A delimited header block found in raw note text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Whole block: opening delimiter through the closing delimiter's line ending.
    pub range: Range<usize>,
    /// Header text between the delimiters.
    pub content: Range<usize>,
}

/// Every header block in a file, in text order.
#[derive(Debug, Clone, Default)]
pub struct BlockScan {
    pub blocks: Vec<Block>,
    /// An opening delimiter was found with no closing delimiter after it.
    pub unterminated: bool,
}

impl BlockScan {
    /// The block the rest of the toolchain treats as "the" frontmatter.
    pub fn primary(&self) -> Option<&Block> {
        self.blocks.first()
    }
}

/// Split text into lines, keeping each line's byte offset and terminator.
pub(crate) fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|line| {
            let start = offset;
            offset += line.len();
            (start, line)
        })
        .collect()
}

pub(crate) fn strip_eol(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

fn is_open_delimiter(line: &str) -> bool {
    strip_eol(line).trim_start_matches('\u{feff}').trim_end() == "---"
}

fn is_close_delimiter(line: &str) -> bool {
    let line = strip_eol(line).trim_end();
    line == "---" || line == "..."
}

/// Whether a line reads like the first `key: value` pair of a YAML mapping.
fn looks_like_key_line(line: &str) -> bool {
    let line = strip_eol(line);
    if line.starts_with(char::is_whitespace) || line.starts_with('#') || line.starts_with('-') {
        return false;
    }
    match line.find(':') {
        Some(pos) if pos > 0 => {
            let rest = &line[pos + 1..];
            rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')
        }
        _ => false,
    }
}

/// Scan raw note text for header blocks.
///
/// A block opens on a `---` line that is either the first line of the file or follows a blank
/// line and is itself followed by a `key:` line. It closes on the next `---` or `...` line.
pub fn scan(text: &str) -> BlockScan {
    let lines = lines_with_offsets(text);
    let mut scan = BlockScan::default();
    let mut i = 0;

    while i < lines.len() {
        let (start, line) = lines[i];
        let opens = is_open_delimiter(line)
            && (i == 0
                || (strip_eol(lines[i - 1].1).trim().is_empty()
                    && lines.get(i + 1).is_some_and(|(_, next)| looks_like_key_line(next))));
        if !opens {
            i += 1;
            continue;
        }

        let content_start = start + line.len();
        let close = (i + 1..lines.len()).find(|&j| is_close_delimiter(lines[j].1));
        let Some(j) = close else {
            scan.unterminated = true;
            break;
        };

        let (close_start, close_line) = lines[j];
        scan.blocks.push(Block {
            range: start..close_start + close_line.len(),
            content: content_start..close_start,
        });
        i = j + 1;
    }

    scan
}

/// Whether the block is the first thing in the file (a leading BOM is allowed).
pub fn is_at_top(text: &str, block: &Block) -> bool {
    let before = &text[..block.range.start];
    before.is_empty() || before == "\u{feff}"
}

/// Replace the header text of `block`, keeping its delimiters and the rest of the file.
pub fn replace_content(text: &str, block: &Block, new_content: &str) -> String {
    let mut out = String::with_capacity(text.len() + new_content.len());
    out.push_str(&text[..block.content.start]);
    out.push_str(new_content);
    if !new_content.is_empty() && !new_content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&text[block.content.end..]);
    out
}

/// Cut the block's exact byte range and reinsert it at offset 0.
///
/// A block that ends the file without a trailing newline gets one, so the text that followed
/// the old position does not run into the closing delimiter.
pub fn move_to_top(text: &str, block: &Block) -> String {
    let block_text = &text[block.range.clone()];
    let mut out = String::with_capacity(text.len() + 1);
    out.push_str(block_text);
    if !block_text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&text[..block.range.start]);
    out.push_str(&text[block.range.end..]);
    out
}
