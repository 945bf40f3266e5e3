//! Link parsing and rendering for frontmatter values.
//!
//! Supports three styles: plain names (`Project Plan`), wikilinks (`[[Project Plan]]`, with
//! optional `#heading` and `|alias`), and markdown links (`[Project Plan](Project%20Plan.md)`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\[([^\[\]|#]+)((?:#[^\[\]|]*)?(?:\|[^\[\]]*)?)\]\]$").unwrap());
static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^\]]*)\]\(([^)\s]+)\)$").unwrap());
static EMBEDDED_WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]|#]+)((?:#[^\[\]|]*)?(?:\|[^\[\]]*)?)\]\]").unwrap());

/// Link style a field is expected to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkFormat {
    Plain,
    Wikilink,
    Markdown,
}

impl fmt::Display for LinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkFormat::Plain => write!(f, "plain"),
            LinkFormat::Wikilink => write!(f, "wikilink"),
            LinkFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A parsed link value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: String,
    /// `#heading` and/or `|alias`, kept verbatim for wikilinks.
    pub suffix: String,
    pub style: LinkFormat,
}

pub fn parse_link(text: &str) -> Link {
    let trimmed = text.trim();
    if let Some(caps) = WIKILINK_RE.captures(trimmed) {
        return Link {
            target: caps[1].trim().to_string(),
            suffix: caps[2].to_string(),
            style: LinkFormat::Wikilink,
        };
    }
    if let Some(caps) = MARKDOWN_LINK_RE.captures(trimmed) {
        let url = caps[2].replace("%20", " ");
        let target = url.strip_suffix(".md").unwrap_or(&url).to_string();
        let label = &caps[1];
        let suffix = if label.is_empty() || label == basename(&target) {
            String::new()
        } else {
            format!("|{label}")
        };
        return Link {
            target,
            suffix,
            style: LinkFormat::Markdown,
        };
    }
    Link {
        target: trimmed.to_string(),
        suffix: String::new(),
        style: LinkFormat::Plain,
    }
}

/// Last path segment of a link target.
pub fn basename(target: &str) -> &str {
    target.rsplit('/').next().unwrap_or(target)
}

pub fn render_link(link: &Link, format: LinkFormat) -> String {
    match format {
        LinkFormat::Plain => link.target.clone(),
        LinkFormat::Wikilink => format!("[[{}{}]]", link.target, link.suffix),
        LinkFormat::Markdown => {
            let label = link
                .suffix
                .split_once('|')
                .map(|(_, alias)| alias.to_string())
                .unwrap_or_else(|| basename(&link.target).to_string());
            format!("[{}]({}.md)", label, link.target.replace(' ', "%20"))
        }
    }
}

/// Re-render a link value in another style.
pub fn convert_link(text: &str, format: LinkFormat) -> String {
    render_link(&parse_link(text), format)
}

/// The note a link value points at, whatever its style.
pub fn link_target(text: &str) -> String {
    parse_link(text).target
}

pub fn wikilink(target: &str) -> String {
    format!("[[{target}]]")
}

/// Point a link value at a new target. Link styles and suffixes survive; plain names become
/// wikilinks.
pub fn retarget(text: &str, new_target: &str) -> String {
    let link = parse_link(text);
    let retargeted = Link {
        target: new_target.to_string(),
        ..link.clone()
    };
    match link.style {
        LinkFormat::Plain => wikilink(new_target),
        style => render_link(&retargeted, style),
    }
}

/// Best-effort repair of a wikilink with missing or extra brackets.
pub fn repair_wikilink(text: &str) -> Option<String> {
    let inner = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    if inner.is_empty() || inner.contains('[') || inner.contains(']') {
        return None;
    }
    let repaired = wikilink(inner);
    (repaired != text.trim()).then_some(repaired)
}

/// Targets of every wikilink embedded anywhere in `text`.
pub fn wikilink_targets(text: &str) -> Vec<String> {
    EMBEDDED_WIKILINK_RE
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

/// Rewrite wikilinks pointing at `old_target` to point at `new_target`. Returns the new text
/// and the number of links rewritten.
pub fn rewrite_wikilinks(text: &str, old_target: &str, new_target: &str) -> (String, usize) {
    let mut count = 0;
    let rewritten = EMBEDDED_WIKILINK_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        if caps[1].trim() == old_target {
            count += 1;
            format!("[[{}{}]]", new_target, &caps[2])
        } else {
            caps[0].to_string()
        }
    });
    (rewritten.into_owned(), count)
}
