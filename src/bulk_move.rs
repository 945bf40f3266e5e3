//! Moving notes between vault directories while keeping links to them intact.
//!
//! Bare-name links (`[[Plan]]`) survive a move on their own. Path-qualified links
//! (`[[Objectives/Plan]]`) are rewritten to the new location.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::links::{rewrite_wikilinks, wikilink_targets};

/// All markdown files under the vault, sorted. Hidden directories are skipped.
pub fn list_all_markdown_files(vault_dir: &Path) -> Result<Vec<PathBuf>> {
    if !vault_dir.is_dir() {
        bail!("vault directory not found: {}", vault_dir.display());
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(vault_dir).into_iter().filter_entry(|entry| {
        entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
    });
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }
        files.push(entry.path().to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Vault-relative link target for a note: relative path without the `.md` extension.
pub fn link_key(vault_dir: &Path, note: &Path) -> String {
    let relative = note.strip_prefix(vault_dir).unwrap_or(note);
    let key = relative.with_extension("");
    key.to_string_lossy().replace('\\', "/")
}

/// A file that links to a given note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    pub file: PathBuf,
    pub count: usize,
}

/// Files among `files` whose wikilinks point at `note`, by bare name or vault-relative path.
pub fn find_wikilinks_to(
    vault_dir: &Path,
    files: &[PathBuf],
    note: &Path,
) -> Result<Vec<LinkReference>> {
    let path_key = link_key(vault_dir, note);
    let name_key = note
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut references = Vec::new();
    for file in files {
        let text = fs::read_to_string(file)
            .with_context(|| format!("read note: {}", file.display()))?;
        let count = wikilink_targets(&text)
            .iter()
            .filter(|target| **target == path_key || **target == name_key)
            .count();
        if count > 0 {
            references.push(LinkReference {
                file: file.clone(),
                count,
            });
        }
    }
    Ok(references)
}

/// Inputs to [`execute_bulk_move`].
#[derive(Debug, Clone)]
pub struct BulkMoveRequest<'a> {
    pub vault_dir: &'a Path,
    /// Destination directory, relative to the vault root
    pub target_dir: &'a str,
    pub files_to_move: &'a [PathBuf],
    /// When false, compute the plan and link counts without touching the filesystem
    pub execute: bool,
    /// Files whose links may need rewriting
    pub all_vault_files: &'a [PathBuf],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct BulkMoveResult {
    pub moved: Vec<MovedFile>,
    pub errors: Vec<String>,
    pub total_links_updated: usize,
}

/// Move files into `target_dir` and rewrite path-qualified links to them.
///
/// Per-file problems (destination taken, unreadable note) are collected in `errors`; the rest
/// of the batch still runs.
pub fn execute_bulk_move(request: &BulkMoveRequest<'_>) -> BulkMoveResult {
    let mut result = BulkMoveResult::default();
    let target_dir = request.vault_dir.join(request.target_dir);

    // old link key -> new link key
    let mut rewrites: Vec<(String, String)> = Vec::new();
    // old path -> new path, for files whose contents are rewritten after the move
    let mut relocated: HashMap<PathBuf, PathBuf> = HashMap::new();

    for from in request.files_to_move {
        let Some(file_name) = from.file_name() else {
            result.errors.push(format!("not a file: {}", from.display()));
            continue;
        };
        let to = target_dir.join(file_name);
        if to == *from {
            continue;
        }
        if to.exists() {
            result
                .errors
                .push(format!("destination already exists: {}", to.display()));
            continue;
        }
        if request.execute {
            if let Err(e) = move_file(from, &to) {
                result.errors.push(format!("{e:#}"));
                continue;
            }
        }
        rewrites.push((
            link_key(request.vault_dir, from),
            link_key(request.vault_dir, &to),
        ));
        relocated.insert(from.clone(), to.clone());
        result.moved.push(MovedFile {
            from: from.clone(),
            to,
        });
    }

    if rewrites.is_empty() {
        return result;
    }

    for file in request.all_vault_files {
        let current = match relocated.get(file) {
            Some(new_path) if request.execute => new_path.clone(),
            _ => file.clone(),
        };
        let text = match fs::read_to_string(&current) {
            Ok(text) => text,
            Err(e) => {
                result
                    .errors
                    .push(format!("read note {}: {}", current.display(), e));
                continue;
            }
        };

        let mut updated = text.clone();
        let mut count = 0;
        for (old_key, new_key) in &rewrites {
            let (rewritten, n) = rewrite_wikilinks(&updated, old_key, new_key);
            updated = rewritten;
            count += n;
        }
        if count == 0 {
            continue;
        }
        result.total_links_updated += count;
        if request.execute {
            if let Err(e) = fs::write(&current, &updated) {
                result
                    .errors
                    .push(format!("write note {}: {}", current.display(), e));
            }
        }
    }

    result
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory: {}", parent.display()))?;
    }
    fs::rename(from, to)
        .with_context(|| format!("move {} to {}", from.display(), to.display()))
}
