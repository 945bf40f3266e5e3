//! Moving a note into the directory its type belongs in.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use super::common::{FixContext, FixOutcome};
use crate::bulk_move::{
    execute_bulk_move, find_wikilinks_to, list_all_markdown_files, BulkMoveRequest,
};

/// Move `path` into `expected_directory` (vault-relative). Returns the outcome and the path the
/// note lives at afterwards. In a dry run the returned path is where it would have gone.
pub fn move_to_directory(
    ctx: &FixContext<'_>,
    path: &Path,
    expected_directory: &str,
) -> Result<(FixOutcome, PathBuf)> {
    let expected_directory = expected_directory.trim_matches('/');
    let target_dir = ctx.vault_dir.join(expected_directory);
    if path.parent() == Some(target_dir.as_path()) {
        return Ok((
            FixOutcome::skipped(format!("already in {}/", expected_directory)),
            path.to_path_buf(),
        ));
    }
    if !path.is_file() {
        bail!("note not found: {}", path.display());
    }

    let all_files = list_all_markdown_files(ctx.vault_dir)?;
    if ctx.output.verbose {
        for reference in find_wikilinks_to(ctx.vault_dir, &all_files, path)? {
            ctx.output.verbose(&format!(
                "    linked from {} ({}x)",
                ctx.relative(&reference.file),
                reference.count
            ));
        }
    }
    let files_to_move = [path.to_path_buf()];
    let result = execute_bulk_move(&BulkMoveRequest {
        vault_dir: ctx.vault_dir,
        target_dir: expected_directory,
        files_to_move: &files_to_move,
        execute: !ctx.store.is_dry_run(),
        all_vault_files: &all_files,
    });

    let errors = result.errors.join("; ");
    let Some(moved) = result.moved.into_iter().next() else {
        if errors.is_empty() {
            bail!("move of {} produced no result", path.display());
        }
        bail!("{}", errors);
    };
    ctx.output.verbose(&format!(
        "    moved {} -> {}",
        ctx.relative(&moved.from),
        ctx.relative(&moved.to)
    ));
    // The note has moved even if some links could not be rewritten; later fixes follow it.
    if !errors.is_empty() {
        return Ok((
            FixOutcome::Failed(format!("moved to {}/ but {}", expected_directory, errors)),
            moved.to,
        ));
    }
    Ok((
        FixOutcome::fixed(format!(
            "moved to {}/ ({} link(s) updated)",
            expected_directory, result.total_links_updated
        )),
        moved.to,
    ))
}
