//! Fix command: remediation of audit findings in a vault.
//!
//! Detection happens elsewhere; this command consumes its JSON report. Two orchestrators share
//! the same fix primitives: `batch` applies what is safe unattended, `interactive` asks.

pub mod batch;
pub mod common;
pub mod interactive;
pub mod moves;
pub mod report;
pub mod structural;
pub mod values;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

pub use batch::run_auto_fix;
pub use common::{FixOptions, FixSummary};
pub use interactive::run_interactive_fix;

use crate::audit::load_audit_report;
use crate::config::Config;
use crate::exit_codes;
use crate::output::{schema_ids, JsonOutput, Output};
use crate::prompt::TerminalPrompter;
use crate::schema::Schema;

/// Arguments for `vaultfix fix`.
#[derive(Debug, Clone)]
pub struct FixArgs {
    /// Audit report path, or `-` for stdin
    pub audit: PathBuf,
    pub interactive: bool,
    pub dry_run: bool,
    pub dry_run_reason: Option<String>,
}

/// Run a fix pass over `vault_dir` and print the summary. Returns the process exit code.
pub fn fix(config: &Config, vault_dir: &Path, args: &FixArgs, output: &Output) -> Result<i32> {
    if !vault_dir.is_dir() {
        bail!("Vault directory not found: {}", vault_dir.display());
    }
    if args.interactive && output.is_json() {
        bail!("--interactive cannot be combined with --json");
    }

    let schema_path = vault_dir.join(config.schema_path());
    let schema = Schema::load(&schema_path)
        .with_context(|| format!("Failed to load schema for vault {}", vault_dir.display()))?;
    let results = load_audit_report(&args.audit, vault_dir)?;

    let missing: Vec<&str> = results
        .iter()
        .filter(|r| !r.path.is_file())
        .map(|r| r.relative_path.as_str())
        .collect();
    if !missing.is_empty() {
        output.warn(&format!(
            "Warning: {} file(s) in the audit report no longer exist: {}",
            missing.len(),
            missing.join(", ")
        ));
    }

    let issue_count: usize = results.iter().map(|r| r.issues.len()).sum();
    output.verbose(&format!(
        "Loaded {} issue(s) across {} file(s) from {}",
        issue_count,
        results.len(),
        args.audit.display()
    ));

    let options = FixOptions {
        dry_run: args.dry_run,
        dry_run_reason: args.dry_run_reason.clone(),
        similar_field_limit: config.similar_field_limit(),
    };

    let summary = if args.interactive {
        let mut prompter = TerminalPrompter;
        run_interactive_fix(&results, &schema, vault_dir, &options, output, &mut prompter)
    } else {
        run_auto_fix(&results, &schema, vault_dir, &options, output)
    };

    if output.is_json() {
        output.json(&JsonOutput::new(schema_ids::FIX, &summary))?;
    } else {
        output.data(&report::format_human(&summary));
    }

    Ok(exit_code(&summary))
}

pub fn exit_code(summary: &FixSummary) -> i32 {
    if summary.interrupted {
        exit_codes::INTERRUPTED
    } else if summary.is_clean() {
        exit_codes::CLEAN
    } else {
        exit_codes::ISSUES_REMAIN
    }
}
