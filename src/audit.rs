//! Audit findings consumed by the fixer.
//!
//! The scan that detects issues runs elsewhere and hands over a JSON report: an array of
//! per-file results, each with the issues found in audit-pass order. Each issue carries a
//! `code` that determines which other attributes it has, so issues are modeled as one enum
//! variant per code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::coerce::ScalarKind;
use crate::links::LinkFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One anomaly found in one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditIssue {
    pub severity: Severity,
    pub message: String,
    /// The scan judged this safe to fix without asking
    #[serde(default)]
    pub auto_fixable: bool,
    #[serde(flatten)]
    pub kind: IssueKind,
}

/// Issue code plus the attributes that code carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum IssueKind {
    /// Note has no type discriminator
    OrphanFile { inferred_type: Option<String> },
    /// Type discriminator names no known type
    InvalidType {
        field: Option<String>,
        value: Option<Value>,
    },
    MissingRequired {
        field: String,
        /// Default supplied by the scan
        value: Option<Value>,
    },
    EmptyStringRequired {
        field: String,
        value: Option<Value>,
    },
    InvalidOption {
        field: String,
        value: Option<Value>,
        #[serde(default)]
        expected: Vec<String>,
        suggestion: Option<Value>,
    },
    /// Relation points at a note of a type the field doesn't accept
    InvalidSourceType {
        field: String,
        value: Option<Value>,
        #[serde(default)]
        expected_types: Vec<String>,
        #[serde(default)]
        candidates: Vec<String>,
        suggestion: Option<Value>,
    },
    UnknownField {
        field: String,
        value: Option<Value>,
    },
    WrongDirectory { expected_directory: String },
    FormatViolation {
        field: String,
        expected_format: LinkFormat,
    },
    /// Link target doesn't exist
    StaleReference {
        field: String,
        value: Option<Value>,
        target_name: String,
        #[serde(default)]
        similar_files: Vec<String>,
        list_index: Option<usize>,
    },
    /// Link target name matches several notes
    AmbiguousLinkTarget {
        field: String,
        target_name: String,
        #[serde(default)]
        candidates: Vec<String>,
        list_index: Option<usize>,
    },
    /// Link points at a note owned by another note
    OwnedNoteReferenced { field: String, owner_path: String },
    ParentCycle {
        field: String,
        #[serde(default)]
        cycle_path: Vec<String>,
    },
    SelfReference {
        field: String,
        list_index: Option<usize>,
    },
    InvalidListElement {
        field: String,
        list_index: usize,
        value: Option<Value>,
    },
    InvalidDateFormat {
        field: String,
        value: Option<Value>,
        /// Already-normalized ISO date supplied by the scan
        suggestion: Option<String>,
    },
    FrontmatterNotAtTop,
    DuplicateFrontmatterKeys { duplicate_key: String },
    MalformedWikilink {
        field: String,
        list_index: Option<usize>,
        value: Option<Value>,
        fixed_value: Option<String>,
    },
    InvalidBooleanCoercion {
        field: String,
        value: Option<Value>,
    },
    WrongScalarType {
        field: String,
        value: Option<Value>,
        expected_type: ScalarKind,
    },
    UnknownEnumCasing {
        field: String,
        value: Option<Value>,
        canonical_value: String,
    },
    DuplicateListValues { field: String },
    FrontmatterKeyCasing { field: String, canonical_key: String },
    SingularPluralMismatch { field: String, canonical_key: String },
    TrailingWhitespace { field: String },
}

impl IssueKind {
    /// The wire code for this issue.
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::OrphanFile { .. } => "orphan-file",
            IssueKind::InvalidType { .. } => "invalid-type",
            IssueKind::MissingRequired { .. } => "missing-required",
            IssueKind::EmptyStringRequired { .. } => "empty-string-required",
            IssueKind::InvalidOption { .. } => "invalid-option",
            IssueKind::InvalidSourceType { .. } => "invalid-source-type",
            IssueKind::UnknownField { .. } => "unknown-field",
            IssueKind::WrongDirectory { .. } => "wrong-directory",
            IssueKind::FormatViolation { .. } => "format-violation",
            IssueKind::StaleReference { .. } => "stale-reference",
            IssueKind::AmbiguousLinkTarget { .. } => "ambiguous-link-target",
            IssueKind::OwnedNoteReferenced { .. } => "owned-note-referenced",
            IssueKind::ParentCycle { .. } => "parent-cycle",
            IssueKind::SelfReference { .. } => "self-reference",
            IssueKind::InvalidListElement { .. } => "invalid-list-element",
            IssueKind::InvalidDateFormat { .. } => "invalid-date-format",
            IssueKind::FrontmatterNotAtTop => "frontmatter-not-at-top",
            IssueKind::DuplicateFrontmatterKeys { .. } => "duplicate-frontmatter-keys",
            IssueKind::MalformedWikilink { .. } => "malformed-wikilink",
            IssueKind::InvalidBooleanCoercion { .. } => "invalid-boolean-coercion",
            IssueKind::WrongScalarType { .. } => "wrong-scalar-type",
            IssueKind::UnknownEnumCasing { .. } => "unknown-enum-casing",
            IssueKind::DuplicateListValues { .. } => "duplicate-list-values",
            IssueKind::FrontmatterKeyCasing { .. } => "frontmatter-key-casing",
            IssueKind::SingularPluralMismatch { .. } => "singular-plural-mismatch",
            IssueKind::TrailingWhitespace { .. } => "trailing-whitespace",
        }
    }

    /// The frontmatter field the issue is about, for codes that have one.
    pub fn field(&self) -> Option<&str> {
        match self {
            IssueKind::InvalidType { field, .. } => field.as_deref(),
            IssueKind::MissingRequired { field, .. }
            | IssueKind::EmptyStringRequired { field, .. }
            | IssueKind::InvalidOption { field, .. }
            | IssueKind::InvalidSourceType { field, .. }
            | IssueKind::UnknownField { field, .. }
            | IssueKind::FormatViolation { field, .. }
            | IssueKind::StaleReference { field, .. }
            | IssueKind::AmbiguousLinkTarget { field, .. }
            | IssueKind::OwnedNoteReferenced { field, .. }
            | IssueKind::ParentCycle { field, .. }
            | IssueKind::SelfReference { field, .. }
            | IssueKind::InvalidListElement { field, .. }
            | IssueKind::InvalidDateFormat { field, .. }
            | IssueKind::MalformedWikilink { field, .. }
            | IssueKind::InvalidBooleanCoercion { field, .. }
            | IssueKind::WrongScalarType { field, .. }
            | IssueKind::UnknownEnumCasing { field, .. }
            | IssueKind::DuplicateListValues { field }
            | IssueKind::FrontmatterKeyCasing { field, .. }
            | IssueKind::SingularPluralMismatch { field, .. }
            | IssueKind::TrailingWhitespace { field } => Some(field),
            IssueKind::DuplicateFrontmatterKeys { duplicate_key } => Some(duplicate_key),
            IssueKind::OrphanFile { .. }
            | IssueKind::WrongDirectory { .. }
            | IssueKind::FrontmatterNotAtTop => None,
        }
    }

    /// Coercions the batch fixer runs first, with their own messaging.
    pub fn is_scalar_coercion(&self) -> bool {
        matches!(
            self,
            IssueKind::InvalidBooleanCoercion { .. } | IssueKind::WrongScalarType { .. }
        )
    }

    /// Key renames that must land before an unknown-field migration for the same key.
    pub fn renames_field(&self, name: &str) -> bool {
        match self {
            IssueKind::FrontmatterKeyCasing { field, .. }
            | IssueKind::SingularPluralMismatch { field, .. } => field == name,
            _ => false,
        }
    }
}

impl AuditIssue {
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn field(&self) -> Option<&str> {
        self.kind.field()
    }
}

/// Audit results for one note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAuditResult {
    /// Absolute path, or relative to the vault root. Filled from `relative_path` when empty.
    #[serde(default)]
    pub path: PathBuf,
    pub relative_path: String,
    #[serde(default)]
    pub issues: Vec<AuditIssue>,
}

/// Load an audit report from a file, or from stdin when `source` is `-`.
///
/// Relative note paths are resolved against `vault_dir`.
pub fn load_audit_report(source: &Path, vault_dir: &Path) -> Result<Vec<FileAuditResult>> {
    let contents = if source == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read audit report from stdin")?;
        buf
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("read audit report: {}", source.display()))?
    };
    parse_audit_report(&contents, vault_dir)
}

pub fn parse_audit_report(contents: &str, vault_dir: &Path) -> Result<Vec<FileAuditResult>> {
    let mut results: Vec<FileAuditResult> =
        serde_json::from_str(contents).context("parse audit report")?;
    for result in &mut results {
        if result.path.as_os_str().is_empty() {
            result.path = vault_dir.join(&result.relative_path);
        } else if result.path.is_relative() {
            result.path = vault_dir.join(&result.path);
        }
    }
    Ok(results)
}
