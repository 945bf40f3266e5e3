//! Integration tests for `vaultfix fix`.

use crate::common::{audit_entry, parse_json, stdout, TestVault};
use serde_json::json;

const TASK_HEADER: &str = "type: objective\nobjective-type: task\n";

// ============================================================================
// Batch fixing
// ============================================================================

#[test]
fn test_fix_dedupes_and_trims() {
    let vault = TestVault::new();
    vault.write_file(
        "Objectives/Tasks/Plan.md",
        &format!("---\n{TASK_HEADER}status: 'active '\ntags: [a, b, a]\n---\nBody stays.\n"),
    );
    let audit = vault.write_audit(json!([audit_entry(
        "Objectives/Tasks/Plan.md",
        json!([
            { "code": "trailing-whitespace", "severity": "warning", "autoFixable": true,
              "message": "Trailing whitespace in 'status'", "field": "status" },
            { "code": "duplicate-list-values", "severity": "warning", "autoFixable": true,
              "message": "Duplicate values in 'tags'", "field": "tags" }
        ])
    )]));

    let output = vault.run_vaultfix_code(&["fix", "--audit", audit.to_str().unwrap()], 0);

    let text = vault.read_file("Objectives/Tasks/Plan.md");
    assert!(text.contains("status: active\n"), "status not trimmed:\n{}", text);
    assert!(text.contains("- a\n- b\n") || text.contains("tags:\n- a\n- b"), "tags:\n{}", text);
    assert!(text.ends_with("---\nBody stays.\n"));
    assert!(stdout(&output).contains("2 fixed, 0 skipped, 0 failed, 0 remaining"));
}

#[test]
fn test_fix_moves_then_fixes_at_new_path() {
    let vault = TestVault::new();
    vault.write_file(
        "Inbox/Plan.md",
        &format!("---\n{TASK_HEADER}status: 'raw '\n---\n"),
    );
    vault.write_file("Index.md", "See [[Inbox/Plan]].\n");
    let audit = vault.write_audit(json!([audit_entry(
        "Inbox/Plan.md",
        json!([
            { "code": "trailing-whitespace", "severity": "warning", "autoFixable": true,
              "message": "Trailing whitespace in 'status'", "field": "status" },
            { "code": "wrong-directory", "severity": "warning", "autoFixable": true,
              "message": "Note belongs in Objectives/Tasks", "expectedDirectory": "Objectives/Tasks" }
        ])
    )]));

    vault.run_vaultfix_code(&["fix", "--audit", audit.to_str().unwrap()], 0);

    assert!(!vault.file_exists("Inbox/Plan.md"));
    assert!(vault
        .read_file("Objectives/Tasks/Plan.md")
        .contains("status: raw\n"));
    assert_eq!(vault.read_file("Index.md"), "See [[Objectives/Tasks/Plan]].\n");
}

#[test]
fn test_fix_leaves_manual_issues_for_review() {
    let vault = TestVault::new();
    vault.write_file(
        "Objectives/Tasks/Plan.md",
        &format!("---\n{TASK_HEADER}status: raw\nparent: '[[Plan]]'\n---\n"),
    );
    let audit = vault.write_audit(json!([audit_entry(
        "Objectives/Tasks/Plan.md",
        json!([
            { "code": "self-reference", "severity": "error", "autoFixable": false,
              "message": "'parent' links to the note itself", "field": "parent" }
        ])
    )]));

    let output = vault.run_vaultfix_code(&["fix", "--audit", audit.to_str().unwrap()], 1);

    let out = stdout(&output);
    assert!(out.contains("0 fixed, 0 skipped, 0 failed, 1 remaining"), "{}", out);
    assert!(out.contains("Needs manual review:"));
    assert!(out.contains("self-reference (1)"));
    assert!(vault.read_file("Objectives/Tasks/Plan.md").contains("[[Plan]]"));
}

#[test]
fn test_fix_reports_failure_and_continues() {
    let vault = TestVault::new();
    vault.write_file(
        "Objectives/Tasks/A.md",
        &format!("---\n{TASK_HEADER}priority: high\n---\n"),
    );
    vault.write_file(
        "Objectives/Tasks/B.md",
        &format!("---\n{TASK_HEADER}status: 'done '\n---\n"),
    );
    let audit = vault.write_audit(json!([
        audit_entry(
            "Objectives/Tasks/A.md",
            json!([
                { "code": "wrong-scalar-type", "severity": "error", "autoFixable": true,
                  "message": "'priority' should be a number", "field": "priority",
                  "value": "high", "expectedType": "number" }
            ])
        ),
        audit_entry(
            "Objectives/Tasks/B.md",
            json!([
                { "code": "trailing-whitespace", "severity": "warning", "autoFixable": true,
                  "message": "Trailing whitespace in 'status'", "field": "status" }
            ])
        )
    ]));

    let output = vault.run_vaultfix_code(&["fix", "--audit", audit.to_str().unwrap()], 1);

    assert!(stdout(&output).contains("1 fixed, 0 skipped, 1 failed"));
    assert!(vault.read_file("Objectives/Tasks/A.md").contains("priority: high"));
    assert!(vault.read_file("Objectives/Tasks/B.md").contains("status: done\n"));
}

#[test]
fn test_fix_reads_audit_from_stdin() {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let vault = TestVault::new();
    vault.write_file(
        "Objectives/Tasks/Plan.md",
        &format!("---\n{TASK_HEADER}status: 'raw '\n---\n"),
    );
    let report = json!([audit_entry(
        "Objectives/Tasks/Plan.md",
        json!([
            { "code": "trailing-whitespace", "severity": "warning", "autoFixable": true,
              "message": "Trailing whitespace in 'status'", "field": "status" }
        ])
    )]);

    let mut child = Command::new(env!("CARGO_BIN_EXE_vaultfix"))
        .arg("--vault")
        .arg(vault.root())
        .args(["--quiet", "fix", "--audit", "-"])
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn vaultfix");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(report.to_string().as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
    assert!(vault
        .read_file("Objectives/Tasks/Plan.md")
        .contains("status: raw\n"));
}

// ============================================================================
// Dry runs
// ============================================================================

#[test]
fn test_dry_run_changes_nothing() {
    let vault = TestVault::new();
    let original = format!("---\n{TASK_HEADER}status: 'active '\ntags: [a, a]\n---\nBody\n");
    vault.write_file("Inbox/Plan.md", &original);
    vault.write_file("Index.md", "[[Inbox/Plan]]\n");
    let audit = vault.write_audit(json!([audit_entry(
        "Inbox/Plan.md",
        json!([
            { "code": "trailing-whitespace", "severity": "warning", "autoFixable": true,
              "message": "Trailing whitespace in 'status'", "field": "status" },
            { "code": "duplicate-list-values", "severity": "warning", "autoFixable": true,
              "message": "Duplicate values in 'tags'", "field": "tags" },
            { "code": "wrong-directory", "severity": "warning", "autoFixable": true,
              "message": "Note belongs in Objectives/Tasks", "expectedDirectory": "Objectives/Tasks" }
        ])
    )]));

    let output = vault.run_vaultfix_code(
        &[
            "fix",
            "--audit",
            audit.to_str().unwrap(),
            "--dry-run",
            "--dry-run-reason",
            "review first",
        ],
        0,
    );

    assert_eq!(vault.read_file("Inbox/Plan.md"), original);
    assert_eq!(vault.read_file("Index.md"), "[[Inbox/Plan]]\n");
    assert!(!vault.file_exists("Objectives/Tasks/Plan.md"));
    let out = stdout(&output);
    assert!(out.contains("Dry run: no files were changed (review first)"), "{}", out);
    assert!(out.contains("3 fixed"));
}

#[test]
fn test_dry_run_reason_requires_dry_run() {
    let vault = TestVault::new();
    let audit = vault.write_audit(json!([]));
    vault.run_vaultfix_code(
        &["fix", "--audit", audit.to_str().unwrap(), "--dry-run-reason", "x"],
        2,
    );
}

// ============================================================================
// Errors and exit codes
// ============================================================================

#[test]
fn test_missing_audit_is_operational_failure() {
    let vault = TestVault::new();
    let output = vault.run_vaultfix_code(&["fix", "--audit", "nope.json"], 10);
    assert!(String::from_utf8_lossy(&output.stderr).contains("read audit report"));
}

#[test]
fn test_missing_schema_is_operational_failure() {
    let vault = TestVault::new();
    std::fs::remove_file(vault.path(".vaultfix/schema.json")).unwrap();
    let audit = vault.write_audit(json!([]));
    let output = vault.run_vaultfix_code(&["fix", "--audit", audit.to_str().unwrap()], 10);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load schema"));
}

#[test]
fn test_empty_audit_is_clean() {
    let vault = TestVault::new();
    let audit = vault.write_audit(json!([]));
    let output = vault.run_vaultfix_code(&["fix", "--audit", audit.to_str().unwrap()], 0);
    assert!(stdout(&output).contains("0 fixed, 0 skipped, 0 failed, 0 remaining"));
}

#[test]
fn test_interactive_rejects_json() {
    let vault = TestVault::new();
    let audit = vault.write_audit(json!([]));
    let output = vault.run_vaultfix(&[
        "--json",
        "fix",
        "--audit",
        audit.to_str().unwrap(),
        "--interactive",
    ]);
    assert!(!output.status.success());
    let json = parse_json(&output);
    assert_eq!(json["ok"], false);
}

#[test]
fn test_warns_about_missing_audited_files() {
    let vault = TestVault::new();
    let audit = vault.write_audit(json!([audit_entry(
        "Objectives/Gone.md",
        json!([
            { "code": "trailing-whitespace", "severity": "warning", "autoFixable": true,
              "message": "Trailing whitespace in 'status'", "field": "status" }
        ])
    )]));
    let output = vault.run_vaultfix_code(&["fix", "--audit", audit.to_str().unwrap()], 1);
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(
        err.contains("1 file(s) in the audit report no longer exist: Objectives/Gone.md"),
        "{}",
        err
    );
    assert!(stdout(&output).contains("1 failed"));
}
