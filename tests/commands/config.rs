//! Integration tests for configuration and vault resolution.

use crate::common::{audit_entry, stdout, TestVault};
use serde_json::json;
use std::process::Command;

#[test]
fn test_vault_from_config_file() {
    let vault = TestVault::new();
    vault.write_file(
        "notes/Objectives/Plan.md",
        "---\ntype: objective\nstatus: 'raw '\n---\n",
    );
    vault.write_file(
        "notes/meta/schema.json",
        &vault.read_file(".vaultfix/schema.json"),
    );
    vault.write_file(
        "vaultfix.toml",
        "[vault]\npath = \"notes\"\nschema = \"meta/schema.json\"\n",
    );
    let audit = vault.write_audit(json!([audit_entry(
        "Objectives/Plan.md",
        json!([
            { "code": "trailing-whitespace", "severity": "warning", "autoFixable": true,
              "message": "Trailing whitespace in 'status'", "field": "status" }
        ])
    )]));

    // No --vault: the config in the working directory names the vault
    let output = Command::new(env!("CARGO_BIN_EXE_vaultfix"))
        .args(["fix", "--audit", audit.to_str().unwrap()])
        .current_dir(vault.root())
        .env_remove("VAULTFIX_VAULT")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute vaultfix");

    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
    assert!(vault
        .read_file("notes/Objectives/Plan.md")
        .contains("status: raw\n"));
}

#[test]
fn test_missing_explicit_config_is_config_error() {
    let vault = TestVault::new();
    let audit = vault.write_audit(json!([]));
    let output = vault.run_vaultfix_code(
        &["--config", "missing.toml", "fix", "--audit", audit.to_str().unwrap()],
        12,
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("Config file not found"));
}

#[test]
fn test_config_traversal_is_config_error() {
    let vault = TestVault::new();
    vault.write_file("bad.toml", "[vault]\nschema = \"../schema.json\"\n");
    let audit = vault.write_audit(json!([]));
    vault.run_vaultfix_code(
        &["--config", "bad.toml", "fix", "--audit", audit.to_str().unwrap()],
        12,
    );
}

#[test]
fn test_missing_vault_dir_fails() {
    let vault = TestVault::new();
    let audit = vault.write_audit(json!([]));
    let output = Command::new(env!("CARGO_BIN_EXE_vaultfix"))
        .args(["--vault", "does-not-exist", "fix", "--audit"])
        .arg(&audit)
        .current_dir(vault.root())
        .output()
        .expect("Failed to execute vaultfix");
    assert_eq!(output.status.code(), Some(10));
}
