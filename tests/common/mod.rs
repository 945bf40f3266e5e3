//! Common test infrastructure for vaultfix integration tests.
//!
//! Provides:
//! - TestVault: Temp vault with a schema, notes, and an audit report
//! - Output assertion helpers

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Schema written into every test vault.
pub const SCHEMA: &str = r#"{
    "types": {
        "objective": {
            "output_dir": "Objectives",
            "fields": {
                "status": { "kind": "select", "options": ["raw", "active", "done"], "required": true },
                "tags": { "kind": "list" }
            },
            "field_order": ["status", "tags"]
        },
        "task": {
            "extends": "objective",
            "output_dir": "Objectives/Tasks",
            "fields": {
                "priority": { "kind": "number" },
                "archived": { "kind": "boolean" },
                "parent": { "kind": "relation", "source": ["objective"] }
            },
            "field_order": ["priority", "archived", "parent"]
        }
    }
}"#;

/// A vault in a temp directory, with the schema at its default location.
pub struct TestVault {
    pub dir: tempfile::TempDir,
}

impl TestVault {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let vault = Self { dir };
        vault.write_file(".vaultfix/schema.json", SCHEMA);
        vault
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Get path to a file in the vault
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(&path, contents).unwrap_or_else(|_| panic!("Failed to write {}", relative));
    }

    /// Write an audit report next to the vault and return its path
    pub fn write_audit(&self, report: serde_json::Value) -> PathBuf {
        let path = self.path(".vaultfix/audit.json");
        std::fs::write(&path, report.to_string()).expect("Failed to write audit report");
        path
    }

    /// Check if a file exists in the vault
    pub fn file_exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Read a file from the vault
    pub fn read_file(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative))
            .unwrap_or_else(|_| panic!("Failed to read {}", relative))
    }

    /// Run vaultfix against this vault with an isolated environment
    pub fn run_vaultfix(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_vaultfix"))
            .arg("--vault")
            .arg(self.root())
            .args(args)
            .current_dir(self.root())
            // Isolate environment
            .env_clear()
            .env("HOME", self.root())
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to execute vaultfix")
    }

    /// Run vaultfix and assert the given exit code
    pub fn run_vaultfix_code(&self, args: &[&str], expected_code: i32) -> Output {
        let output = self.run_vaultfix(args);
        assert_eq!(
            output.status.code(),
            Some(expected_code),
            "vaultfix {:?} expected exit {} but got {:?}:\nstdout: {}\nstderr: {}",
            args,
            expected_code,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }
}

/// One audit entry for `relative`, with `issues` as given.
pub fn audit_entry(relative: &str, issues: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "relativePath": relative, "issues": issues })
}

// ============================================================================
// Output assertion helpers
// ============================================================================

/// Parse JSON output and return the value
pub fn parse_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| {
        panic!(
            "Invalid JSON output:\n{}\nError: {}\nstderr: {}",
            stdout,
            e,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

/// Get stdout as string
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Get stderr as string
#[allow(dead_code)]
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
