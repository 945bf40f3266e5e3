use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::fix::common::DEFAULT_SIMILAR_FIELD_LIMIT;
use crate::schema::DEFAULT_SCHEMA_PATH;

/// Environment variable naming the vault root.
pub const VAULT_ENV_VAR: &str = "VAULTFIX_VAULT";

/// Context marker for errors caused by configuration rather than by the vault.
/// `main` looks for it to choose the exit code.
#[derive(Debug)]
pub struct ConfigError;

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid configuration")
    }
}

/// Main configuration structure loaded from vaultfix.toml
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub vault: Option<VaultConfig>,
    pub fix: Option<FixConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    pub path: Option<String>,
    /// Schema file, relative to the vault root
    pub schema: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FixConfig {
    /// Candidates shown by the unknown-field picker
    pub similar_field_limit: Option<usize>,
}

impl Config {
    /// Load config from file, or return default if no config exists.
    /// If an explicit path is provided via --config, it MUST exist (error if not).
    /// If no path is provided, check ./vaultfix.toml (use default if not found).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                // User explicitly specified a path - it MUST exist
                if !p.exists() {
                    bail!("Config file not found: {}", p.display());
                }
                p
            }
            None => {
                let default_path = Path::new("vaultfix.toml");
                if default_path.exists() {
                    default_path
                } else {
                    return Ok(Config::default());
                }
            }
        };

        let contents = fs::read_to_string(config_path)?;
        Self::parse(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(ref p) = self.vault.as_ref().and_then(|v| v.schema.as_ref()) {
            Self::validate_path(p, "vault.schema")?;
        }
        if self.fix.as_ref().and_then(|f| f.similar_field_limit) == Some(0) {
            bail!("Invalid fix.similar_field_limit: must be at least 1");
        }
        Ok(())
    }

    /// Validate a single path doesn't contain path traversal
    fn validate_path(path: &str, field: &str) -> Result<()> {
        if path.contains("..") {
            bail!(
                "Invalid {} path '{}': paths cannot contain '..'",
                field,
                path
            );
        }
        if Path::new(path).is_absolute() {
            bail!("Invalid {} path '{}': paths must be relative", field, path);
        }
        Ok(())
    }

    /// Vault root with resolution order: CLI > env > config > current directory
    pub fn resolve_vault_dir(
        &self,
        cli_vault: Option<&Path>,
        env_vault: Option<String>,
    ) -> PathBuf {
        if let Some(dir) = cli_vault {
            return dir.to_path_buf();
        }
        if let Some(dir) = env_vault.filter(|v| !v.trim().is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(dir) = self.vault.as_ref().and_then(|v| v.path.as_ref()) {
            return PathBuf::from(dir);
        }
        PathBuf::from(".")
    }

    /// Schema path relative to the vault root
    pub fn schema_path(&self) -> &str {
        self.vault
            .as_ref()
            .and_then(|v| v.schema.as_deref())
            .unwrap_or(DEFAULT_SCHEMA_PATH)
    }

    pub fn similar_field_limit(&self) -> usize {
        self.fix
            .as_ref()
            .and_then(|f| f.similar_field_limit)
            .unwrap_or(DEFAULT_SIMILAR_FIELD_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_path(), ".vaultfix/schema.json");
        assert_eq!(config.similar_field_limit(), 5);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
[vault]
path = "notes"
schema = "meta/schema.json"

[fix]
similar_field_limit = 3
"#,
        )
        .unwrap();
        assert_eq!(config.schema_path(), "meta/schema.json");
        assert_eq!(config.similar_field_limit(), 3);
        assert_eq!(config.resolve_vault_dir(None, None), PathBuf::from("notes"));
    }

    #[test]
    fn test_vault_dir_resolution() {
        let config = Config::parse("[vault]\npath = \"notes\"\n").unwrap();

        // CLI takes precedence
        assert_eq!(
            config.resolve_vault_dir(Some(Path::new("cli")), Some("env".into())),
            PathBuf::from("cli")
        );
        // Then the environment
        assert_eq!(
            config.resolve_vault_dir(None, Some("env".into())),
            PathBuf::from("env")
        );
        assert_eq!(
            config.resolve_vault_dir(None, Some("  ".into())),
            PathBuf::from("notes")
        );
        assert_eq!(
            Config::default().resolve_vault_dir(None, None),
            PathBuf::from(".")
        );
    }

    #[test]
    fn test_validate_path_rejects_traversal() {
        let result = Config::validate_path("../etc/passwd", "vault.schema");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains(".."));
    }

    #[test]
    fn test_validate_path_rejects_absolute() {
        let result = Config::validate_path("/etc/schema.json", "vault.schema");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("relative"));
    }

    #[test]
    fn test_validate_path_accepts_nested() {
        assert!(Config::validate_path(".vaultfix/schemas/main.json", "vault.schema").is_ok());
    }

    #[test]
    fn test_schema_traversal_rejected_on_parse() {
        let err = Config::parse("[vault]\nschema = \"../outside.json\"\n").unwrap_err();
        assert!(err.to_string().contains("vault.schema"));
    }

    #[test]
    fn test_zero_similar_field_limit_rejected() {
        assert!(Config::parse("[fix]\nsimilar_field_limit = 0\n").is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::parse("[vault]\nroot = \"x\"\n").is_err());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));

        let present = dir.path().join("vaultfix.toml");
        fs::write(&present, "[fix]\nsimilar_field_limit = 2\n").unwrap();
        assert_eq!(Config::load(Some(&present)).unwrap().similar_field_limit(), 2);
    }
}
