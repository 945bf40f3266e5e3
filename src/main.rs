use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser, Subcommand};
use std::path::PathBuf;

mod audit;
mod bulk_move;
mod coerce;
mod commands;
mod config;
mod dates;
mod exit_codes;
mod header;
mod links;
mod note;
mod output;
mod prompt;
mod schema;
mod splice;
mod suggest;
use config::{Config, ConfigError};
use output::{JsonError, Output};

/// Version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "vaultfix")]
#[command(version = VERSION)]
#[command(about = "Repair schema audit findings in a markdown vault", long_about = None)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Path to config file (default: ./vaultfix.toml)
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,

    /// Vault root (overrides VAULTFIX_VAULT env var and config file)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Minimal output (errors and the final summary only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show extra detail about each fix
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fix issues listed in an audit report
    Fix {
        /// Audit report (JSON array of per-file results); "-" reads stdin
        #[arg(long, value_name = "FILE")]
        audit: PathBuf,

        /// Resolve each issue through prompts instead of the unattended pass
        #[arg(short, long, conflicts_with = "json")]
        interactive: bool,

        /// Show what would change without writing any file
        #[arg(long)]
        dry_run: bool,

        /// Note shown in the summary explaining why this is a dry run
        #[arg(long, value_name = "TEXT", requires = "dry_run")]
        dry_run_reason: Option<String>,
    },
}

fn main() {
    // Load .env file if present (before parsing CLI so env vars are available)
    let _ = dotenvy::dotenv();

    // Check for --json flag early (before full parsing) for error handling
    let json_mode = std::env::args().any(|arg| arg == "--json");

    // Use try_parse to handle clap errors in JSON mode
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if json_mode
                && !matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
            {
                JsonError::new("usage_error", e.to_string()).print();
                std::process::exit(2);
            }
            // Human mode: let clap print its formatted output
            e.exit();
        }
    };

    let output = Output::new(cli.json, cli.quiet, cli.verbose);

    match run(cli, &output) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let (code, tag) = if e.downcast_ref::<ConfigError>().is_some() {
                (exit_codes::CONFIG_ERROR, "config_error")
            } else {
                (exit_codes::OPERATIONAL_FAILURE, "operational_failure")
            };
            if json_mode {
                // Use full error chain for details (same as human mode)
                JsonError::new(tag, e.to_string())
                    .with_details(format!("{e:#}"))
                    .print();
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(code);
        }
    }
}

fn run(cli: Cli, output: &Output) -> Result<i32> {
    let config = Config::load(cli.config_path.as_deref()).context(ConfigError)?;
    let vault_dir = config.resolve_vault_dir(
        cli.vault.as_deref(),
        std::env::var(config::VAULT_ENV_VAR).ok(),
    );

    match cli.command {
        Commands::Fix {
            audit,
            interactive,
            dry_run,
            dry_run_reason,
        } => {
            let args = commands::FixArgs {
                audit,
                interactive,
                dry_run,
                dry_run_reason,
            };
            commands::fix(&config, &vault_dir, &args, output)
        }
    }
}
