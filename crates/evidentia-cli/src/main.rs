//! # evidentia CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use evidentia_cli::catalog::{run_catalog, CatalogArgs};
use evidentia_cli::presign::{run_presign, PresignArgs};
use evidentia_cli::token::{run_token, TokenArgs};

/// Evidentia operator CLI.
///
/// Mints development tokens, validates requirement template catalogs, and
/// signs or verifies blob gateway URLs.
#[derive(Parser, Debug)]
#[command(name = "evidentia", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mint or inspect identity tokens.
    Token(TokenArgs),

    /// Validate or list requirement template catalogs.
    Catalog(CatalogArgs),

    /// Sign or verify blob gateway URLs.
    Presign(PresignArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Token(args) => run_token(&args),
        Commands::Catalog(args) => run_catalog(&args),
        Commands::Presign(args) => run_presign(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_catalog_check() {
        let cli = Cli::try_parse_from(["evidentia", "catalog", "check", "catalog.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Catalog(_)));
    }

    #[test]
    fn cli_parse_token_mint() {
        let cli = Cli::try_parse_from([
            "evidentia",
            "-vv",
            "token",
            "mint",
            "--tenant-id",
            "6f1c2d4e-8a9b-4c3d-9e8f-1a2b3c4d5e6f",
            "--email",
            "cco@acme-ria.com",
            "--role",
            "viewer",
            "--secret",
            "dev",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Token(_)));
    }

    #[test]
    fn cli_rejects_malformed_tenant_id() {
        let parsed = Cli::try_parse_from([
            "evidentia",
            "token",
            "mint",
            "--tenant-id",
            "acme",
            "--email",
            "a@b.com",
            "--secret",
            "dev",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_parse_presign_verify() {
        let cli = Cli::try_parse_from([
            "evidentia",
            "presign",
            "--key",
            "k",
            "verify",
            "https://storage.local/evidentia-evidence/x?method=GET",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Presign(_)));
    }
}
