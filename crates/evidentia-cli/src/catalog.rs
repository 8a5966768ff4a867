//! # Catalog CLI: Validate and list requirement template catalogs.
//!
//! `check` runs exactly the validation the API server runs at startup, so
//! a file that passes here will not abort a deployment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use evidentia_core::RegulatoryFramework;
use evidentia_state::TemplateCatalog;

/// Catalog subcommand arguments.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

/// Available catalog subcommands.
#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Validate a catalog file and summarize it per framework.
    Check {
        /// Path to the YAML catalog.
        path: PathBuf,
    },

    /// List active templates.
    List {
        /// Catalog file. The built-in catalog when omitted.
        #[arg(long, env = "EVIDENTIA_TEMPLATE_CATALOG")]
        path: Option<PathBuf>,

        /// Only this framework (sec_ria, finra, state_insurance, hipaa).
        #[arg(long)]
        framework: Option<String>,
    },
}

/// Execute the catalog subcommand.
pub fn run_catalog(args: &CatalogArgs) -> Result<u8> {
    match &args.command {
        CatalogCommand::Check { path } => run_check(path),
        CatalogCommand::List { path, framework } => run_list(path.as_deref(), framework.as_deref()),
    }
}

fn load(path: Option<&Path>) -> Result<TemplateCatalog> {
    match path {
        Some(path) => TemplateCatalog::from_path(path)
            .with_context(|| format!("catalog {} is invalid", path.display())),
        None => TemplateCatalog::builtin().context("built-in catalog is invalid"),
    }
}

/// Per-framework count of active templates, in framework order.
pub fn summarize(catalog: &TemplateCatalog) -> Vec<(RegulatoryFramework, usize)> {
    RegulatoryFramework::ALL
        .iter()
        .map(|fw| (*fw, catalog.for_framework(*fw).len()))
        .collect()
}

fn run_check(path: &Path) -> Result<u8> {
    let catalog = load(Some(path))?;
    let retired = catalog.all().iter().filter(|t| !t.is_active).count();

    println!("{}: OK", path.display());
    for (framework, count) in summarize(&catalog) {
        println!("  {:<16} {count}", framework.as_str());
    }
    println!("  {:<16} {retired}", "retired");

    let empty: Vec<&str> = summarize(&catalog)
        .into_iter()
        .filter(|(_, n)| *n == 0)
        .map(|(fw, _)| fw.as_str())
        .collect();
    if !empty.is_empty() {
        tracing::warn!(frameworks = ?empty, "frameworks without active templates");
    }
    Ok(0)
}

fn run_list(path: Option<&Path>, framework: Option<&str>) -> Result<u8> {
    let catalog = load(path)?;
    let frameworks: Vec<RegulatoryFramework> = match framework {
        Some(name) => vec![RegulatoryFramework::parse(name).map_err(|e| anyhow::anyhow!("{e}"))?],
        None => RegulatoryFramework::ALL.to_vec(),
    };

    for fw in frameworks {
        for t in catalog.for_framework(fw) {
            println!(
                "{:<16} {:<14} {:<10} {}",
                t.id.as_str(),
                fw.as_str(),
                t.frequency.as_str(),
                t.title
            );
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
templates:
  - id: finra-101
    title: Annual Compliance Meeting
    description: Registered persons attend the annual compliance meeting.
    category: employee_training
    regulatory_framework: finra
    authority: FINRA Rule 3270
    frequency: annual
  - id: finra-old
    title: Retired Entry
    description: ""
    category: recordkeeping
    regulatory_framework: finra
    authority: Superseded
    frequency: one_time
    is_active: false
"#;

    #[test]
    fn check_accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, VALID).unwrap();

        assert_eq!(run_check(&path).unwrap(), 0);
        let catalog = load(Some(&path)).unwrap();
        let summary = summarize(&catalog);
        assert!(summary.contains(&(RegulatoryFramework::Finra, 1)));
        assert!(summary.contains(&(RegulatoryFramework::Hipaa, 0)));
    }

    #[test]
    fn check_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.yaml");
        let doubled = format!(
            "{VALID}  - id: finra-101\n    title: Again\n    description: x\n    category: licensing\n    regulatory_framework: finra\n    authority: X\n    frequency: annual\n"
        );
        std::fs::write(&path, doubled).unwrap();

        let err = run_check(&path).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate template id"));
    }

    #[test]
    fn check_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_check(&dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn list_rejects_unknown_framework() {
        assert!(run_list(None, Some("gdpr")).is_err());
        assert_eq!(run_list(None, Some("hipaa")).unwrap(), 0);
    }
}
