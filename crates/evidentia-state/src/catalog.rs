//! # Requirement Template Catalog
//!
//! The global, read-only library tenants activate requirements from. The
//! catalog is a YAML document with a top-level `templates` list. A default
//! catalog is compiled in; deployments may replace it with their own file.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use evidentia_core::{Frequency, RegulatoryFramework, RequirementCategory, TemplateId};

const DEFAULT_CATALOG: &str = include_str!("../catalog/templates.yaml");

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementTemplate {
    /// Catalog slug, e.g. `sec-ria-001`.
    pub id: TemplateId,
    /// Short title.
    pub title: String,
    /// What the requirement asks of the tenant.
    pub description: String,
    /// Functional area.
    pub category: RequirementCategory,
    /// Framework this entry belongs to.
    pub regulatory_framework: RegulatoryFramework,
    /// Rule citation, e.g. "SEC Rule 204A-1".
    pub authority: String,
    /// Hints about what evidence satisfies the requirement.
    #[serde(default)]
    pub evidence_types: Vec<String>,
    /// Recurrence.
    pub frequency: Frequency,
    /// Retired entries stay in the file but are not offered.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct CatalogDocument {
    templates: Vec<RequirementTemplate>,
}

/// Catalog loading failures. All are fatal at startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The file could not be read.
    #[error("failed to read template catalog {path}: {source}")]
    Io {
        /// File that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The document is not valid catalog YAML.
    #[error("invalid template catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two entries share an id.
    #[error("duplicate template id: {0}")]
    DuplicateId(String),

    /// An entry has a blank title.
    #[error("template {0} has an empty title")]
    EmptyTitle(String),
}

/// The validated template library.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<RequirementTemplate>,
}

impl TemplateCatalog {
    /// Parse and validate a YAML catalog.
    pub fn from_yaml(source: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_yaml::from_str(source)?;
        let mut seen = HashSet::new();
        for t in &doc.templates {
            if !seen.insert(t.id.as_str()) {
                return Err(CatalogError::DuplicateId(t.id.to_string()));
            }
            if t.title.trim().is_empty() {
                return Err(CatalogError::EmptyTitle(t.id.to_string()));
            }
        }
        Ok(Self {
            templates: doc.templates,
        })
    }

    /// Read and validate a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    /// The compiled-in catalog.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(DEFAULT_CATALOG)
    }

    /// Look up an active template by id.
    pub fn get(&self, id: &str) -> Option<&RequirementTemplate> {
        self.templates
            .iter()
            .find(|t| t.is_active && t.id.as_str() == id)
    }

    /// Active templates for one framework, in catalog order.
    pub fn for_framework(&self, framework: RegulatoryFramework) -> Vec<&RequirementTemplate> {
        self.templates
            .iter()
            .filter(|t| t.is_active && t.regulatory_framework == framework)
            .collect()
    }

    /// Every entry, including retired ones.
    pub fn all(&self) -> &[RequirementTemplate] {
        &self.templates
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = TemplateCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        for fw in RegulatoryFramework::ALL {
            assert!(
                !catalog.for_framework(*fw).is_empty(),
                "no templates for {fw}"
            );
        }
    }

    #[test]
    fn code_of_ethics_is_sec_ria_001() {
        let catalog = TemplateCatalog::builtin().unwrap();
        let t = catalog.get("sec-ria-001").unwrap();
        assert_eq!(t.regulatory_framework, RegulatoryFramework::SecRia);
        assert!(t.title.contains("Code of Ethics"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let yaml = r#"
templates:
  - id: a-1
    title: One
    description: ""
    category: recordkeeping
    regulatory_framework: finra
    authority: X
    frequency: annual
  - id: a-1
    title: Two
    description: ""
    category: recordkeeping
    regulatory_framework: finra
    authority: X
    frequency: annual
"#;
        assert!(matches!(
            TemplateCatalog::from_yaml(yaml),
            Err(CatalogError::DuplicateId(id)) if id == "a-1"
        ));
    }

    #[test]
    fn empty_title_is_rejected() {
        let yaml = r#"
templates:
  - id: a-1
    title: "  "
    description: ""
    category: licensing
    regulatory_framework: hipaa
    authority: X
    frequency: one_time
"#;
        assert!(matches!(
            TemplateCatalog::from_yaml(yaml),
            Err(CatalogError::EmptyTitle(_))
        ));
    }

    #[test]
    fn retired_templates_are_hidden() {
        let yaml = r#"
templates:
  - id: old-1
    title: Retired
    description: ""
    category: licensing
    regulatory_framework: finra
    authority: X
    frequency: annual
    is_active: false
"#;
        let catalog = TemplateCatalog::from_yaml(yaml).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("old-1").is_none());
        assert!(catalog.for_framework(RegulatoryFramework::Finra).is_empty());
    }

    #[test]
    fn bad_template_id_fails_parse() {
        let yaml = r#"
templates:
  - id: Not_A_Slug
    title: T
    description: ""
    category: licensing
    regulatory_framework: finra
    authority: X
    frequency: annual
"#;
        assert!(matches!(
            TemplateCatalog::from_yaml(yaml),
            Err(CatalogError::Parse(_))
        ));
    }
}
