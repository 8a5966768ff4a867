//! # Validated Identifiers
//!
//! String identifiers that must satisfy a format. Both validate at
//! construction time and again when deserialized, so an invalid value can
//! never be held in one of these types.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Route `Deserialize` through the type's `new()` constructor so that
/// invalid values are rejected at deserialization time.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Identifier of a requirement template, e.g. `sec-ria-001`.
///
/// Lowercase ASCII letters, digits, and `-`; 1–64 characters; must not
/// start or end with `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    /// Validate and wrap a template identifier.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let valid_chars = s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if s.is_empty() || s.len() > 64 || !valid_chars || s.starts_with('-') || s.ends_with('-')
        {
            return Err(ValidationError::InvalidTemplateId(s));
        }
        Ok(Self(s))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(TemplateId);

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An e-mail address, normalized to lowercase with surrounding whitespace
/// removed.
///
/// Only the shape is checked (one `@`, non-empty local part, a dot in the
/// domain). Deliverability is the identity provider's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and normalize an address.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = s.into();
        let normalized = raw.trim().to_ascii_lowercase();
        let mut parts = normalized.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();
        let well_formed = !local.is_empty()
            && !domain.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !normalized.chars().any(char::is_whitespace);
        if !well_formed {
            return Err(ValidationError::InvalidEmail(raw));
        }
        Ok(Self(normalized))
    }

    /// Borrow the normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl_validating_deserialize!(EmailAddress);

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_id_accepts_catalog_slugs() {
        assert_eq!(TemplateId::new("sec-ria-001").unwrap().as_str(), "sec-ria-001");
        assert!(TemplateId::new("hipaa-12").is_ok());
    }

    #[test]
    fn template_id_rejects_bad_shapes() {
        for bad in ["", "SEC-RIA-001", "sec_ria", "-lead", "trail-", "sp ace"] {
            assert!(TemplateId::new(bad).is_err(), "accepted {bad:?}");
        }
        assert!(TemplateId::new("a".repeat(65)).is_err());
    }

    #[test]
    fn template_id_deserialize_validates() {
        let ok: TemplateId = serde_json::from_str("\"finra-003\"").unwrap();
        assert_eq!(ok.to_string(), "finra-003");
        assert!(serde_json::from_str::<TemplateId>("\"Nope\"").is_err());
    }

    #[test]
    fn email_is_normalized() {
        let email = EmailAddress::new("  Jane.Doe@Acme-RIA.com ").unwrap();
        assert_eq!(email.as_str(), "jane.doe@acme-ria.com");
    }

    #[test]
    fn email_rejects_malformed() {
        for bad in ["", "jane", "@acme.com", "jane@", "jane@acme", "a@b@c.com", "ja ne@acme.com"] {
            assert!(EmailAddress::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn email_deserialize_validates() {
        assert!(serde_json::from_str::<EmailAddress>("\"x@y.io\"").is_ok());
        assert!(serde_json::from_str::<EmailAddress>("\"xy.io\"").is_err());
    }
}
