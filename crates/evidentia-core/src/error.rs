//! # Error Hierarchy
//!
//! Structured error types shared across Evidentia, built with `thiserror`.
//! Each variant carries the offending input so that callers can surface a
//! precise message without re-deriving context.

use thiserror::Error;

use crate::access::{Capability, Role};

/// Top-level error type for domain operations.
#[derive(Error, Debug)]
pub enum EvidentiaError {
    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The caller's role does not grant the capability.
    #[error("role '{role}' may not perform '{capability}'")]
    AccessDenied {
        /// Role held by the caller.
        role: Role,
        /// Capability the operation requires.
        capability: Capability,
    },
}

/// Validation errors for domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Template identifiers are lowercase slugs such as `sec-ria-001`.
    #[error("invalid template id: \"{0}\" (expected lowercase letters, digits and '-')")]
    InvalidTemplateId(String),

    /// E-mail address is not of the form `local@domain`.
    #[error("invalid email address: \"{0}\"")]
    InvalidEmail(String),

    /// A closed vocabulary received a value outside its set.
    #[error("unknown {kind}: \"{value}\"")]
    UnknownValue {
        /// Which vocabulary rejected the value.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Password does not meet the strength policy.
    #[error("password must be at least 8 characters with 1 uppercase, 1 number, and 1 special character")]
    WeakPassword,

    /// Timestamp string is not RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
