#![deny(missing_docs)]

//! # evidentia-core: Foundational Types for Evidentia
//!
//! Every other crate in the workspace depends on this one. It has no
//! internal crate dependencies, only `serde`, `thiserror`, and `chrono`.
//!
//! ## Design Principles
//!
//! 1. **Closed vocabularies.** Industries, frameworks, requirement
//!    categories, evidence sources, and audit actions are enums with a fixed
//!    wire form. Handlers never compare free-form strings.
//!
//! 2. **One access table.** [`Role`] and [`Capability`] are closed enums and
//!    [`can_perform`] is the single pure function every write path consults.
//!
//! 3. **Validated newtypes.** [`TemplateId`] and [`EmailAddress`] reject bad
//!    input at construction and at deserialization time.
//!
//! 4. **[`EvidentiaError`] hierarchy.** Structured errors with `thiserror`.

pub mod access;
pub mod domain;
pub mod error;
pub mod identity;
pub mod password;
pub mod temporal;

pub use access::{can_perform, Capability, Role};
pub use domain::{
    parse_optional, AuditAction, EmployeeBand, EvidenceSource, Frequency, Industry, RegulatoryFramework,
    RequirementCategory, ResourceType, SubscriptionTier,
};
pub use error::{EvidentiaError, ValidationError};
pub use identity::{EmailAddress, TemplateId};
pub use password::check_password_strength;
pub use temporal::parse_rfc3339;
