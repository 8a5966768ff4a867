#![deny(missing_docs)]

//! # evidentia-state: Lifecycle Rules for Evidentia
//!
//! Pure state machines and rule functions. Nothing in this crate performs
//! I/O or holds a lock; the API layer applies the results to its stores.
//!
//! - [`evidence`]: typestate evidence lifecycle (`uploading → active →
//!   deleted`). Every transition returns the [`CounterAdjustment`] the
//!   caller must apply to requirement evidence counters.
//! - [`requirement`]: compliance status derivation.
//! - [`report`]: forward-only report lifecycle.
//! - [`subscription`]: tier changes, cancellation, and seat checks.
//! - [`audit_chain`]: SHA-256 hash chain over a tenant's audit entries.
//! - [`catalog`]: the requirement template catalog loaded from YAML.

pub mod audit_chain;
pub mod catalog;
pub mod evidence;
pub mod report;
pub mod requirement;
pub mod subscription;

pub use audit_chain::{ChainIntegrity, ChainLink, GENESIS_HASH};
pub use catalog::{CatalogError, RequirementTemplate, TemplateCatalog};
pub use evidence::{
    Active, CounterAdjustment, Deleted, Evidence, EvidenceError, EvidenceState, EvidenceStatus,
    Uploading,
};
pub use report::{ReportError, ReportStatus, ReportType};
pub use requirement::{derive_status, days_until_due, RequirementStatus};
pub use subscription::{SeatLimitError, Subscription, SubscriptionStatus};
