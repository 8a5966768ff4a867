//! # Report Lifecycle
//!
//! ```text
//! PENDING ──▶ GENERATING ──▶ COMPLETED
//!    │             │
//!    └─────────────┴──────▶ FAILED
//! ```
//!
//! Forward-only. A report request records intent; an external worker
//! renders the document and advances the status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Selected requirements with their evidence.
    RequirementDetail,
    /// Every active requirement of the tenant.
    Comprehensive,
}

impl ReportType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequirementDetail => "requirement_detail",
            Self::Comprehensive => "comprehensive",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Result<Self, ReportError> {
        match value {
            "requirement_detail" => Ok(Self::RequirementDetail),
            "comprehensive" => Ok(Self::Comprehensive),
            _ => Err(ReportError::InvalidType(value.to_string())),
        }
    }
}

/// Runtime report status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Requested, not picked up.
    Pending,
    /// A worker is rendering it.
    Generating,
    /// Output available for download.
    Completed,
    /// Rendering failed.
    Failed,
}

impl ReportStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(Self::Pending),
            "generating" => Some(Self::Generating),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no further transitions exist.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [ReportStatus] {
        match self {
            Self::Pending => &[Self::Generating, Self::Failed],
            Self::Generating => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Validate a transition and return the target.
    pub fn advance(self, to: ReportStatus) -> Result<ReportStatus, ReportError> {
        if self.valid_transitions().contains(&to) {
            Ok(to)
        } else {
            Err(ReportError::InvalidTransition { from: self, to })
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// Unknown report type.
    #[error("invalid report type")]
    InvalidType(String),

    /// Transition not in the forward-only graph.
    #[error("cannot move report from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ReportStatus,
        /// Requested status.
        to: ReportStatus,
    },

    /// Download requested before completion.
    #[error("report is not ready for download")]
    NotReady,
}
