//! # API Route Modules
//!
//! - `auth`: public registration, password reset, invitation acceptance.
//! - `profile`: the caller's own user record, login/logout tracking.
//! - `organization`: tenant profile and compliance dashboard.
//! - `users`: tenant members and invitations.
//! - `requirements`: template catalog and activated requirements.
//! - `evidence`: pre-signed uploads, evidence lifecycle, downloads.
//! - `audit`: audit log query, CSV export, chain verification.
//! - `reports`: report requests and downloads.
//! - `subscription`: tier changes and cancellation.
//! - `workers`: report status updates from the rendering worker.
//! - `health`: liveness and Prometheus scrape endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, OrganizationRecord};

/// Write through to Postgres when a pool is configured. A failure aborts
/// the handler with a 500.
macro_rules! persist {
    ($state:expr, $save_fn:path, $($args:expr),+) => {
        if let Some(ref pool) = $state.db_pool {
            if let Err(e) = $save_fn(pool, $($args),+).await {
                tracing::error!(error = %e, op = stringify!($save_fn), "failed to persist to database");
                return Err($crate::error::AppError::Internal(format!("database persist failed: {e}")));
            }
        }
    };
}

pub mod audit;
pub mod auth;
pub mod evidence;
pub mod health;
pub mod organization;
pub mod profile;
pub mod reports;
pub mod requirements;
pub mod subscription;
pub mod users;
pub mod workers;

/// `{"message": "..."}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A pre-signed download URL.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadUrlResponse {
    pub download_url: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// The caller's organization. Absent only if the token names a tenant that
/// was never registered.
pub(crate) fn tenant_organization(state: &AppState, tenant_id: Uuid) -> Result<OrganizationRecord, AppError> {
    state
        .organizations
        .get(&tenant_id)
        .ok_or_else(|| AppError::not_found("organization"))
}

/// Check that every id names a requirement of the tenant.
pub(crate) fn ensure_tenant_requirements(
    state: &AppState,
    tenant_id: Uuid,
    ids: &[Uuid],
) -> Result<(), AppError> {
    for id in ids {
        if state.requirements.get_in(tenant_id, id).is_none() {
            tracing::debug!(tenant_id = %tenant_id, requirement_id = %id, "requirement not in tenant");
            return Err(AppError::not_found("requirement"));
        }
    }
    Ok(())
}
