//! # Audit Log Routes
//!
//! Read-only views of the tenant's audit trail: filtered listing, CSV
//! export, and hash chain verification. There are no write routes; entries
//! are produced only by [`crate::audit::record`].

use std::collections::HashMap;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use evidentia_core::{parse_optional, parse_rfc3339, AuditAction, Capability, ResourceType};
use evidentia_state::ChainIntegrity;

use crate::auth::{require_capability, CallerIdentity};
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::{AppState, AuditLogEntry};

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;
/// Exports refuse once the matching set reaches this size.
pub const MAX_EXPORT_ROWS: usize = 10_000;

const CSV_HEADER: [&str; 8] = [
    "Timestamp",
    "User Email",
    "User Name",
    "Action",
    "Resource Type",
    "Resource ID",
    "Description",
    "IP Address",
];

// ── Query & Response DTOs ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    pub user_id: Option<Uuid>,
    /// e.g. `evidence_created`.
    pub action: Option<String>,
    /// e.g. `evidence`.
    pub resource_type: Option<String>,
    /// RFC 3339, inclusive.
    pub from: Option<String>,
    /// RFC 3339, inclusive.
    pub to: Option<String>,
    /// Default 100, at most 1000. Ignored by the export.
    pub limit: Option<usize>,
}

/// Parsed form of [`AuditLogQuery`].
#[derive(Debug, Default)]
struct AuditFilter {
    user_id: Option<Uuid>,
    action: Option<AuditAction>,
    resource_type: Option<ResourceType>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    fn parse(q: &AuditLogQuery) -> Result<Self, AppError> {
        Ok(Self {
            user_id: q.user_id,
            action: parse_optional(q.action.as_deref(), AuditAction::parse)?,
            resource_type: parse_optional(q.resource_type.as_deref(), ResourceType::parse)?,
            from: q.from.as_deref().map(parse_rfc3339).transpose()?,
            to: q.to.as_deref().map(parse_rfc3339).transpose()?,
        })
    }

    fn matches(&self, e: &AuditLogEntry) -> bool {
        self.user_id.map_or(true, |u| e.user_id == Some(u))
            && self.action.map_or(true, |a| e.action == a)
            && self.resource_type.map_or(true, |r| e.resource_type == r)
            && self.from.map_or(true, |from| e.timestamp >= from)
            && self.to.map_or(true, |to| e.timestamp <= to)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChainIntegrityResponse {
    pub total_entries: usize,
    pub broken_links: usize,
    pub tampered_entries: usize,
    pub chain_valid: bool,
}

impl From<ChainIntegrity> for ChainIntegrityResponse {
    fn from(c: ChainIntegrity) -> Self {
        Self {
            total_entries: c.total_entries,
            broken_links: c.broken_links,
            tampered_entries: c.tampered_entries,
            chain_valid: c.chain_valid,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/audit-logs", get(list_audit_logs))
        .route("/api/v1/audit-logs/export", get(export_audit_logs))
        .route("/api/v1/audit-logs/verify", get(verify_chain))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/audit-logs
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Entries, newest first", body = Vec<AuditLogEntry>),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorBody),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn list_audit_logs(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    require_capability(&caller, Capability::ViewAuditLog)?;
    let q = extract_query(query)?;
    let filter = AuditFilter::parse(&q)?;
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.audit.query(
        caller.tenant_id,
        |e| filter.matches(e),
        limit,
    )))
}

/// GET /api/v1/audit-logs/export
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/export",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 400, description = "Too many results", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn export_audit_logs(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    require_capability(&caller, Capability::ViewAuditLog)?;
    let q = extract_query(query)?;
    let filter = AuditFilter::parse(&q)?;

    let entries = state
        .audit
        .query(caller.tenant_id, |e| filter.matches(e), MAX_EXPORT_ROWS);
    if entries.len() >= MAX_EXPORT_ROWS {
        return Err(AppError::Capacity(
            "too many results. Please narrow your date range (max 10,000 entries)".into(),
        ));
    }

    let names: HashMap<Uuid, String> = state
        .users
        .list_in(caller.tenant_id)
        .into_iter()
        .map(|u| (u.id, u.full_name))
        .collect();
    let body = render_csv(&entries, &names)?;

    tracing::info!(
        tenant_id = %caller.tenant_id,
        rows = entries.len(),
        "audit log exported"
    );

    let disposition = format!(
        "attachment; filename=audit_log_{}.csv",
        Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

fn render_csv(entries: &[AuditLogEntry], names: &HashMap<Uuid, String>) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| AppError::Internal(format!("csv export: {e}"));
    writer.write_record(CSV_HEADER).map_err(csv_err)?;
    for e in entries {
        let user_name = match e.user_id {
            Some(id) => names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
            None => "system".to_string(),
        };
        writer
            .write_record([
                e.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                e.user_email.clone().unwrap_or_default(),
                user_name,
                e.action.as_str().to_string(),
                e.resource_type.as_str().to_string(),
                e.resource_id.map(|id| id.to_string()).unwrap_or_default(),
                e.description.clone(),
                e.ip_address.clone().unwrap_or_default(),
            ])
            .map_err(csv_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv export: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("csv export: {e}")))
}

/// GET /api/v1/audit-logs/verify
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/verify",
    responses(
        (status = 200, description = "Chain verification result", body = ChainIntegrityResponse),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn verify_chain(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ChainIntegrityResponse>, AppError> {
    require_capability(&caller, Capability::ViewAuditLog)?;
    let integrity = state.audit.verify(caller.tenant_id);
    if !integrity.chain_valid {
        tracing::error!(
            tenant_id = %caller.tenant_id,
            broken_links = integrity.broken_links,
            tampered_entries = integrity.tampered_entries,
            "audit chain verification failed"
        );
    }
    Ok(Json(integrity.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: Option<Uuid>) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            sequence: 1,
            timestamp: Utc::now(),
            user_id,
            user_email: user_id.map(|_| "cco@acme-ria.com".to_string()),
            action: AuditAction::EvidenceCreated,
            resource_type: ResourceType::Evidence,
            resource_id: Some(Uuid::new_v4()),
            description: "Uploaded evidence: ADV, Part 2A".into(),
            changes: None,
            ip_address: Some("203.0.113.7".into()),
            user_agent: None,
            metadata: None,
            previous_hash: String::new(),
            entry_hash: String::new(),
        }
    }

    #[test]
    fn csv_has_header_and_quotes_commas() {
        let user = Uuid::new_v4();
        let names = HashMap::from([(user, "Casey Compliance".to_string())]);
        let csv = render_csv(&[entry(Some(user)), entry(None)], &names).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Timestamp,User Email,User Name,Action,Resource Type,Resource ID,Description,IP Address")
        );
        let first = lines.next().unwrap();
        assert!(first.contains("Casey Compliance"));
        assert!(first.contains("\"Uploaded evidence: ADV, Part 2A\""));
        assert!(lines.next().unwrap().contains(",system,"));
    }

    #[test]
    fn filter_window_is_inclusive() {
        let e = entry(None);
        let filter = AuditFilter {
            from: Some(e.timestamp),
            to: Some(e.timestamp),
            ..AuditFilter::default()
        };
        assert!(filter.matches(&e));
        let other_user = AuditFilter {
            user_id: Some(Uuid::new_v4()),
            ..AuditFilter::default()
        };
        assert!(!other_user.matches(&e));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let q = AuditLogQuery {
            action: Some("evidence_shredded".into()),
            ..AuditLogQuery::default()
        };
        assert!(matches!(AuditFilter::parse(&q), Err(AppError::Validation(_))));
    }
}
