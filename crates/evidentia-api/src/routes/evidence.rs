//! # Evidence Routes
//!
//! Files never pass through the API. A client asks for an upload URL, PUTs
//! the bytes to the blob gateway, then completes the upload here with its
//! title and requirement associations.
//!
//! ```text
//! POST /evidence/upload-url ──▶ uploading ──POST /evidence──▶ active ──DELETE──▶ deleted
//!                                                   ▲   │
//!                                                   └───┘ PUT (reassociate)
//! ```
//!
//! Every transition goes through the typestate in `evidentia_state::evidence`
//! and yields the counter adjustment applied to the affected requirements.
//! Transitions hold the tenant lock from the first read to the audit entry,
//! so the adjustment is always computed from the record it replaces. The
//! record is persisted before memory changes; counter adjustments are
//! best-effort and a failure there is logged while the request succeeds.

use std::convert::Infallible;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use evidentia_core::{parse_optional, parse_rfc3339, AuditAction, Capability, EvidenceSource, ResourceType};
use evidentia_state::{Active, CounterAdjustment, Evidence, EvidenceStatus, Uploading};

use crate::audit::{self, Actor, AuditEvent, RequestContext};
use crate::auth::{require_capability, CallerIdentity};
use crate::blob::{
    evidence_locator, BlobMethod, DOWNLOAD_URL_TTL_MINUTES, UPLOAD_URL_TTL_MINUTES,
};
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::routes::{ensure_tenant_requirements, DownloadUrlResponse, MessageResponse};
use crate::state::{AppState, EvidenceRecord};

/// 25 MiB.
pub const MAX_FILE_SIZE: i64 = 25 * 1024 * 1024;

/// MIME types accepted for upload.
pub const ALLOWED_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "image/png",
    "image/jpeg",
];

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadUrlRequest {
    pub file_name: String,
    pub file_type: String,
    /// Bytes.
    pub file_size: i64,
}

impl Validate for UploadUrlRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("file_name", &self.file_name, 255)?;
        if self.file_size <= 0 {
            return Err("file_size must be positive".into());
        }
        if self.file_size > MAX_FILE_SIZE {
            return Err("file size exceeds maximum of 25MB".into());
        }
        if !ALLOWED_FILE_TYPES.contains(&self.file_type.as_str()) {
            return Err("file type not allowed".into());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub evidence_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteUploadRequest {
    pub evidence_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339.
    pub evidence_date: Option<String>,
    #[serde(default)]
    pub requirement_ids: Vec<Uuid>,
    pub external_link: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
}

impl Validate for CompleteUploadRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title, 500)?;
        if let Some(link) = &self.external_link {
            url::Url::parse(link).map_err(|_| "external_link must be a valid URL".to_string())?;
        }
        Ok(())
    }
}

/// Absent fields are left unchanged. `requirement_ids` replaces the whole
/// association set when present.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEvidenceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirement_ids: Option<Vec<Uuid>>,
}

impl Validate for UpdateEvidenceRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            require_text("title", title, 500)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EvidenceFilter {
    /// Evidence source, e.g. `manual_upload`.
    pub source: Option<String>,
    /// Only evidence attached to this requirement.
    pub requirement_id: Option<Uuid>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/evidence", get(list_evidence).post(complete_upload))
        .route("/api/v1/evidence/upload-url", post(request_upload_url))
        .route(
            "/api/v1/evidence/:id",
            get(get_evidence).put(update_evidence).delete(delete_evidence),
        )
        .route("/api/v1/evidence/:id/download-url", get(download_url))
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Tenant evidence that has not been deleted.
fn live_evidence(state: &AppState, tenant_id: Uuid, id: &Uuid) -> Result<EvidenceRecord, AppError> {
    state
        .evidence
        .get_in(tenant_id, id)
        .filter(|e| e.status != EvidenceStatus::Deleted)
        .ok_or_else(|| AppError::not_found("evidence"))
}

/// Move each affected requirement's counter by one, clamped at zero, in
/// memory and in Postgres. Never fails the caller.
async fn apply_counter_adjustment(
    state: &AppState,
    tenant_id: Uuid,
    evidence_id: Uuid,
    adjustment: &CounterAdjustment,
) {
    for (requirement_id, delta) in adjustment.deltas() {
        let applied = state
            .requirements
            .try_update_in(tenant_id, &requirement_id, |r| {
                r.evidence_count = (r.evidence_count + delta).max(0);
                Ok::<_, Infallible>(())
            });
        if applied.is_none() {
            tracing::warn!(
                tenant_id = %tenant_id,
                evidence_id = %evidence_id,
                requirement_id = %requirement_id,
                delta,
                "evidence counter not adjusted: requirement missing"
            );
            continue;
        }

        let direction = if delta > 0 { "increment" } else { "decrement" };
        metrics::counter!("evidence_counter_adjustments_total", "direction" => direction)
            .increment(1);

        if let Some(pool) = &state.db_pool {
            if let Err(e) =
                crate::db::requirements::adjust_evidence_count(pool, tenant_id, requirement_id, delta)
                    .await
            {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    evidence_id = %evidence_id,
                    requirement_id = %requirement_id,
                    delta,
                    error = %e,
                    "failed to persist evidence counter adjustment"
                );
            }
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/evidence
#[utoipa::path(
    get,
    path = "/api/v1/evidence",
    params(EvidenceFilter),
    responses(
        (status = 200, description = "Active evidence", body = Vec<EvidenceRecord>),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorBody),
    ),
    tag = "evidence"
)]
pub(crate) async fn list_evidence(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<EvidenceFilter>, QueryRejection>,
) -> Result<Json<Vec<EvidenceRecord>>, AppError> {
    require_capability(&caller, Capability::ViewEvidence)?;
    let filter = extract_query(query)?;
    let source = parse_optional(filter.source.as_deref(), EvidenceSource::parse)?;

    let mut items: Vec<EvidenceRecord> = state
        .evidence
        .list_in(caller.tenant_id)
        .into_iter()
        .filter(|e| e.status == EvidenceStatus::Active)
        .filter(|e| source.map_or(true, |s| e.source == s))
        .filter(|e| {
            filter
                .requirement_id
                .map_or(true, |rid| e.requirement_ids.contains(&rid))
        })
        .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(items))
}

/// POST /api/v1/evidence/upload-url
#[utoipa::path(
    post,
    path = "/api/v1/evidence/upload-url",
    request_body = UploadUrlRequest,
    responses(
        (status = 200, description = "Pre-signed upload URL", body = UploadUrlResponse),
        (status = 400, description = "File too large or type not allowed", body = crate::error::ErrorBody),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
    ),
    tag = "evidence"
)]
pub(crate) async fn request_upload_url(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<UploadUrlRequest>, JsonRejection>,
) -> Result<Json<UploadUrlResponse>, AppError> {
    require_capability(&caller, Capability::ManageEvidence)?;
    let req = extract_validated_json(body)?;

    let now = Utc::now();
    let evidence_id = Uuid::new_v4();
    let locator = evidence_locator(caller.tenant_id, evidence_id, &req.file_name);
    let presigned = state
        .blob
        .presign(
            BlobMethod::Put,
            &locator,
            Duration::minutes(UPLOAD_URL_TTL_MINUTES),
            now,
        )
        .map_err(|e| AppError::Internal(format!("presign upload: {e}")))?;

    let record = EvidenceRecord {
        id: evidence_id,
        tenant_id: caller.tenant_id,
        title: req.file_name.clone(),
        description: None,
        source: EvidenceSource::ManualUpload,
        evidence_date: None,
        blob_locator: Some(locator),
        file_name: req.file_name,
        file_size: req.file_size,
        file_type: req.file_type,
        external_link: None,
        metadata: None,
        requirement_ids: Vec::new(),
        uploaded_by: caller.user_id,
        status: EvidenceStatus::Uploading,
        created_at: now,
        updated_at: now,
    };
    persist!(state, crate::db::evidence::insert, &record);
    state.evidence.insert(record.id, record.clone());

    tracing::debug!(
        tenant_id = %caller.tenant_id,
        evidence_id = %evidence_id,
        file_size = record.file_size,
        "upload URL issued"
    );

    Ok(Json(UploadUrlResponse {
        upload_url: presigned.url,
        evidence_id,
        expires_at: presigned.expires_at,
    }))
}

/// POST /api/v1/evidence
#[utoipa::path(
    post,
    path = "/api/v1/evidence",
    request_body = CompleteUploadRequest,
    responses(
        (status = 201, description = "Evidence created", body = EvidenceRecord),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 404, description = "Evidence or requirement not found", body = crate::error::ErrorBody),
        (status = 409, description = "Upload already completed", body = crate::error::ErrorBody),
    ),
    tag = "evidence"
)]
pub(crate) async fn complete_upload(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<CompleteUploadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EvidenceRecord>), AppError> {
    require_capability(&caller, Capability::ManageEvidence)?;
    let req = extract_validated_json(body)?;
    let evidence_date = req
        .evidence_date
        .as_deref()
        .map(parse_rfc3339)
        .transpose()
        .map_err(|_| AppError::Validation("invalid evidence date format".into()))?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    ensure_tenant_requirements(&state, caller.tenant_id, &req.requirement_ids)?;
    let current = live_evidence(&state, caller.tenant_id, &req.evidence_id)?;
    let (active, adjustment) =
        Evidence::<Uploading>::resume(current.id, current.status)?.complete(req.requirement_ids);

    let record = EvidenceRecord {
        title: req.title.trim().to_string(),
        description: req.description,
        source: EvidenceSource::ManualUpload,
        evidence_date,
        external_link: req.external_link,
        metadata: req.metadata,
        requirement_ids: active.requirement_ids().iter().copied().collect(),
        status: active.status(),
        updated_at: Utc::now(),
        ..current
    };
    persist!(state, crate::db::evidence::update, &record);
    state.evidence.insert(record.id, record.clone());

    apply_counter_adjustment(&state, caller.tenant_id, record.id, &adjustment).await;

    tracing::info!(
        tenant_id = %caller.tenant_id,
        evidence_id = %record.id,
        requirements = record.requirement_ids.len(),
        "evidence created"
    );

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::EvidenceCreated,
            ResourceType::Evidence,
            record.id,
            format!("Uploaded evidence: {}", record.title),
        )
        .with_metadata(serde_json::json!({
            "file_name": record.file_name,
            "file_size": record.file_size,
            "requirement_ids": record.requirement_ids,
        })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/evidence/:id
#[utoipa::path(
    get,
    path = "/api/v1/evidence/{id}",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    responses(
        (status = 200, description = "Evidence", body = EvidenceRecord),
        (status = 404, description = "Evidence not found", body = crate::error::ErrorBody),
    ),
    tag = "evidence"
)]
pub(crate) async fn get_evidence(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<EvidenceRecord>, AppError> {
    require_capability(&caller, Capability::ViewEvidence)?;
    let record = live_evidence(&state, caller.tenant_id, &id)?;
    if record.status != EvidenceStatus::Active {
        return Err(AppError::not_found("evidence"));
    }

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::EvidenceViewed,
            ResourceType::Evidence,
            id,
            format!("Viewed evidence: {}", record.title),
        ),
    )
    .await;

    Ok(Json(record))
}

/// PUT /api/v1/evidence/:id
#[utoipa::path(
    put,
    path = "/api/v1/evidence/{id}",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    request_body = UpdateEvidenceRequest,
    responses(
        (status = 200, description = "Evidence updated", body = EvidenceRecord),
        (status = 404, description = "Evidence or requirement not found", body = crate::error::ErrorBody),
        (status = 409, description = "Evidence not active", body = crate::error::ErrorBody),
    ),
    tag = "evidence"
)]
pub(crate) async fn update_evidence(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateEvidenceRequest>, JsonRejection>,
) -> Result<Json<EvidenceRecord>, AppError> {
    require_capability(&caller, Capability::ManageEvidence)?;
    let req = extract_validated_json(body)?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    if let Some(ids) = &req.requirement_ids {
        ensure_tenant_requirements(&state, caller.tenant_id, ids)?;
    }
    let before = live_evidence(&state, caller.tenant_id, &id)?;
    let active = Evidence::<Active>::resume(before.id, before.status, before.requirement_ids.iter().copied())?;
    let (active, adjustment) = match req.requirement_ids.clone() {
        Some(ids) => active.reassociate(ids),
        None => (active, CounterAdjustment::default()),
    };

    let mut record = before.clone();
    if let Some(title) = &req.title {
        record.title = title.trim().to_string();
    }
    if req.description.is_some() {
        record.description = req.description.clone();
    }
    record.requirement_ids = active.requirement_ids().iter().copied().collect();
    record.updated_at = Utc::now();
    persist!(state, crate::db::evidence::update, &record);
    state.evidence.insert(record.id, record.clone());

    apply_counter_adjustment(&state, caller.tenant_id, id, &adjustment).await;

    let mut changes = Map::new();
    if req.requirement_ids.is_some() {
        changes.insert(
            "requirement_ids".into(),
            serde_json::json!({ "from": before.requirement_ids, "to": record.requirement_ids }),
        );
    }
    if before.title != record.title {
        changes.insert(
            "title".into(),
            serde_json::json!({ "from": before.title, "to": record.title }),
        );
    }
    if before.description != record.description {
        changes.insert(
            "description".into(),
            serde_json::json!({ "from": before.description, "to": record.description }),
        );
    }

    let mut event = AuditEvent::new(
        AuditAction::EvidenceUpdated,
        ResourceType::Evidence,
        id,
        format!("Updated evidence: {}", record.title),
    );
    if !changes.is_empty() {
        event = event.with_changes(Value::Object(changes));
    }
    audit::record(&state, &Actor::from(&caller), &ctx, event).await;

    Ok(Json(record))
}

/// DELETE /api/v1/evidence/:id
#[utoipa::path(
    delete,
    path = "/api/v1/evidence/{id}",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    responses(
        (status = 200, description = "Evidence deleted", body = MessageResponse),
        (status = 404, description = "Evidence not found", body = crate::error::ErrorBody),
        (status = 409, description = "Evidence not active", body = crate::error::ErrorBody),
    ),
    tag = "evidence"
)]
pub(crate) async fn delete_evidence(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    require_capability(&caller, Capability::ManageEvidence)?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let before = live_evidence(&state, caller.tenant_id, &id)?;
    let (deleted, adjustment) =
        Evidence::<Active>::resume(before.id, before.status, before.requirement_ids.iter().copied())?
            .delete();

    let record = EvidenceRecord {
        status: deleted.status(),
        updated_at: Utc::now(),
        ..before
    };
    persist!(state, crate::db::evidence::update, &record);
    state.evidence.insert(record.id, record.clone());

    apply_counter_adjustment(&state, caller.tenant_id, id, &adjustment).await;

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::EvidenceDeleted,
            ResourceType::Evidence,
            id,
            format!("Deleted evidence: {}", record.title),
        )
        .with_metadata(serde_json::json!({ "requirement_ids": record.requirement_ids })),
    )
    .await;

    Ok(Json(MessageResponse::new("evidence deleted successfully")))
}

/// GET /api/v1/evidence/:id/download-url
#[utoipa::path(
    get,
    path = "/api/v1/evidence/{id}/download-url",
    params(("id" = Uuid, Path, description = "Evidence ID")),
    responses(
        (status = 200, description = "Pre-signed download URL", body = DownloadUrlResponse),
        (status = 404, description = "Evidence not found", body = crate::error::ErrorBody),
        (status = 409, description = "Upload not completed", body = crate::error::ErrorBody),
    ),
    tag = "evidence"
)]
pub(crate) async fn download_url(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    require_capability(&caller, Capability::ViewEvidence)?;
    let record = live_evidence(&state, caller.tenant_id, &id)?;
    Evidence::<Active>::resume(record.id, record.status, record.requirement_ids.iter().copied())?;
    let locator = record
        .blob_locator
        .as_deref()
        .ok_or_else(|| AppError::not_found("evidence file"))?;

    let presigned = state
        .blob
        .presign(
            BlobMethod::Get,
            locator,
            Duration::minutes(DOWNLOAD_URL_TTL_MINUTES),
            Utc::now(),
        )
        .map_err(|e| AppError::Internal(format!("presign download: {e}")))?;

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::EvidenceDownloaded,
            ResourceType::Evidence,
            id,
            format!("Downloaded evidence: {}", record.title),
        ),
    )
    .await;

    Ok(Json(DownloadUrlResponse {
        download_url: presigned.url,
        expires_at: presigned.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(file_type: &str, file_size: i64) -> UploadUrlRequest {
        UploadUrlRequest {
            file_name: "adv-part-2a.pdf".into(),
            file_type: file_type.into(),
            file_size,
        }
    }

    #[test]
    fn upload_size_limit_is_inclusive() {
        assert!(upload("application/pdf", MAX_FILE_SIZE).validate().is_ok());
        assert_eq!(
            upload("application/pdf", MAX_FILE_SIZE + 1).validate().unwrap_err(),
            "file size exceeds maximum of 25MB"
        );
    }

    #[test]
    fn upload_type_allow_list() {
        assert!(upload("image/png", 1024).validate().is_ok());
        assert_eq!(
            upload("application/x-msdownload", 1024).validate().unwrap_err(),
            "file type not allowed"
        );
    }

    #[test]
    fn external_link_must_parse() {
        let req = CompleteUploadRequest {
            evidence_id: Uuid::new_v4(),
            title: "Q3 attestation".into(),
            description: None,
            evidence_date: None,
            requirement_ids: vec![],
            external_link: Some("not a url".into()),
            metadata: None,
        };
        assert!(req.validate().is_err());
    }
}
