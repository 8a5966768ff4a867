//! # Report Routes
//!
//! A report request only records intent. Rendering happens in an external
//! worker that advances the status through `/api/v1/workers/...`. Every
//! role holds `GenerateReports`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use evidentia_core::{AuditAction, Capability, ResourceType};
use evidentia_state::{ReportError, ReportStatus, ReportType};

use crate::audit::{self, Actor, AuditEvent, RequestContext};
use crate::auth::{require_capability, CallerIdentity};
use crate::blob::{BlobMethod, DOWNLOAD_URL_TTL_MINUTES};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::routes::{ensure_tenant_requirements, DownloadUrlResponse};
use crate::state::{AppState, ReportRecord};

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateReportRequest {
    /// requirement_detail | comprehensive
    pub report_type: String,
    pub title: String,
    pub description: Option<String>,
    /// Required for requirement_detail, ignored for comprehensive.
    #[serde(default)]
    pub requirement_ids: Vec<Uuid>,
}

impl Validate for GenerateReportRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title, 500)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/reports", get(list_reports).post(generate_report))
        .route("/api/v1/reports/:id", get(get_report))
        .route("/api/v1/reports/:id/download-url", get(report_download_url))
}

/// GET /api/v1/reports
#[utoipa::path(
    get,
    path = "/api/v1/reports",
    responses((status = 200, description = "Tenant reports, newest first", body = Vec<ReportRecord>)),
    tag = "reports"
)]
pub(crate) async fn list_reports(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ReportRecord>>, AppError> {
    require_capability(&caller, Capability::GenerateReports)?;
    let mut reports = state.reports.list_in(caller.tenant_id);
    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(reports))
}

/// POST /api/v1/reports
#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = GenerateReportRequest,
    responses(
        (status = 202, description = "Report queued", body = ReportRecord),
        (status = 400, description = "Invalid report type", body = crate::error::ErrorBody),
        (status = 404, description = "Requirement not found", body = crate::error::ErrorBody),
    ),
    tag = "reports"
)]
pub(crate) async fn generate_report(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<GenerateReportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReportRecord>), AppError> {
    require_capability(&caller, Capability::GenerateReports)?;
    let req = extract_validated_json(body)?;
    let report_type = ReportType::parse(&req.report_type)?;

    let requirement_ids = match report_type {
        ReportType::Comprehensive => Vec::new(),
        ReportType::RequirementDetail => {
            if req.requirement_ids.is_empty() {
                return Err(AppError::Validation(
                    "requirement_ids is required for requirement_detail reports".into(),
                ));
            }
            ensure_tenant_requirements(&state, caller.tenant_id, &req.requirement_ids)?;
            let mut ids = req.requirement_ids;
            ids.sort();
            ids.dedup();
            ids
        }
    };

    let report = ReportRecord {
        id: Uuid::new_v4(),
        tenant_id: caller.tenant_id,
        title: req.title.trim().to_string(),
        description: req.description,
        report_type,
        requirement_ids,
        status: ReportStatus::Pending,
        output_locator: None,
        generated_by: caller.user_id,
        created_at: Utc::now(),
        completed_at: None,
        error_message: None,
    };
    persist!(state, crate::db::reports::insert, &report);
    state.reports.insert(report.id, report.clone());

    tracing::info!(
        tenant_id = %caller.tenant_id,
        report_id = %report.id,
        report_type = %report.report_type,
        "report requested"
    );

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::ReportGenerated,
            ResourceType::Report,
            report.id,
            format!("Requested {} report: {}", report.report_type, report.title),
        ),
    )
    .await;

    Ok((StatusCode::ACCEPTED, Json(report)))
}

/// GET /api/v1/reports/:id
#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = ReportRecord),
        (status = 404, description = "Report not found", body = crate::error::ErrorBody),
    ),
    tag = "reports"
)]
pub(crate) async fn get_report(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportRecord>, AppError> {
    require_capability(&caller, Capability::GenerateReports)?;
    state
        .reports
        .get_in(caller.tenant_id, &id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("report"))
}

/// GET /api/v1/reports/:id/download-url
#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}/download-url",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Pre-signed download URL", body = DownloadUrlResponse),
        (status = 400, description = "Report not ready", body = crate::error::ErrorBody),
        (status = 404, description = "Report not found", body = crate::error::ErrorBody),
    ),
    tag = "reports"
)]
pub(crate) async fn report_download_url(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    require_capability(&caller, Capability::GenerateReports)?;
    let report = state
        .reports
        .get_in(caller.tenant_id, &id)
        .ok_or_else(|| AppError::not_found("report"))?;
    let locator = match (report.status, report.output_locator.as_deref()) {
        (ReportStatus::Completed, Some(locator)) => locator,
        _ => return Err(ReportError::NotReady.into()),
    };

    let presigned = state
        .blob
        .presign(
            BlobMethod::Get,
            locator,
            Duration::minutes(DOWNLOAD_URL_TTL_MINUTES),
            Utc::now(),
        )
        .map_err(|e| AppError::Internal(format!("presign report download: {e}")))?;

    Ok(Json(DownloadUrlResponse {
        download_url: presigned.url,
        expires_at: presigned.expires_at,
    }))
}
