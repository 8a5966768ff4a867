//! # Worker Routes
//!
//! Called by the report renderer, not by users. Authenticated with the
//! shared worker token in `X-Worker-Token`; user JWTs are not accepted.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use evidentia_core::{AuditAction, ResourceType};
use evidentia_state::ReportStatus;

use crate::audit::{self, diff, Actor, AuditEvent, RequestContext};
use crate::auth::require_worker_token;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppState, ReportRecord};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportStatusUpdate {
    /// generating | completed | failed
    pub status: String,
    /// Blob locator of the rendered document. Required for `completed`.
    pub output_locator: Option<String>,
    pub error_message: Option<String>,
}

impl Validate for ReportStatusUpdate {
    fn validate(&self) -> Result<(), String> {
        if self.status.trim() == "completed"
            && self.output_locator.as_deref().map_or(true, |l| l.trim().is_empty())
        {
            return Err("output_locator is required for completed reports".into());
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/v1/workers/reports/:id/status",
        post(update_report_status),
    )
}

/// POST /api/v1/workers/reports/:id/status
#[utoipa::path(
    post,
    path = "/api/v1/workers/reports/{id}/status",
    params(("id" = Uuid, Path, description = "Report ID")),
    request_body = ReportStatusUpdate,
    responses(
        (status = 200, description = "Status advanced", body = ReportRecord),
        (status = 400, description = "Invalid status", body = crate::error::ErrorBody),
        (status = 401, description = "Bad worker token", body = crate::error::ErrorBody),
        (status = 404, description = "Report not found", body = crate::error::ErrorBody),
        (status = 409, description = "Illegal transition", body = crate::error::ErrorBody),
    ),
    tag = "workers"
)]
pub(crate) async fn update_report_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<Json<ReportStatusUpdate>, JsonRejection>,
) -> Result<Json<ReportRecord>, AppError> {
    require_worker_token(&headers, state.config.worker_token.as_deref())?;
    let req = extract_validated_json(body)?;
    let target = ReportStatus::from_name(req.status.trim())
        .ok_or_else(|| AppError::Validation("invalid report status".into()))?;

    let tenant_id = state
        .reports
        .get(&id)
        .map(|r| r.tenant_id)
        .ok_or_else(|| AppError::not_found("report"))?;
    let _tenant = state.tenant_locks.acquire(&tenant_id).await;
    let mut report = state
        .reports
        .get_in(tenant_id, &id)
        .ok_or_else(|| AppError::not_found("report"))?;

    let from = report.status;
    report.status = from.advance(target)?;
    let now = Utc::now();
    match target {
        ReportStatus::Completed => {
            report.output_locator = req.output_locator;
            report.completed_at = Some(now);
        }
        ReportStatus::Failed => {
            report.error_message = req.error_message;
            report.completed_at = Some(now);
        }
        ReportStatus::Pending | ReportStatus::Generating => {}
    }
    persist!(state, crate::db::reports::update_status, &report);
    state.reports.insert(report.id, report.clone());

    tracing::info!(
        tenant_id = %report.tenant_id,
        report_id = %report.id,
        from = %from,
        to = %target,
        "report status advanced"
    );

    audit::record(
        &state,
        &Actor::system(report.tenant_id),
        &ctx,
        AuditEvent::new(
            AuditAction::ReportGenerated,
            ResourceType::Report,
            report.id,
            format!("Report '{}' is now {}", report.title, report.status),
        )
        .with_changes(diff("status", from.as_str(), target.as_str())),
    )
    .await;

    Ok(Json(report))
}
