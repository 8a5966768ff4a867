//! # Requirement Routes
//!
//! Browse the template catalog, activate templates as tenant requirements,
//! and maintain their schedule. Template-derived fields (title, authority,
//! category, frequency, ...) are copied at activation and never edited.
//!
//! Status is derived on every read; see [`RequirementView`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use evidentia_core::{parse_rfc3339, AuditAction, Capability, ResourceType};
use evidentia_state::RequirementTemplate;

use crate::audit::{self, Actor, AuditEvent, RequestContext};
use crate::auth::{require_capability, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::routes::{tenant_organization, MessageResponse};
use crate::state::{AppState, RequirementRecord, RequirementView};

const MAX_NOTES_LEN: usize = 5000;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivateRequirementRequest {
    pub template_id: String,
    pub notes: Option<String>,
    /// RFC 3339.
    pub next_due_date: Option<String>,
}

impl Validate for ActivateRequirementRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("template_id", &self.template_id, 100)?;
        check_notes(self.notes.as_deref())
    }
}

/// Absent fields are left unchanged. An empty date string clears the date.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateRequirementRequest {
    pub notes: Option<String>,
    pub next_due_date: Option<String>,
    pub last_completed_date: Option<String>,
}

impl Validate for UpdateRequirementRequest {
    fn validate(&self) -> Result<(), String> {
        check_notes(self.notes.as_deref())
    }
}

fn check_notes(notes: Option<&str>) -> Result<(), String> {
    match notes {
        Some(n) if n.chars().count() > MAX_NOTES_LEN => {
            Err(format!("notes must not exceed {MAX_NOTES_LEN} characters"))
        }
        _ => Ok(()),
    }
}

/// A catalog entry as offered to tenants.
#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub regulatory_framework: String,
    pub authority: String,
    pub evidence_types: Vec<String>,
    pub frequency: String,
}

impl From<&RequirementTemplate> for TemplateResponse {
    fn from(t: &RequirementTemplate) -> Self {
        Self {
            id: t.id.as_str().to_string(),
            title: t.title.clone(),
            description: t.description.clone(),
            category: t.category.as_str().to_string(),
            regulatory_framework: t.regulatory_framework.as_str().to_string(),
            authority: t.authority.clone(),
            evidence_types: t.evidence_types.clone(),
            frequency: t.frequency.as_str().to_string(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/requirements",
            get(list_requirements).post(activate_requirement),
        )
        .route("/api/v1/requirements/templates", get(list_templates))
        .route(
            "/api/v1/requirements/:id",
            get(get_requirement)
                .put(update_requirement)
                .delete(deactivate_requirement),
        )
}

/// `Some("")` clears, `Some(ts)` sets, `None` leaves unchanged.
fn date_update(value: Option<&str>) -> Result<Option<Option<DateTime<Utc>>>, AppError> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(ts) => Ok(Some(Some(parse_rfc3339(ts)?))),
    }
}

fn active_requirement(
    state: &AppState,
    tenant_id: Uuid,
    id: &Uuid,
) -> Result<RequirementRecord, AppError> {
    state
        .requirements
        .get_in(tenant_id, id)
        .filter(|r| r.is_active)
        .ok_or_else(|| AppError::not_found("requirement"))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/requirements
#[utoipa::path(
    get,
    path = "/api/v1/requirements",
    responses((status = 200, description = "Active requirements", body = Vec<RequirementView>)),
    tag = "requirements"
)]
pub(crate) async fn list_requirements(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<RequirementView>>, AppError> {
    require_capability(&caller, Capability::ViewRequirements)?;
    let now = Utc::now();
    let mut records: Vec<RequirementRecord> = state
        .requirements
        .list_in(caller.tenant_id)
        .into_iter()
        .filter(|r| r.is_active)
        .collect();
    records.sort_by(|a, b| a.template_id.cmp(&b.template_id).then(a.activated_at.cmp(&b.activated_at)));
    Ok(Json(
        records
            .into_iter()
            .map(|r| RequirementView::at(r, now))
            .collect(),
    ))
}

/// GET /api/v1/requirements/templates
#[utoipa::path(
    get,
    path = "/api/v1/requirements/templates",
    responses((status = 200, description = "Templates for the tenant's framework", body = Vec<TemplateResponse>)),
    tag = "requirements"
)]
pub(crate) async fn list_templates(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    require_capability(&caller, Capability::ViewRequirements)?;
    let org = tenant_organization(&state, caller.tenant_id)?;
    Ok(Json(
        state
            .catalog
            .for_framework(org.regulatory_framework)
            .into_iter()
            .map(TemplateResponse::from)
            .collect(),
    ))
}

/// POST /api/v1/requirements
#[utoipa::path(
    post,
    path = "/api/v1/requirements",
    request_body = ActivateRequirementRequest,
    responses(
        (status = 201, description = "Requirement activated", body = RequirementView),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
        (status = 404, description = "Template not found", body = crate::error::ErrorBody),
    ),
    tag = "requirements"
)]
pub(crate) async fn activate_requirement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<ActivateRequirementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RequirementView>), AppError> {
    require_capability(&caller, Capability::ManageRequirements)?;
    let req = extract_validated_json(body)?;
    let template = state
        .catalog
        .get(req.template_id.trim())
        .ok_or_else(|| AppError::not_found("requirement template"))?;
    let next_due_date = date_update(req.next_due_date.as_deref())?.flatten();

    let now = Utc::now();
    let record = RequirementRecord {
        id: Uuid::new_v4(),
        tenant_id: caller.tenant_id,
        template_id: template.id.as_str().to_string(),
        title: template.title.clone(),
        description: template.description.clone(),
        category: template.category,
        authority: template.authority.clone(),
        evidence_types: template.evidence_types.clone(),
        frequency: template.frequency,
        next_due_date,
        last_completed_date: None,
        evidence_count: 0,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
        is_active: true,
        activated_at: now,
        activated_by: caller.user_id,
        updated_at: now,
        updated_by: caller.user_id,
    };
    persist!(state, crate::db::requirements::insert, &record);
    state.requirements.insert(record.id, record.clone());

    tracing::info!(
        tenant_id = %caller.tenant_id,
        requirement_id = %record.id,
        template_id = %record.template_id,
        "requirement activated"
    );

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::RequirementActivated,
            ResourceType::Requirement,
            record.id,
            format!("Activated requirement: {}", record.title),
        )
        .with_metadata(serde_json::json!({ "template_id": record.template_id })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(RequirementView::at(record, now))))
}

/// GET /api/v1/requirements/:id
#[utoipa::path(
    get,
    path = "/api/v1/requirements/{id}",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement", body = RequirementView),
        (status = 404, description = "Requirement not found", body = crate::error::ErrorBody),
    ),
    tag = "requirements"
)]
pub(crate) async fn get_requirement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<RequirementView>, AppError> {
    require_capability(&caller, Capability::ViewRequirements)?;
    let record = state
        .requirements
        .get_in(caller.tenant_id, &id)
        .ok_or_else(|| AppError::not_found("requirement"))?;
    Ok(Json(RequirementView::at(record, Utc::now())))
}

/// PUT /api/v1/requirements/:id
#[utoipa::path(
    put,
    path = "/api/v1/requirements/{id}",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    request_body = UpdateRequirementRequest,
    responses(
        (status = 200, description = "Requirement updated", body = RequirementView),
        (status = 400, description = "Invalid date", body = crate::error::ErrorBody),
        (status = 404, description = "Requirement not found", body = crate::error::ErrorBody),
    ),
    tag = "requirements"
)]
pub(crate) async fn update_requirement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateRequirementRequest>, JsonRejection>,
) -> Result<Json<RequirementView>, AppError> {
    require_capability(&caller, Capability::ManageRequirements)?;
    let req = extract_validated_json(body)?;
    let next_due = date_update(req.next_due_date.as_deref())?;
    let last_completed = date_update(req.last_completed_date.as_deref())?;
    let notes = req
        .notes
        .map(|n| Some(n.trim().to_string()).filter(|n| !n.is_empty()));

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let before = active_requirement(&state, caller.tenant_id, &id)?;
    let now = Utc::now();
    let mut updated = before.clone();
    if let Some(notes) = notes {
        updated.notes = notes;
    }
    if let Some(due) = next_due {
        updated.next_due_date = due;
    }
    if let Some(done) = last_completed {
        updated.last_completed_date = done;
    }
    updated.updated_at = now;
    updated.updated_by = caller.user_id;
    persist!(state, crate::db::requirements::update_mutable, &updated);
    state.requirements.insert(updated.id, updated.clone());

    let changes = requirement_changes(&before, &updated);
    let mut event = AuditEvent::new(
        AuditAction::RequirementUpdated,
        ResourceType::Requirement,
        id,
        format!("Updated requirement: {}", updated.title),
    );
    if !changes.is_empty() {
        event = event.with_changes(Value::Object(changes));
    }
    audit::record(&state, &Actor::from(&caller), &ctx, event).await;

    Ok(Json(RequirementView::at(updated, now)))
}

fn requirement_changes(before: &RequirementRecord, after: &RequirementRecord) -> Map<String, Value> {
    let mut changes = Map::new();
    if before.notes != after.notes {
        changes.insert(
            "notes".into(),
            serde_json::json!({ "from": before.notes, "to": after.notes }),
        );
    }
    if before.next_due_date != after.next_due_date {
        changes.insert(
            "next_due_date".into(),
            serde_json::json!({ "from": before.next_due_date, "to": after.next_due_date }),
        );
    }
    if before.last_completed_date != after.last_completed_date {
        changes.insert(
            "last_completed_date".into(),
            serde_json::json!({ "from": before.last_completed_date, "to": after.last_completed_date }),
        );
    }
    changes
}

/// DELETE /api/v1/requirements/:id
///
/// Deactivation leaves attached evidence and the evidence counter alone.
#[utoipa::path(
    delete,
    path = "/api/v1/requirements/{id}",
    params(("id" = Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement deactivated", body = MessageResponse),
        (status = 404, description = "Requirement not found", body = crate::error::ErrorBody),
    ),
    tag = "requirements"
)]
pub(crate) async fn deactivate_requirement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    require_capability(&caller, Capability::ManageRequirements)?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let updated = RequirementRecord {
        is_active: false,
        updated_at: Utc::now(),
        updated_by: caller.user_id,
        ..active_requirement(&state, caller.tenant_id, &id)?
    };
    persist!(state, crate::db::requirements::update_mutable, &updated);
    state.requirements.insert(updated.id, updated.clone());

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::RequirementDeactivated,
            ResourceType::Requirement,
            id,
            format!("Deactivated requirement: {}", updated.title),
        ),
    )
    .await;

    Ok(Json(MessageResponse::new("requirement deactivated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_update_semantics() {
        assert_eq!(date_update(None).unwrap(), None);
        assert_eq!(date_update(Some("")).unwrap(), Some(None));
        assert!(date_update(Some("2026-12-31T00:00:00Z")).unwrap().unwrap().is_some());
        assert!(date_update(Some("next tuesday")).is_err());
    }

    #[test]
    fn notes_length_is_bounded() {
        assert!(check_notes(None).is_ok());
        assert!(check_notes(Some(&"x".repeat(MAX_NOTES_LEN))).is_ok());
        assert!(check_notes(Some(&"x".repeat(MAX_NOTES_LEN + 1))).is_err());
    }
}
