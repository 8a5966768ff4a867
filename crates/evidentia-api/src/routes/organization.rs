//! # Organization Routes
//!
//! - GET /api/v1/organization: tenant profile.
//! - PUT /api/v1/organization: update the profile (admins only).
//! - GET /api/v1/organization/dashboard: compliance summary.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use evidentia_core::{
    AuditAction, Capability, EmployeeBand, Industry, RegulatoryFramework, ResourceType,
};
use evidentia_state::{EvidenceStatus, RequirementStatus};

use crate::audit::{self, Actor, AuditEvent, RequestContext};
use crate::auth::{require_admin, require_capability, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::tenant_organization;
use crate::state::{AppState, OrganizationRecord, RequirementView};

/// Requirements due within this many days are listed on the dashboard.
const UPCOMING_WINDOW_DAYS: i64 = 30;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<String>,
    pub regulatory_framework: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl Validate for UpdateOrganizationRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            crate::extractors::require_text("name", name, 200)?;
        }
        for (field, value) in [
            ("website", &self.website),
            ("address", &self.address),
            ("phone", &self.phone),
        ] {
            if value.as_ref().is_some_and(|v| v.chars().count() > 500) {
                return Err(format!("{field} must not exceed 500 characters"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub total_requirements: usize,
    pub compliant_requirements: usize,
    pub at_risk_requirements: usize,
    pub non_compliant_requirements: usize,
    pub total_evidence: usize,
    pub upcoming_deadlines: Vec<RequirementView>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/organization",
            get(get_organization).put(update_organization),
        )
        .route("/api/v1/organization/dashboard", get(dashboard))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/organization
#[utoipa::path(
    get,
    path = "/api/v1/organization",
    responses(
        (status = 200, description = "Tenant profile", body = OrganizationRecord),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
    ),
    tag = "organization"
)]
pub(crate) async fn get_organization(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<OrganizationRecord>, AppError> {
    require_capability(&caller, Capability::ViewDashboard)?;
    tenant_organization(&state, caller.tenant_id).map(Json)
}

/// PUT /api/v1/organization
#[utoipa::path(
    put,
    path = "/api/v1/organization",
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Profile updated", body = OrganizationRecord),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
    ),
    tag = "organization"
)]
pub(crate) async fn update_organization(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<UpdateOrganizationRequest>, JsonRejection>,
) -> Result<Json<OrganizationRecord>, AppError> {
    require_capability(&caller, Capability::ManageOrganization)?;
    require_admin(&caller)?;
    let req = extract_validated_json(body)?;

    let industry = req.industry.as_deref().map(Industry::parse).transpose()?;
    let employee_count = req
        .employee_count
        .as_deref()
        .map(EmployeeBand::parse)
        .transpose()?;
    let framework = req
        .regulatory_framework
        .as_deref()
        .map(RegulatoryFramework::parse)
        .transpose()?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let before = tenant_organization(&state, caller.tenant_id)?;
    let mut next = before.clone();
    if let Some(name) = &req.name {
        next.name = name.trim().to_string();
    }
    if let Some(industry) = industry {
        next.industry = industry;
    }
    if let Some(band) = employee_count {
        next.employee_count = band;
    }
    if let Some(framework) = framework {
        next.regulatory_framework = framework;
    }
    if req.website.is_some() {
        next.website = req.website.clone();
    }
    if req.address.is_some() {
        next.address = req.address.clone();
    }
    if req.phone.is_some() {
        next.phone = req.phone.clone();
    }

    let changes = profile_changes(&before, &next);
    if changes.is_empty() {
        return Ok(Json(before));
    }

    next.updated_at = Utc::now();
    next.updated_by = Some(caller.user_id);
    persist!(state, crate::db::organizations::update_profile, &next);
    state.organizations.insert(next.id, next.clone());

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::OrganizationUpdated,
            ResourceType::Organization,
            next.id,
            format!("Organization '{}' updated", next.name),
        )
        .with_changes(Value::Object(changes)),
    )
    .await;

    Ok(Json(next))
}

/// `{field: {from, to}}` for every profile field that differs.
fn profile_changes(before: &OrganizationRecord, after: &OrganizationRecord) -> Map<String, Value> {
    let pairs = [
        ("name", Value::from(before.name.as_str()), Value::from(after.name.as_str())),
        ("industry", before.industry.as_str().into(), after.industry.as_str().into()),
        (
            "employee_count",
            before.employee_count.as_str().into(),
            after.employee_count.as_str().into(),
        ),
        (
            "regulatory_framework",
            before.regulatory_framework.as_str().into(),
            after.regulatory_framework.as_str().into(),
        ),
        ("website", before.website.clone().into(), after.website.clone().into()),
        ("address", before.address.clone().into(), after.address.clone().into()),
        ("phone", before.phone.clone().into(), after.phone.clone().into()),
    ];
    pairs
        .into_iter()
        .filter(|(_, from, to)| from != to)
        .map(|(field, from, to)| (field.to_string(), serde_json::json!({ "from": from, "to": to })))
        .collect()
}

/// GET /api/v1/organization/dashboard
#[utoipa::path(
    get,
    path = "/api/v1/organization/dashboard",
    responses(
        (status = 200, description = "Compliance summary", body = DashboardResponse),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
    ),
    tag = "organization"
)]
pub(crate) async fn dashboard(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<DashboardResponse>, AppError> {
    require_capability(&caller, Capability::ViewDashboard)?;
    let now = Utc::now();
    let horizon = now + Duration::days(UPCOMING_WINDOW_DAYS);

    let views: Vec<RequirementView> = state
        .requirements
        .list_in(caller.tenant_id)
        .into_iter()
        .filter(|r| r.is_active)
        .map(|r| RequirementView::at(r, now))
        .collect();
    let count = |status: RequirementStatus| views.iter().filter(|v| v.status == status).count();

    let total_evidence = state
        .evidence
        .list_in(caller.tenant_id)
        .iter()
        .filter(|e| e.status == EvidenceStatus::Active)
        .count();

    let mut upcoming_deadlines: Vec<RequirementView> = views
        .iter()
        .filter(|v| {
            v.record
                .next_due_date
                .is_some_and(|due| due > now && due <= horizon)
        })
        .cloned()
        .collect();
    upcoming_deadlines.sort_by_key(|v| v.record.next_due_date);

    Ok(Json(DashboardResponse {
        total_requirements: views.len(),
        compliant_requirements: count(RequirementStatus::Compliant),
        at_risk_requirements: count(RequirementStatus::AtRisk),
        non_compliant_requirements: count(RequirementStatus::NonCompliant),
        total_evidence,
        upcoming_deadlines,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidentia_state::Subscription;
    use uuid::Uuid;

    fn org() -> OrganizationRecord {
        let now = Utc::now();
        OrganizationRecord {
            id: Uuid::new_v4(),
            name: "Acme RIA".into(),
            industry: Industry::FinancialServices,
            employee_count: EmployeeBand::OneToTen,
            regulatory_framework: RegulatoryFramework::SecRia,
            website: None,
            address: None,
            phone: None,
            subscription: Subscription::starter_trial(now),
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    #[test]
    fn unchanged_profile_has_no_changes() {
        let a = org();
        assert!(profile_changes(&a, &a.clone()).is_empty());
    }

    #[test]
    fn changed_fields_are_diffed() {
        let a = org();
        let mut b = a.clone();
        b.name = "Acme Advisors".into();
        b.website = Some("https://acme.example".into());
        let changes = profile_changes(&a, &b);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["name"]["from"], "Acme RIA");
        assert_eq!(changes["website"]["from"], Value::Null);
        assert_eq!(changes["website"]["to"], "https://acme.example");
    }
}
