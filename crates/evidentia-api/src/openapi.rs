//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented route into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer JWT security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "HS256 token from the identity provider carrying tenant_id and role.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Evidentia API",
        version = "0.1.0",
        description = "Multi-tenant compliance record keeping: requirement activation from a regulatory template catalog, evidence with pre-signed uploads, a hash-chained audit trail, reports, and subscriptions.\n\nAuthentication: `Authorization: Bearer <jwt>`. Registration, password reset, invitation acceptance, `/health`, `/metrics` and `/openapi.json` are public. Worker routes take `X-Worker-Token`."
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Public ───────────────────────────────────────────────────────
        crate::routes::auth::register,
        crate::routes::auth::request_password_reset,
        crate::routes::auth::accept_invitation,
        crate::routes::health::health,
        crate::routes::health::metrics,
        // ── Profile ──────────────────────────────────────────────────────
        crate::routes::profile::get_profile,
        crate::routes::profile::update_profile,
        crate::routes::profile::record_login,
        crate::routes::profile::record_logout,
        // ── Organization ─────────────────────────────────────────────────
        crate::routes::organization::get_organization,
        crate::routes::organization::update_organization,
        crate::routes::organization::dashboard,
        // ── Users ────────────────────────────────────────────────────────
        crate::routes::users::list_users,
        crate::routes::users::invite_user,
        crate::routes::users::update_role,
        crate::routes::users::delete_user,
        // ── Requirements ─────────────────────────────────────────────────
        crate::routes::requirements::list_requirements,
        crate::routes::requirements::list_templates,
        crate::routes::requirements::activate_requirement,
        crate::routes::requirements::get_requirement,
        crate::routes::requirements::update_requirement,
        crate::routes::requirements::deactivate_requirement,
        // ── Evidence ─────────────────────────────────────────────────────
        crate::routes::evidence::list_evidence,
        crate::routes::evidence::request_upload_url,
        crate::routes::evidence::complete_upload,
        crate::routes::evidence::get_evidence,
        crate::routes::evidence::update_evidence,
        crate::routes::evidence::delete_evidence,
        crate::routes::evidence::download_url,
        // ── Audit ────────────────────────────────────────────────────────
        crate::routes::audit::list_audit_logs,
        crate::routes::audit::export_audit_logs,
        crate::routes::audit::verify_chain,
        // ── Reports ──────────────────────────────────────────────────────
        crate::routes::reports::list_reports,
        crate::routes::reports::generate_report,
        crate::routes::reports::get_report,
        crate::routes::reports::report_download_url,
        crate::routes::workers::update_report_status,
        // ── Subscription ─────────────────────────────────────────────────
        crate::routes::subscription::get_subscription,
        crate::routes::subscription::change_tier,
        crate::routes::subscription::cancel_subscription,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::routes::MessageResponse,
            crate::routes::DownloadUrlResponse,
            crate::routes::auth::RegisterRequest,
            crate::routes::auth::RegisterResponse,
            crate::routes::auth::PasswordResetRequest,
            crate::routes::auth::AcceptInvitationRequest,
            crate::routes::health::HealthResponse,
            crate::routes::profile::UpdateProfileRequest,
            crate::routes::organization::UpdateOrganizationRequest,
            crate::routes::organization::DashboardResponse,
            crate::routes::users::InviteUserRequest,
            crate::routes::users::UpdateRoleRequest,
            crate::routes::requirements::ActivateRequirementRequest,
            crate::routes::requirements::UpdateRequirementRequest,
            crate::routes::requirements::TemplateResponse,
            crate::routes::evidence::UploadUrlRequest,
            crate::routes::evidence::UploadUrlResponse,
            crate::routes::evidence::CompleteUploadRequest,
            crate::routes::evidence::UpdateEvidenceRequest,
            crate::routes::audit::ChainIntegrityResponse,
            crate::routes::reports::GenerateReportRequest,
            crate::routes::workers::ReportStatusUpdate,
            crate::routes::subscription::SubscriptionResponse,
            crate::routes::subscription::ChangeTierRequest,
            crate::routes::subscription::CancelSubscriptionRequest,
            crate::state::OrganizationRecord,
            crate::state::UserStatus,
            crate::state::UserRecord,
            crate::state::InvitationStatus,
            crate::state::InvitationRecord,
            crate::state::RequirementRecord,
            crate::state::RequirementView,
            crate::state::EvidenceRecord,
            crate::state::ReportRecord,
            crate::state::AuditLogEntry,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, password reset, invitation acceptance"),
        (name = "profile", description = "The caller's own user record"),
        (name = "organization", description = "Tenant profile and compliance dashboard"),
        (name = "users", description = "Tenant members and invitations"),
        (name = "requirements", description = "Template catalog and activated requirements"),
        (name = "evidence", description = "Evidence lifecycle with pre-signed blob URLs"),
        (name = "audit", description = "Hash-chained audit trail"),
        (name = "reports", description = "Report requests and downloads"),
        (name = "workers", description = "Report worker callbacks"),
        (name = "subscription", description = "Tier changes and cancellation"),
        (name = "health", description = "Liveness and metrics"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_generates() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Evidentia API");
        assert!(doc.paths.paths.contains_key("/api/v1/evidence/upload-url"));
        assert!(doc.paths.paths.contains_key("/api/v1/audit-logs/verify"));
    }

    #[test]
    fn document_has_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("EvidenceRecord"));
    }
}
