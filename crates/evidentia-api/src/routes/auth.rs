//! # Public Account Routes
//!
//! Routes (no token required):
//! - POST /api/v1/auth/register: create a tenant and its first admin.
//! - POST /api/v1/auth/password-reset: request reset instructions.
//! - POST /api/v1/auth/accept-invitation: join a tenant with an invitation token.
//!
//! Credentials live with the identity provider. Registration checks the
//! password policy and provisions the local records; reset and invitation
//! e-mails are logged, not sent.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use evidentia_core::{
    check_password_strength, AuditAction, EmailAddress, EmployeeBand, Industry,
    RegulatoryFramework, ResourceType,
};
use evidentia_state::Subscription;

use crate::audit::{self, Actor, AuditEvent, RequestContext};
use crate::auth::constant_time_token_eq;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::routes::MessageResponse;
use crate::state::{AppState, InvitationStatus, OrganizationRecord, UserRecord, UserStatus};

const PASSWORD_RESET_MESSAGE: &str =
    "If an account exists with this email, you will receive password reset instructions.";

// ── Request/Response DTOs ───────────────────────────────────────────

/// Tenant registration.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub organization_name: String,
    /// financial_services | insurance | healthcare | other
    pub industry: String,
    /// "1-10" | "11-25" | "26-50" | "51+"
    pub employee_count: String,
    /// sec_ria | finra | state_insurance | hipaa
    pub regulatory_framework: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("full_name", &self.full_name, 200)?;
        require_text("organization_name", &self.organization_name, 200)?;
        require_text("password", &self.password, 128)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

impl Validate for PasswordResetRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("email", &self.email, 320)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptInvitationRequest {
    pub token: String,
    pub full_name: String,
}

impl Validate for AcceptInvitationRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("token", &self.token, 128)?;
        require_text("full_name", &self.full_name, 200)
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the public account router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/password-reset", post(request_password_reset))
        .route("/api/v1/auth/accept-invitation", post(accept_invitation))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /api/v1/auth/register
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Tenant and admin created", body = RegisterResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub(crate) async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let email = EmailAddress::new(req.email.as_str())?;
    check_password_strength(&req.password)?;
    let industry = Industry::parse(&req.industry)?;
    let employee_count = EmployeeBand::parse(&req.employee_count)?;
    let regulatory_framework = RegulatoryFramework::parse(&req.regulatory_framework)?;

    let _accounts = state.account_lock.lock().await;
    if state.user_by_email(email.as_str()).is_some() {
        return Err(AppError::Conflict("email already registered".into()));
    }

    let now = Utc::now();
    let org = OrganizationRecord {
        id: Uuid::new_v4(),
        name: req.organization_name.trim().to_string(),
        industry,
        employee_count,
        regulatory_framework,
        website: None,
        address: None,
        phone: None,
        subscription: Subscription::starter_trial(now),
        created_at: now,
        updated_at: now,
        updated_by: None,
    };
    let user = UserRecord {
        id: Uuid::new_v4(),
        tenant_id: org.id,
        email: email.into_inner(),
        full_name: req.full_name.trim().to_string(),
        role: evidentia_core::Role::Admin,
        status: UserStatus::Active,
        email_verified: false,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };

    persist!(state, crate::db::organizations::insert, &org);
    persist!(state, crate::db::users::insert, &user);
    state.organizations.insert(org.id, org.clone());
    state.users.insert(user.id, user.clone());

    tracing::info!(
        tenant_id = %org.id,
        user_id = %user.id,
        framework = %org.regulatory_framework,
        "organization registered"
    );

    audit::record(
        &state,
        &Actor::user(org.id, user.id, &user.email),
        &ctx,
        AuditEvent::new(
            AuditAction::OrganizationCreated,
            ResourceType::Organization,
            org.id,
            format!("Organization '{}' created by {}", org.name, user.full_name),
        ),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please check your email to verify your account."
                .into(),
            user_id: user.id,
            organization_id: org.id,
        }),
    ))
}

/// POST /api/v1/auth/password-reset
///
/// Always answers the same way so the response does not reveal whether
/// the address is registered.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Malformed email", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub(crate) async fn request_password_reset(
    State(state): State<AppState>,
    body: Result<Json<PasswordResetRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let email = EmailAddress::new(req.email)?;

    if let Some(user) = state.user_by_email(email.as_str()) {
        tracing::info!(user_id = %user.id, "password reset requested, delivery stubbed");
    }

    Ok(Json(MessageResponse::new(PASSWORD_RESET_MESSAGE)))
}

/// POST /api/v1/auth/accept-invitation
#[utoipa::path(
    post,
    path = "/api/v1/auth/accept-invitation",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 201, description = "User created", body = UserRecord),
        (status = 400, description = "Invitation expired or seat limit reached", body = crate::error::ErrorBody),
        (status = 404, description = "Invitation not found", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub(crate) async fn accept_invitation(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<AcceptInvitationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let now = Utc::now();

    let _accounts = state.account_lock.lock().await;
    let invitation = state
        .invitations
        .filter(|inv| constant_time_token_eq(&req.token, &inv.token))
        .into_iter()
        .next()
        .filter(|inv| inv.status == InvitationStatus::Pending)
        .ok_or_else(|| AppError::not_found("invitation"))?;

    if invitation.expires_at <= now {
        persist!(state, crate::db::invitations::update_status, invitation.id, InvitationStatus::Expired);
        state.invitations.update(&invitation.id, |inv| inv.status = InvitationStatus::Expired);
        return Err(AppError::Validation("invitation has expired".into()));
    }

    // Seat count and user insert happen under the tenant lock, which every
    // other change to the tenant's members also takes.
    let _tenant = state.tenant_locks.acquire(&invitation.tenant_id).await;
    let org = super::tenant_organization(&state, invitation.tenant_id)?;
    org.subscription
        .ensure_seat_available(state.active_user_count(org.id))?;
    if state.user_by_email(&invitation.email).is_some() {
        return Err(AppError::Conflict("email already registered".into()));
    }

    let user = UserRecord {
        id: Uuid::new_v4(),
        tenant_id: invitation.tenant_id,
        email: invitation.email.clone(),
        full_name: req.full_name.trim().to_string(),
        role: invitation.role,
        status: UserStatus::Active,
        email_verified: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };
    persist!(state, crate::db::invitations::update_status, invitation.id, InvitationStatus::Accepted);
    persist!(state, crate::db::users::insert, &user);
    state
        .invitations
        .update(&invitation.id, |inv| inv.status = InvitationStatus::Accepted);
    state.users.insert(user.id, user.clone());

    audit::record(
        &state,
        &Actor::user(user.tenant_id, user.id, &user.email),
        &ctx,
        AuditEvent::new(
            AuditAction::UserCreated,
            ResourceType::User,
            user.id,
            format!("User {} joined as {}", user.email, user.role),
        )
        .with_metadata(serde_json::json!({ "invitation_id": invitation.id })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(user)))
}
