//! # Tenant Members
//!
//! Listing, invitations, role changes, and soft deletion. Only active users
//! occupy seats; pending invitations are not counted until accepted.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use evidentia_core::{AuditAction, Capability, EmailAddress, ResourceType, Role};

use crate::audit::{self, diff, Actor, AuditEvent, RequestContext};
use crate::auth::{require_capability, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::{tenant_organization, MessageResponse};
use crate::state::{AppState, InvitationRecord, InvitationStatus, UserRecord, UserStatus};

/// Invitations lapse after this many days.
pub const INVITATION_TTL_DAYS: i64 = 7;
const INVITATION_TOKEN_BYTES: usize = 32;

// ── Request DTOs ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteUserRequest {
    pub email: String,
    /// admin | compliance_officer | viewer
    pub role: String,
    pub message: Option<String>,
}

impl Validate for InviteUserRequest {
    fn validate(&self) -> Result<(), String> {
        if self.message.as_ref().is_some_and(|m| m.chars().count() > 2000) {
            return Err("message must not exceed 2000 characters".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: String,
}

impl Validate for UpdateRoleRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", get(list_users))
        .route("/api/v1/users/invite", post(invite_user))
        .route("/api/v1/users/:id/role", put(update_role))
        .route("/api/v1/users/:id", delete(delete_user))
}

fn new_invitation_token() -> String {
    let mut bytes = [0u8; INVITATION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn active_member(state: &AppState, tenant_id: Uuid, id: &Uuid) -> Result<UserRecord, AppError> {
    state
        .users
        .get_in(tenant_id, id)
        .filter(|u| u.status != UserStatus::Inactive)
        .ok_or_else(|| AppError::not_found("user"))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses((status = 200, description = "Tenant members", body = Vec<UserRecord>)),
    tag = "users"
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<UserRecord>>, AppError> {
    require_capability(&caller, Capability::ViewDashboard)?;
    let mut users: Vec<UserRecord> = state
        .users
        .list_in(caller.tenant_id)
        .into_iter()
        .filter(|u| u.status != UserStatus::Inactive)
        .collect();
    users.sort_by_key(|u| u.created_at);
    Ok(Json(users))
}

/// POST /api/v1/users/invite
#[utoipa::path(
    post,
    path = "/api/v1/users/invite",
    request_body = InviteUserRequest,
    responses(
        (status = 201, description = "Invitation created", body = InvitationRecord),
        (status = 400, description = "Validation error or seat limit reached", body = crate::error::ErrorBody),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered or invited", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn invite_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<InviteUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InvitationRecord>), AppError> {
    require_capability(&caller, Capability::ManageUsers)?;
    let req = extract_validated_json(body)?;
    let email = EmailAddress::new(req.email.as_str())?.into_inner();
    let role = Role::parse(&req.role)?;

    let _accounts = state.account_lock.lock().await;
    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let org = tenant_organization(&state, caller.tenant_id)?;
    org.subscription
        .ensure_seat_available(state.active_user_count(org.id))?;

    if state.user_by_email(&email).is_some() {
        return Err(AppError::Conflict("email already registered".into()));
    }
    let now = Utc::now();
    let pending = state.invitations.filter(|inv| {
        inv.email == email && inv.status == InvitationStatus::Pending && inv.expires_at > now
    });
    if !pending.is_empty() {
        return Err(AppError::Conflict("invitation already pending for this email".into()));
    }

    let invitation = InvitationRecord {
        id: Uuid::new_v4(),
        tenant_id: caller.tenant_id,
        email,
        role,
        invited_by: caller.user_id,
        message: req.message.filter(|m| !m.trim().is_empty()),
        token: new_invitation_token(),
        status: InvitationStatus::Pending,
        created_at: now,
        expires_at: now + Duration::days(INVITATION_TTL_DAYS),
    };
    persist!(state, crate::db::invitations::insert, &invitation);
    state.invitations.insert(invitation.id, invitation.clone());

    tracing::info!(
        tenant_id = %caller.tenant_id,
        invitation_id = %invitation.id,
        role = %invitation.role,
        "invitation issued, delivery stubbed"
    );

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::UserCreated,
            ResourceType::Invitation,
            invitation.id,
            format!("Invited {} as {}", invitation.email, invitation.role),
        )
        .with_metadata(serde_json::json!({ "invitation_id": invitation.id })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(invitation)))
}

/// PUT /api/v1/users/:id/role
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserRecord),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
        (status = 404, description = "User not found", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn update_role(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<Json<UserRecord>, AppError> {
    require_capability(&caller, Capability::ManageUsers)?;
    let req = extract_validated_json(body)?;
    let role = Role::parse(&req.role)?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let before = active_member(&state, caller.tenant_id, &id)?;
    let updated = UserRecord {
        role,
        updated_at: Utc::now(),
        ..before.clone()
    };
    persist!(state, crate::db::users::update, &updated);
    state.users.insert(updated.id, updated.clone());

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::UserUpdated,
            ResourceType::User,
            id,
            format!("Role of {} changed from {} to {}", updated.email, before.role, role),
        )
        .with_changes(diff("role", before.role.as_str(), role.as_str())),
    )
    .await;

    Ok(Json(updated))
}

/// DELETE /api/v1/users/:id
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deactivated", body = MessageResponse),
        (status = 400, description = "Cannot delete own account", body = crate::error::ErrorBody),
        (status = 404, description = "User not found", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub(crate) async fn delete_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    require_capability(&caller, Capability::ManageUsers)?;
    if id == caller.user_id {
        return Err(AppError::Validation("cannot delete your own account".into()));
    }

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let user = active_member(&state, caller.tenant_id, &id)?;
    let updated = UserRecord {
        status: UserStatus::Inactive,
        updated_at: Utc::now(),
        ..user.clone()
    };
    persist!(state, crate::db::users::update, &updated);
    state.users.insert(updated.id, updated);

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::UserDeleted,
            ResourceType::User,
            id,
            format!("User {} deactivated", user.email),
        ),
    )
    .await;

    Ok(Json(MessageResponse::new("user deleted successfully")))
}
