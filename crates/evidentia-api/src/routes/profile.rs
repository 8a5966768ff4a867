//! # Caller Profile
//!
//! The authenticated user's own record. Available to every role.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use evidentia_core::{AuditAction, ResourceType};

use crate::audit::{self, diff, Actor, AuditEvent, RequestContext};
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::routes::MessageResponse;
use crate::state::{AppState, UserRecord, UserStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: String,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("full_name", &self.full_name, 200)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/profile", get(get_profile).put(update_profile))
        .route("/api/v1/profile/login", post(record_login))
        .route("/api/v1/profile/logout", post(record_logout))
}

fn own_record(state: &AppState, caller: &CallerIdentity) -> Result<UserRecord, AppError> {
    state
        .users
        .get_in(caller.tenant_id, &caller.user_id)
        .filter(|u| u.status != UserStatus::Inactive)
        .ok_or_else(|| AppError::not_found("user"))
}

/// GET /api/v1/profile
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses(
        (status = 200, description = "Caller's user record", body = UserRecord),
        (status = 404, description = "User not found", body = crate::error::ErrorBody),
    ),
    tag = "profile"
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<UserRecord>, AppError> {
    own_record(&state, &caller).map(Json)
}

/// PUT /api/v1/profile
#[utoipa::path(
    put,
    path = "/api/v1/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserRecord),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "profile"
)]
pub(crate) async fn update_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserRecord>, AppError> {
    let req = extract_validated_json(body)?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let before = own_record(&state, &caller)?;
    let updated = UserRecord {
        full_name: req.full_name.trim().to_string(),
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
            updated.id,
            "Profile updated",
        )
        .with_changes(diff("full_name", &before.full_name, &updated.full_name)),
    )
    .await;

    Ok(Json(updated))
}

/// POST /api/v1/profile/login
#[utoipa::path(
    post,
    path = "/api/v1/profile/login",
    responses((status = 200, description = "Login recorded", body = MessageResponse)),
    tag = "profile"
)]
pub(crate) async fn record_login(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
) -> Result<Json<MessageResponse>, AppError> {
    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let user = own_record(&state, &caller)?;
    if user.status != UserStatus::Active {
        return Err(AppError::Forbidden("account is inactive".into()));
    }
    let updated = UserRecord {
        last_login_at: Some(Utc::now()),
        ..user.clone()
    };
    persist!(state, crate::db::users::update, &updated);
    state.users.insert(updated.id, updated);

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(AuditAction::Login, ResourceType::User, user.id, "User logged in"),
    )
    .await;

    Ok(Json(MessageResponse::new("login recorded")))
}

/// POST /api/v1/profile/logout
#[utoipa::path(
    post,
    path = "/api/v1/profile/logout",
    responses((status = 200, description = "Logout recorded", body = MessageResponse)),
    tag = "profile"
)]
pub(crate) async fn record_logout(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
) -> Result<Json<MessageResponse>, AppError> {
    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(AuditAction::Logout, ResourceType::User, caller.user_id, "User logged out"),
    )
    .await;

    Ok(Json(MessageResponse::new("logout recorded")))
}
