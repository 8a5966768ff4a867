//! # Subscription Routes
//!
//! Billing itself is external. These routes keep the tenant's tier, seat
//! limit, and cancellation flag, and enforce that a downgrade never leaves
//! more active users than seats.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use evidentia_core::{AuditAction, Capability, ResourceType, SubscriptionTier};
use evidentia_state::Subscription;

use crate::audit::{self, diff, Actor, AuditEvent, RequestContext};
use crate::auth::{require_capability, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::routes::{tenant_organization, MessageResponse};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub tier: String,
    pub status: String,
    pub max_users: u32,
    pub active_users: u32,
    pub monthly_price: f64,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}

impl SubscriptionResponse {
    fn new(sub: &Subscription, active_users: u32) -> Self {
        Self {
            tier: sub.tier.as_str().to_string(),
            status: sub.status.as_str().to_string(),
            max_users: sub.max_users,
            active_users,
            monthly_price: sub.monthly_price,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeTierRequest {
    /// starter | professional | business
    pub tier: String,
}

impl Validate for ChangeTierRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("tier", &self.tier, 50)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelSubscriptionRequest {
    pub confirm_organization_name: String,
}

impl Validate for CancelSubscriptionRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("confirm_organization_name", &self.confirm_organization_name, 200)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/subscription",
            get(get_subscription).put(change_tier),
        )
        .route("/api/v1/subscription/cancel", post(cancel_subscription))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/subscription
#[utoipa::path(
    get,
    path = "/api/v1/subscription",
    responses((status = 200, description = "Current subscription", body = SubscriptionResponse)),
    tag = "subscription"
)]
pub(crate) async fn get_subscription(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<SubscriptionResponse>, AppError> {
    require_capability(&caller, Capability::ViewDashboard)?;
    let org = tenant_organization(&state, caller.tenant_id)?;
    Ok(Json(SubscriptionResponse::new(
        &org.subscription,
        state.active_user_count(org.id),
    )))
}

/// PUT /api/v1/subscription
#[utoipa::path(
    put,
    path = "/api/v1/subscription",
    request_body = ChangeTierRequest,
    responses(
        (status = 200, description = "Tier changed", body = SubscriptionResponse),
        (status = 400, description = "Unknown tier or too many active users", body = crate::error::ErrorBody),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorBody),
    ),
    tag = "subscription"
)]
pub(crate) async fn change_tier(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<ChangeTierRequest>, JsonRejection>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    require_capability(&caller, Capability::ManageBilling)?;
    let req = extract_validated_json(body)?;
    let tier = SubscriptionTier::parse(req.tier.trim())?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let active_users = state.active_user_count(caller.tenant_id);
    let mut org = tenant_organization(&state, caller.tenant_id)?;
    let previous = org.subscription.change_tier(tier, active_users)?;
    let now = Utc::now();
    org.updated_at = now;
    org.updated_by = Some(caller.user_id);
    persist!(
        state,
        crate::db::organizations::update_subscription,
        org.id,
        &org.subscription,
        now,
        caller.user_id
    );
    state.organizations.insert(org.id, org.clone());

    tracing::info!(
        tenant_id = %org.id,
        from = %previous,
        to = %tier,
        "subscription tier changed"
    );

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::SubscriptionUpdated,
            ResourceType::Subscription,
            org.id,
            format!("Subscription updated from {previous} to {tier}"),
        )
        .with_changes(diff("tier", previous.as_str(), tier.as_str())),
    )
    .await;

    Ok(Json(SubscriptionResponse::new(&org.subscription, active_users)))
}

/// POST /api/v1/subscription/cancel
#[utoipa::path(
    post,
    path = "/api/v1/subscription/cancel",
    request_body = CancelSubscriptionRequest,
    responses(
        (status = 200, description = "Cancellation scheduled", body = MessageResponse),
        (status = 400, description = "Name confirmation mismatch", body = crate::error::ErrorBody),
    ),
    tag = "subscription"
)]
pub(crate) async fn cancel_subscription(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<CancelSubscriptionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    require_capability(&caller, Capability::ManageBilling)?;
    let req = extract_validated_json(body)?;

    let _tenant = state.tenant_locks.acquire(&caller.tenant_id).await;
    let mut org = tenant_organization(&state, caller.tenant_id)?;
    if req.confirm_organization_name.trim() != org.name {
        return Err(AppError::Validation(
            "organization name confirmation does not match".into(),
        ));
    }

    let now = Utc::now();
    org.subscription.schedule_cancellation();
    org.updated_at = now;
    org.updated_by = Some(caller.user_id);
    persist!(
        state,
        crate::db::organizations::update_subscription,
        org.id,
        &org.subscription,
        now,
        caller.user_id
    );
    state.organizations.insert(org.id, org.clone());

    audit::record(
        &state,
        &Actor::from(&caller),
        &ctx,
        AuditEvent::new(
            AuditAction::SubscriptionUpdated,
            ResourceType::Subscription,
            org.id,
            "Subscription canceled at period end",
        )
        .with_changes(diff("cancel_at_period_end", false, true)),
    )
    .await;

    Ok(Json(MessageResponse::new(
        "Subscription will be canceled at the end of the current billing period",
    )))
}
