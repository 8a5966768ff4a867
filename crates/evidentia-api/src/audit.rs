//! # Audit Recording
//!
//! [`record`] is the only way anything is written to the audit trail. The
//! timestamp is assigned here, never taken from the caller. The in-memory
//! append always happens; the Postgres insert is best-effort and a failure
//! is logged without failing the operation that triggered it.

use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{SubsecRound, Utc};
use serde_json::Value;
use uuid::Uuid;

use evidentia_core::{AuditAction, ResourceType};

use crate::auth::CallerIdentity;
use crate::state::{AppState, AuditDraft, AuditLogEntry};

const MAX_USER_AGENT_LEN: usize = 512;

/// Client details captured for the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// First hop of `X-Forwarded-For`, else `X-Real-IP`.
    pub ip_address: Option<String>,
    /// `User-Agent`, truncated.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Read client details from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| header("x-real-ip").map(String::from));
        let user_agent = header("user-agent").map(|v| v.chars().take(MAX_USER_AGENT_LEN).collect());
        Self {
            ip_address,
            user_agent,
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone)]
pub struct Actor {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

impl Actor {
    /// An actor that is not (yet) an authenticated caller, e.g. a user
    /// registering or accepting an invitation.
    pub fn user(tenant_id: Uuid, user_id: Uuid, email: &str) -> Self {
        Self {
            tenant_id,
            user_id: Some(user_id),
            email: Some(email.to_string()),
        }
    }

    /// A report worker acting on a tenant's behalf.
    pub fn system(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            user_id: None,
            email: None,
        }
    }
}

impl From<&CallerIdentity> for Actor {
    fn from(caller: &CallerIdentity) -> Self {
        Self::user(caller.tenant_id, caller.user_id, &caller.email)
    }
}

/// What happened.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    action: AuditAction,
    resource_type: ResourceType,
    resource_id: Option<Uuid>,
    description: String,
    changes: Option<Value>,
    metadata: Option<Value>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: impl Into<Option<Uuid>>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource_id: resource_id.into(),
            description: description.into(),
            changes: None,
            metadata: None,
        }
    }

    /// Attach a `{field: {from, to}}` diff.
    pub fn with_changes(mut self, changes: Value) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Attach free-form metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Append one entry to the tenant's trail and mirror it to Postgres.
pub async fn record(
    state: &AppState,
    actor: &Actor,
    ctx: &RequestContext,
    event: AuditEvent,
) -> AuditLogEntry {
    let entry = state.audit.append(AuditDraft {
        tenant_id: actor.tenant_id,
        timestamp: Utc::now().trunc_subsecs(6),
        user_id: actor.user_id,
        user_email: actor.email.clone(),
        action: event.action,
        resource_type: event.resource_type,
        resource_id: event.resource_id,
        description: event.description,
        changes: event.changes,
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
        metadata: event.metadata,
    });

    metrics::counter!("audit_entries_total", "action" => entry.action.as_str()).increment(1);

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::audit::insert(pool, &entry).await {
            tracing::warn!(
                tenant_id = %entry.tenant_id,
                audit_id = %entry.id,
                action = %entry.action,
                error = %e,
                "failed to persist audit entry"
            );
        }
    }

    tracing::debug!(
        tenant_id = %entry.tenant_id,
        action = %entry.action,
        resource_id = ?entry.resource_id,
        "audit entry recorded"
    );
    entry
}

/// `{"field": {"from": .., "to": ..}}`
pub fn diff(field: &str, from: impl serde::Serialize, to: impl serde::Serialize) -> Value {
    let mut changes = serde_json::Map::new();
    changes.insert(
        field.to_string(),
        serde_json::json!({ "from": from, "to": to }),
    );
    Value::Object(changes)
}
