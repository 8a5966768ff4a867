//! Invitation persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use evidentia_core::Role;

use super::parse_or;
use crate::state::{InvitationRecord, InvitationStatus};

/// Insert a new invitation, including its acceptance token.
pub async fn insert(pool: &PgPool, inv: &InvitationRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO invitations (id, organization_id, email, role, invited_by, message, token,
         status, created_at, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(inv.id)
    .bind(inv.tenant_id)
    .bind(&inv.email)
    .bind(inv.role.as_str())
    .bind(inv.invited_by)
    .bind(&inv.message)
    .bind(&inv.token)
    .bind(inv.status.as_str())
    .bind(inv.created_at)
    .bind(inv.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update an invitation's status.
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: InvitationStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE invitations SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all invitations on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<InvitationRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, InvitationRow>(
        "SELECT id, organization_id, email, role, invited_by, message, token, status,
         created_at, expires_at
         FROM invitations ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(InvitationRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct InvitationRow {
    id: Uuid,
    organization_id: Uuid,
    email: String,
    role: String,
    invited_by: Uuid,
    message: Option<String>,
    token: String,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl InvitationRow {
    fn into_record(self) -> InvitationRecord {
        InvitationRecord {
            role: parse_or("invitations", "role", &self.role, Role::parse(&self.role).ok(), Role::Viewer),
            status: parse_or(
                "invitations",
                "status",
                &self.status,
                InvitationStatus::from_name(&self.status),
                InvitationStatus::Revoked,
            ),
            id: self.id,
            tenant_id: self.organization_id,
            email: self.email,
            invited_by: self.invited_by,
            message: self.message,
            token: self.token,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}
