//! User persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use evidentia_core::Role;

use super::parse_or;
use crate::state::{UserRecord, UserStatus};

/// Insert a new user.
pub async fn insert(pool: &PgPool, user: &UserRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, organization_id, email, full_name, role, status, email_verified,
         created_at, updated_at, last_login_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(user.id)
    .bind(user.tenant_id)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(user.email_verified)
    .bind(user.created_at)
    .bind(user.updated_at)
    .bind(user.last_login_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update the mutable user fields.
pub async fn update(pool: &PgPool, user: &UserRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET full_name = $1, role = $2, status = $3, email_verified = $4,
         updated_at = $5, last_login_at = $6
         WHERE id = $7 AND organization_id = $8",
    )
    .bind(&user.full_name)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(user.email_verified)
    .bind(user.updated_at)
    .bind(user.last_login_at)
    .bind(user.id)
    .bind(user.tenant_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all users on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<UserRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, organization_id, email, full_name, role, status, email_verified,
         created_at, updated_at, last_login_at
         FROM users ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(UserRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    organization_id: Uuid,
    email: String,
    full_name: String,
    role: String,
    status: String,
    email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_record(self) -> UserRecord {
        // Unknown roles degrade to the least-privileged one.
        let role = parse_or("users", "role", &self.role, Role::parse(&self.role).ok(), Role::Viewer);
        let status = parse_or(
            "users",
            "status",
            &self.status,
            UserStatus::from_name(&self.status),
            UserStatus::Inactive,
        );
        UserRecord {
            id: self.id,
            tenant_id: self.organization_id,
            email: self.email,
            full_name: self.full_name,
            role,
            status,
            email_verified: self.email_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
        }
    }
}
