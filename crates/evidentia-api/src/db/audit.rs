//! Audit log persistence: insert and load only.
//!
//! Entries arrive already chained by the in-memory trail. They are stored
//! with their hashes and sequence so a restart restores the same chain and
//! verification can detect rows altered at rest.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use evidentia_core::{AuditAction, ResourceType};

use crate::state::AuditLogEntry;

/// Append an entry.
pub async fn insert(pool: &PgPool, entry: &AuditLogEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_log_entries (id, organization_id, sequence, timestamp, user_id,
         user_email, action, resource_type, resource_id, description, changes, ip_address,
         user_agent, metadata, previous_hash, entry_hash)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(entry.id)
    .bind(entry.tenant_id)
    .bind(entry.sequence)
    .bind(entry.timestamp)
    .bind(entry.user_id)
    .bind(&entry.user_email)
    .bind(entry.action.as_str())
    .bind(entry.resource_type.as_str())
    .bind(entry.resource_id)
    .bind(&entry.description)
    .bind(&entry.changes)
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .bind(&entry.metadata)
    .bind(&entry.previous_hash)
    .bind(&entry.entry_hash)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load every tenant's chain, in chain order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT id, organization_id, sequence, timestamp, user_id, user_email, action,
         resource_type, resource_id, description, changes, ip_address, user_agent, metadata,
         previous_hash, entry_hash
         FROM audit_log_entries ORDER BY organization_id, sequence",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(AuditRow::into_entry).collect())
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    organization_id: Uuid,
    sequence: i64,
    timestamp: DateTime<Utc>,
    user_id: Option<Uuid>,
    user_email: Option<String>,
    action: String,
    resource_type: String,
    resource_id: Option<Uuid>,
    description: String,
    changes: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: Option<serde_json::Value>,
    previous_hash: String,
    entry_hash: String,
}

impl AuditRow {
    /// Rows with an unknown action or resource type are skipped. Their
    /// absence shows up as a broken link when the chain is verified.
    fn into_entry(self) -> Option<AuditLogEntry> {
        let (Ok(action), Ok(resource_type)) = (
            AuditAction::parse(&self.action),
            ResourceType::parse(&self.resource_type),
        ) else {
            tracing::error!(
                audit_id = %self.id,
                action = %self.action,
                resource_type = %self.resource_type,
                "unreadable audit row skipped"
            );
            return None;
        };
        Some(AuditLogEntry {
            id: self.id,
            tenant_id: self.organization_id,
            sequence: self.sequence,
            timestamp: self.timestamp,
            user_id: self.user_id,
            user_email: self.user_email,
            action,
            resource_type,
            resource_id: self.resource_id,
            description: self.description,
            changes: self.changes,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            metadata: self.metadata,
            previous_hash: self.previous_hash,
            entry_hash: self.entry_hash,
        })
    }
}
