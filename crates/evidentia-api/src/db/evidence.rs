//! Evidence persistence.
//!
//! Lifecycle constraints are enforced by the typestate machine in
//! `evidentia-state`, not in SQL.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use evidentia_core::EvidenceSource;
use evidentia_state::EvidenceStatus;

use super::parse_or;
use crate::state::EvidenceRecord;

const COLUMNS: &str = "id, organization_id, title, description, source, evidence_date, blob_locator,
     file_name, file_size, file_type, external_link, metadata, requirement_ids, uploaded_by,
     status, created_at, updated_at";

/// Insert a new evidence record (status `uploading`).
pub async fn insert(pool: &PgPool, ev: &EvidenceRecord) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO evidence ({COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
    ))
    .bind(ev.id)
    .bind(ev.tenant_id)
    .bind(&ev.title)
    .bind(&ev.description)
    .bind(ev.source.as_str())
    .bind(ev.evidence_date)
    .bind(&ev.blob_locator)
    .bind(&ev.file_name)
    .bind(ev.file_size)
    .bind(&ev.file_type)
    .bind(&ev.external_link)
    .bind(&ev.metadata)
    .bind(&ev.requirement_ids)
    .bind(ev.uploaded_by)
    .bind(ev.status.as_str())
    .bind(ev.created_at)
    .bind(ev.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist metadata, associations and status after a transition.
pub async fn update(pool: &PgPool, ev: &EvidenceRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE evidence SET title = $1, description = $2, source = $3, evidence_date = $4,
         external_link = $5, metadata = $6, requirement_ids = $7, status = $8, updated_at = $9
         WHERE id = $10 AND organization_id = $11",
    )
    .bind(&ev.title)
    .bind(&ev.description)
    .bind(ev.source.as_str())
    .bind(ev.evidence_date)
    .bind(&ev.external_link)
    .bind(&ev.metadata)
    .bind(&ev.requirement_ids)
    .bind(ev.status.as_str())
    .bind(ev.updated_at)
    .bind(ev.id)
    .bind(ev.tenant_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all evidence on startup, including soft-deleted records.
pub async fn load_all(pool: &PgPool) -> Result<Vec<EvidenceRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EvidenceRow>(&format!(
        "SELECT {COLUMNS} FROM evidence ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(EvidenceRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct EvidenceRow {
    id: Uuid,
    organization_id: Uuid,
    title: String,
    description: Option<String>,
    source: String,
    evidence_date: Option<DateTime<Utc>>,
    blob_locator: Option<String>,
    file_name: String,
    file_size: i64,
    file_type: String,
    external_link: Option<String>,
    metadata: Option<serde_json::Value>,
    requirement_ids: Vec<Uuid>,
    uploaded_by: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EvidenceRow {
    fn into_record(self) -> EvidenceRecord {
        EvidenceRecord {
            source: parse_or(
                "evidence",
                "source",
                &self.source,
                EvidenceSource::parse(&self.source).ok(),
                EvidenceSource::ManualUpload,
            ),
            // An unreadable status must not resurface as live evidence.
            status: parse_or(
                "evidence",
                "status",
                &self.status,
                EvidenceStatus::from_name(&self.status),
                EvidenceStatus::Deleted,
            ),
            id: self.id,
            tenant_id: self.organization_id,
            title: self.title,
            description: self.description,
            evidence_date: self.evidence_date,
            blob_locator: self.blob_locator,
            file_name: self.file_name,
            file_size: self.file_size,
            file_type: self.file_type,
            external_link: self.external_link,
            metadata: self.metadata,
            requirement_ids: self.requirement_ids,
            uploaded_by: self.uploaded_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
