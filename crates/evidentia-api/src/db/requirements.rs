//! Requirement persistence.
//!
//! `evidence_count` is never written from an in-memory value after insert.
//! It only moves through [`adjust_evidence_count`], a single relative
//! UPDATE clamped at zero.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use evidentia_core::{Frequency, RequirementCategory};

use super::parse_or;
use crate::state::RequirementRecord;

/// Insert a newly activated requirement.
pub async fn insert(pool: &PgPool, req: &RequirementRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO requirements (id, organization_id, template_id, title, description, category,
         authority, evidence_types, frequency, next_due_date, last_completed_date, evidence_count,
         notes, is_active, activated_at, activated_by, updated_at, updated_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
    )
    .bind(req.id)
    .bind(req.tenant_id)
    .bind(&req.template_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.category.as_str())
    .bind(&req.authority)
    .bind(&req.evidence_types)
    .bind(req.frequency.as_str())
    .bind(req.next_due_date)
    .bind(req.last_completed_date)
    .bind(req.evidence_count)
    .bind(&req.notes)
    .bind(req.is_active)
    .bind(req.activated_at)
    .bind(req.activated_by)
    .bind(req.updated_at)
    .bind(req.updated_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update the mutable fields: notes, dates and the active flag.
pub async fn update_mutable(pool: &PgPool, req: &RequirementRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE requirements SET notes = $1, next_due_date = $2, last_completed_date = $3,
         is_active = $4, updated_at = $5, updated_by = $6
         WHERE id = $7 AND organization_id = $8",
    )
    .bind(&req.notes)
    .bind(req.next_due_date)
    .bind(req.last_completed_date)
    .bind(req.is_active)
    .bind(req.updated_at)
    .bind(req.updated_by)
    .bind(req.id)
    .bind(req.tenant_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Move the evidence counter by `delta`, never below zero.
pub async fn adjust_evidence_count(
    pool: &PgPool,
    tenant_id: Uuid,
    id: Uuid,
    delta: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE requirements SET evidence_count = GREATEST(evidence_count + $1, 0)
         WHERE id = $2 AND organization_id = $3",
    )
    .bind(delta)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all requirements on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<RequirementRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RequirementRow>(
        "SELECT id, organization_id, template_id, title, description, category, authority,
         evidence_types, frequency, next_due_date, last_completed_date, evidence_count, notes,
         is_active, activated_at, activated_by, updated_at, updated_by
         FROM requirements ORDER BY activated_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(RequirementRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct RequirementRow {
    id: Uuid,
    organization_id: Uuid,
    template_id: String,
    title: String,
    description: String,
    category: String,
    authority: String,
    evidence_types: Vec<String>,
    frequency: String,
    next_due_date: Option<DateTime<Utc>>,
    last_completed_date: Option<DateTime<Utc>>,
    evidence_count: i64,
    notes: Option<String>,
    is_active: bool,
    activated_at: DateTime<Utc>,
    activated_by: Uuid,
    updated_at: DateTime<Utc>,
    updated_by: Uuid,
}

impl RequirementRow {
    fn into_record(self) -> RequirementRecord {
        RequirementRecord {
            category: parse_or(
                "requirements",
                "category",
                &self.category,
                RequirementCategory::parse(&self.category).ok(),
                RequirementCategory::PolicyManagement,
            ),
            frequency: parse_or(
                "requirements",
                "frequency",
                &self.frequency,
                Frequency::parse(&self.frequency).ok(),
                Frequency::Ongoing,
            ),
            id: self.id,
            tenant_id: self.organization_id,
            template_id: self.template_id,
            title: self.title,
            description: self.description,
            authority: self.authority,
            evidence_types: self.evidence_types,
            next_due_date: self.next_due_date,
            last_completed_date: self.last_completed_date,
            evidence_count: self.evidence_count,
            notes: self.notes,
            is_active: self.is_active,
            activated_at: self.activated_at,
            activated_by: self.activated_by,
            updated_at: self.updated_at,
            updated_by: self.updated_by,
        }
    }
}
