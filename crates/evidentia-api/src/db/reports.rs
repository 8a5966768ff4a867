//! Report persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use evidentia_state::{ReportStatus, ReportType};

use super::parse_or;
use crate::state::ReportRecord;

/// Insert a new report request.
pub async fn insert(pool: &PgPool, report: &ReportRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reports (id, organization_id, title, description, report_type, requirement_ids,
         status, output_locator, generated_by, created_at, completed_at, error_message)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(report.id)
    .bind(report.tenant_id)
    .bind(&report.title)
    .bind(&report.description)
    .bind(report.report_type.as_str())
    .bind(&report.requirement_ids)
    .bind(report.status.as_str())
    .bind(&report.output_locator)
    .bind(report.generated_by)
    .bind(report.created_at)
    .bind(report.completed_at)
    .bind(&report.error_message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist a status transition.
pub async fn update_status(pool: &PgPool, report: &ReportRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reports SET status = $1, output_locator = $2, completed_at = $3, error_message = $4
         WHERE id = $5",
    )
    .bind(report.status.as_str())
    .bind(&report.output_locator)
    .bind(report.completed_at)
    .bind(&report.error_message)
    .bind(report.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all reports on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ReportRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReportRow>(
        "SELECT id, organization_id, title, description, report_type, requirement_ids, status,
         output_locator, generated_by, created_at, completed_at, error_message
         FROM reports ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ReportRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    organization_id: Uuid,
    title: String,
    description: Option<String>,
    report_type: String,
    requirement_ids: Vec<Uuid>,
    status: String,
    output_locator: Option<String>,
    generated_by: Uuid,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl ReportRow {
    fn into_record(self) -> ReportRecord {
        ReportRecord {
            report_type: parse_or(
                "reports",
                "report_type",
                &self.report_type,
                ReportType::parse(&self.report_type).ok(),
                ReportType::Comprehensive,
            ),
            status: parse_or(
                "reports",
                "status",
                &self.status,
                ReportStatus::from_name(&self.status),
                ReportStatus::Failed,
            ),
            id: self.id,
            tenant_id: self.organization_id,
            title: self.title,
            description: self.description,
            requirement_ids: self.requirement_ids,
            output_locator: self.output_locator,
            generated_by: self.generated_by,
            created_at: self.created_at,
            completed_at: self.completed_at,
            error_message: self.error_message,
        }
    }
}
