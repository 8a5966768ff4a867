//! Organization persistence. The subscription is stored in columns of the
//! organization row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use evidentia_core::{EmployeeBand, Industry, RegulatoryFramework, SubscriptionTier};
use evidentia_state::{Subscription, SubscriptionStatus};

use super::parse_or;
use crate::state::OrganizationRecord;

const COLUMNS: &str = "id, name, industry, employee_count, regulatory_framework, website, address, phone,
     subscription_tier, subscription_status, max_users, monthly_price, current_period_start,
     current_period_end, cancel_at_period_end, created_at, updated_at, updated_by";

/// Insert a new organization.
pub async fn insert(pool: &PgPool, org: &OrganizationRecord) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO organizations ({COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
    ))
    .bind(org.id)
    .bind(&org.name)
    .bind(org.industry.as_str())
    .bind(org.employee_count.as_str())
    .bind(org.regulatory_framework.as_str())
    .bind(&org.website)
    .bind(&org.address)
    .bind(&org.phone)
    .bind(org.subscription.tier.as_str())
    .bind(org.subscription.status.as_str())
    .bind(max_users_column(org.subscription.max_users))
    .bind(org.subscription.monthly_price)
    .bind(org.subscription.current_period_start)
    .bind(org.subscription.current_period_end)
    .bind(org.subscription.cancel_at_period_end)
    .bind(org.created_at)
    .bind(org.updated_at)
    .bind(org.updated_by)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update profile fields.
pub async fn update_profile(pool: &PgPool, org: &OrganizationRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE organizations SET name = $1, industry = $2, employee_count = $3,
         regulatory_framework = $4, website = $5, address = $6, phone = $7,
         updated_at = $8, updated_by = $9
         WHERE id = $10",
    )
    .bind(&org.name)
    .bind(org.industry.as_str())
    .bind(org.employee_count.as_str())
    .bind(org.regulatory_framework.as_str())
    .bind(&org.website)
    .bind(&org.address)
    .bind(&org.phone)
    .bind(org.updated_at)
    .bind(org.updated_by)
    .bind(org.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Update the subscription columns.
pub async fn update_subscription(
    pool: &PgPool,
    id: Uuid,
    subscription: &Subscription,
    updated_at: DateTime<Utc>,
    updated_by: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE organizations SET subscription_tier = $1, subscription_status = $2,
         max_users = $3, monthly_price = $4, current_period_start = $5,
         current_period_end = $6, cancel_at_period_end = $7, updated_at = $8, updated_by = $9
         WHERE id = $10",
    )
    .bind(subscription.tier.as_str())
    .bind(subscription.status.as_str())
    .bind(max_users_column(subscription.max_users))
    .bind(subscription.monthly_price)
    .bind(subscription.current_period_start)
    .bind(subscription.current_period_end)
    .bind(subscription.cancel_at_period_end)
    .bind(updated_at)
    .bind(updated_by)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all organizations on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<OrganizationRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrganizationRow>(&format!(
        "SELECT {COLUMNS} FROM organizations ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(OrganizationRow::into_record).collect())
}

fn max_users_column(max_users: u32) -> i32 {
    i32::try_from(max_users).unwrap_or(i32::MAX)
}

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    industry: String,
    employee_count: String,
    regulatory_framework: String,
    website: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    subscription_tier: String,
    subscription_status: String,
    max_users: i32,
    monthly_price: f64,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    cancel_at_period_end: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl OrganizationRow {
    fn into_record(self) -> OrganizationRecord {
        const T: &str = "organizations";
        OrganizationRecord {
            id: self.id,
            industry: parse_or(T, "industry", &self.industry, Industry::parse(&self.industry).ok(), Industry::Other),
            employee_count: parse_or(
                T,
                "employee_count",
                &self.employee_count,
                EmployeeBand::parse(&self.employee_count).ok(),
                EmployeeBand::OneToTen,
            ),
            regulatory_framework: parse_or(
                T,
                "regulatory_framework",
                &self.regulatory_framework,
                RegulatoryFramework::parse(&self.regulatory_framework).ok(),
                RegulatoryFramework::SecRia,
            ),
            name: self.name,
            website: self.website,
            address: self.address,
            phone: self.phone,
            subscription: Subscription {
                tier: parse_or(
                    T,
                    "subscription_tier",
                    &self.subscription_tier,
                    SubscriptionTier::parse(&self.subscription_tier).ok(),
                    SubscriptionTier::lowest(),
                ),
                status: parse_or(
                    T,
                    "subscription_status",
                    &self.subscription_status,
                    SubscriptionStatus::from_name(&self.subscription_status),
                    SubscriptionStatus::Trial,
                ),
                max_users: u32::try_from(self.max_users).unwrap_or(0),
                monthly_price: self.monthly_price,
                current_period_start: self.current_period_start,
                current_period_end: self.current_period_end,
                cancel_at_period_end: self.cancel_at_period_end,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
            updated_by: self.updated_by,
        }
    }
}
