//! # Database Persistence Layer
//!
//! Provides Postgres persistence for Evidentia state via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, handlers
//! write through to PostgreSQL after updating the in-memory stores, and the
//! stores are hydrated from it at startup. When absent, the API operates in
//! in-memory-only mode (suitable for development and testing).
//!
//! Enumerated values are stored as their wire names. A stored value the
//! application no longer recognises is logged and mapped to a safe default
//! on load rather than aborting hydration.
//!
//! `audit_log_entries` is insert-only. [`audit`] exposes no update or
//! delete function.

pub mod audit;
pub mod evidence;
pub mod invitations;
pub mod organizations;
pub mod reports;
pub mod requirements;
pub mod users;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Parse a stored wire name, logging and falling back when it is unknown.
pub(crate) fn parse_or<T>(
    table: &'static str,
    column: &'static str,
    value: &str,
    parsed: Option<T>,
    fallback: T,
) -> T {
    parsed.unwrap_or_else(|| {
        tracing::error!(table, column, value, "unknown stored value, using fallback");
        fallback
    })
}
