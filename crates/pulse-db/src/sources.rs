//! Database operations for `tenants`, `sources` and `tenant_sources`.
//!
//! Sources are global; a tenant may only use a source through an enabled
//! `tenant_sources` row.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub name: String,
    pub source_type: String,
    pub ingestion_mode: String,
    pub config: Value,
    pub created_at: DateTime<Utc>,
}

/// Document totals for one source.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceStats {
    pub source_id: i64,
    pub total_documents: i64,
    pub date_min: Option<DateTime<Utc>>,
    pub date_max: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Returns `true` when `tenant_id` has an enabled grant for `source_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn is_source_accessible(
    pool: &PgPool,
    tenant_id: i64,
    source_id: i64,
) -> Result<bool, DbError> {
    let accessible: bool = sqlx::query_scalar(
        "SELECT EXISTS ( \
             SELECT 1 FROM tenant_sources ts \
             JOIN sources s ON s.id = ts.source_id \
             WHERE ts.tenant_id = $1 AND ts.source_id = $2 AND ts.is_enabled \
         )",
    )
    .bind(tenant_id)
    .bind(source_id)
    .fetch_one(pool)
    .await?;

    Ok(accessible)
}

/// Lists the sources a tenant can use, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_tenant_sources(pool: &PgPool, tenant_id: i64) -> Result<Vec<SourceRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceRow>(
        "SELECT s.id, s.name, s.source_type, s.ingestion_mode, s.config, s.created_at \
         FROM sources s \
         JOIN tenant_sources ts ON ts.source_id = s.id \
         WHERE ts.tenant_id = $1 AND ts.is_enabled \
         ORDER BY s.created_at DESC, s.id DESC",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Document count and `published_at` bounds for a source the tenant can use.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the source is not accessible to the
/// tenant, or [`DbError::Sqlx`] if a query fails.
pub async fn source_stats(
    pool: &PgPool,
    tenant_id: i64,
    source_id: i64,
) -> Result<SourceStats, DbError> {
    if !is_source_accessible(pool, tenant_id, source_id).await? {
        return Err(DbError::NotFound);
    }

    let stats = sqlx::query_as::<_, SourceStats>(
        "SELECT $1::BIGINT AS source_id, COUNT(*) AS total_documents, \
                MIN(published_at) AS date_min, MAX(published_at) AS date_max \
         FROM documents \
         WHERE source_id = $1",
    )
    .bind(source_id)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// Insert a tenant and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_tenant(pool: &PgPool, name: &str) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar("INSERT INTO tenants (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Insert a source and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_source(pool: &PgPool, name: &str, source_type: &str) -> Result<i64, DbError> {
    let id: i64 =
        sqlx::query_scalar("INSERT INTO sources (name, source_type) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(source_type)
            .fetch_one(pool)
            .await?;
    Ok(id)
}

/// Grant (or revoke, with `enabled = false`) a tenant's access to a source.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn grant_tenant_source(
    pool: &PgPool,
    tenant_id: i64,
    source_id: i64,
    enabled: bool,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO tenant_sources (tenant_id, source_id, is_enabled) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (tenant_id, source_id) DO UPDATE SET is_enabled = EXCLUDED.is_enabled",
    )
    .bind(tenant_id)
    .bind(source_id)
    .bind(enabled)
    .execute(pool)
    .await?;
    Ok(())
}
