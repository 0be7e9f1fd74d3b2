//! Read access to `documents` under an analysis scope.
//!
//! Counting and listing share one `WHERE` clause so the cheap precheck and
//! the full fetch can never disagree.

use chrono::{DateTime, Utc};
use pulse_core::{AnalysisScope, Document};
use sqlx::PgPool;

use crate::DbError;

/// `$1` source ids, `$2`/`$3` inclusive date bounds, `$4` optional query.
const SCOPE_PREDICATE: &str = "source_id = ANY($1) \
     AND published_at >= $2 AND published_at <= $3 \
     AND ($4::TEXT IS NULL \
          OR strpos(lower(coalesce(title, '')), lower($4)) > 0 \
          OR strpos(lower(text), lower($4)) > 0)";

/// A row from the `documents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: i64,
    pub source_id: i64,
    pub published_at: DateTime<Utc>,
    pub title: Option<String>,
    pub text: String,
    pub topic: Option<String>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            source_id: row.source_id,
            published_at: row.published_at,
            title: row.title,
            text: row.text,
            topic: row.topic,
        }
    }
}

/// Count documents matching the scope predicate.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_documents_in_scope(pool: &PgPool, scope: &AnalysisScope) -> Result<i64, DbError> {
    let sql = format!("SELECT COUNT(*) FROM documents WHERE {SCOPE_PREDICATE}");
    let range = scope.date_range();

    let count: i64 = sqlx::query_scalar(&sql)
        .bind(scope.source_ids())
        .bind(range.start)
        .bind(range.end)
        .bind(scope.query())
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// List documents matching the scope predicate, ordered by `published_at ASC, id ASC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_documents_in_scope(
    pool: &PgPool,
    scope: &AnalysisScope,
) -> Result<Vec<DocumentRow>, DbError> {
    let sql = format!(
        "SELECT id, source_id, published_at, title, text, topic \
         FROM documents \
         WHERE {SCOPE_PREDICATE} \
         ORDER BY published_at ASC, id ASC"
    );
    let range = scope.date_range();

    let rows = sqlx::query_as::<_, DocumentRow>(&sql)
        .bind(scope.source_ids())
        .bind(range.start)
        .bind(range.end)
        .bind(scope.query())
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Insert a document and return its id. Ingestion proper lives elsewhere;
/// this exists for provisioning and tests.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_document(
    pool: &PgPool,
    source_id: i64,
    published_at: DateTime<Utc>,
    title: Option<&str>,
    text: &str,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO documents (source_id, published_at, title, text) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(source_id)
    .bind(published_at)
    .bind(title)
    .bind(text)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
