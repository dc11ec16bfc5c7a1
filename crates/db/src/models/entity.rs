//! Registry of syncable entity types. Every table that feeds the knowledge
//! base is described here once; sync bookkeeping dispatches through
//! [`EntityKind`] instead of per-table code paths.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumString};

/// Closed set of entity types the sync pipeline knows about. Unknown strings
/// fail to parse; callers map that to a client error instead of touching
/// arbitrary tables.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EntityKind {
    YogaClass,
    Massage,
    Therapy,
    Content,
    Activity,
    Promotion,
}

/// Uniform projection of one syncable row, whatever table it came from.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct SyncableRecord {
    pub id: i64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    /// Kind-specific supplement appended to the synthesized content, e.g. a
    /// promotion's discount and code.
    pub extra: Option<String>,
    pub vector_id: Option<String>,
}

/// Aggregate sync counters for one entity type.
#[derive(Debug, Clone, Serialize)]
pub struct TypeSyncStats {
    pub total: i64,
    pub vectorized: i64,
    pub needs_reindex: i64,
    pub sync_percentage: f64,
}

struct TableSpec {
    table: &'static str,
    /// Predicate selecting rows visible to the assistant.
    visibility: &'static str,
    /// SELECT list producing the uniform [`SyncableRecord`] columns.
    projection: &'static str,
}

const DEFAULT_PROJECTION: &str = "id, name AS title, description AS content, slug, \
     NULL AS category, NULL AS tags, NULL AS extra, vector_id";

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::YogaClass,
        EntityKind::Massage,
        EntityKind::Therapy,
        EntityKind::Content,
        EntityKind::Activity,
        EntityKind::Promotion,
    ];

    fn spec(&self) -> TableSpec {
        match self {
            EntityKind::YogaClass => TableSpec {
                table: "yoga_classes",
                visibility: "is_active = 1",
                projection: "id, name AS title, description AS content, slug, category, tags, \
                     NULL AS extra, vector_id",
            },
            EntityKind::Massage => TableSpec {
                table: "massage_types",
                visibility: "is_active = 1",
                projection: DEFAULT_PROJECTION,
            },
            EntityKind::Therapy => TableSpec {
                table: "therapy_types",
                visibility: "is_active = 1",
                projection: DEFAULT_PROJECTION,
            },
            EntityKind::Content => TableSpec {
                table: "contents",
                visibility: "status = 'published'",
                projection: "id, title, body AS content, slug, category, tags, \
                     NULL AS extra, vector_id",
            },
            EntityKind::Activity => TableSpec {
                table: "activities",
                visibility: "is_active = 1",
                projection: "id, title, description AS content, slug, NULL AS category, \
                     NULL AS tags, NULL AS extra, vector_id",
            },
            EntityKind::Promotion => TableSpec {
                table: "promotions",
                visibility: "is_active = 1",
                projection: "id, title, description AS content, slug, NULL AS category, \
                     NULL AS tags, \
                     TRIM(COALESCE('Descuento: ' || discount || '. ', '') \
                          || COALESCE('Código: ' || code || '.', '')) AS extra, \
                     vector_id",
            },
        }
    }

    pub fn table(&self) -> &'static str {
        self.spec().table
    }

    /// Fetch one row in the uniform projection, without any visibility
    /// filter; deleted rows simply come back as `None`.
    pub async fn fetch(
        &self,
        pool: &SqlitePool,
        id: i64,
    ) -> Result<Option<SyncableRecord>, sqlx::Error> {
        let spec = self.spec();
        let sql = format!("SELECT {} FROM {} WHERE id = ?", spec.projection, spec.table);
        sqlx::query_as::<_, SyncableRecord>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record a successful vectorization: store the point id, stamp the time
    /// and clear the reindex flag. Returns false when the row no longer
    /// exists.
    pub async fn apply_sync_success(
        &self,
        pool: &SqlitePool,
        id: i64,
        vector_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET vector_id = ?, vectorized_at = datetime('now', 'subsec'), \
                 needs_reindex = 0 WHERE id = ?",
            self.spec().table
        );
        let result = sqlx::query(&sql).bind(vector_id).bind(id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// A failed sync leaves the reindex flag raised so the next sweep retries
    /// the row.
    pub async fn apply_sync_failure(
        &self,
        pool: &SqlitePool,
        id: i64,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!("UPDATE {} SET needs_reindex = 1 WHERE id = ?", self.spec().table);
        let result = sqlx::query(&sql).bind(id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ids that currently hold a vector point, used when tearing down the
    /// assistant's memory.
    pub async fn ids_with_vector(&self, pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
        let sql = format!("SELECT id FROM {} WHERE vector_id IS NOT NULL", self.spec().table);
        sqlx::query_scalar(&sql).fetch_all(pool).await
    }

    /// Clear all sync bookkeeping for this type and raise the reindex flag on
    /// every row. Returns the number of rows touched.
    pub async fn clear_sync_state(&self, pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET vector_id = NULL, vectorized_at = NULL, needs_reindex = 1",
            self.spec().table
        );
        let result = sqlx::query(&sql).execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Visible rows that a sweep should push to the pipeline. With `force`
    /// the reindex flag is ignored and every visible row qualifies.
    pub async fn ids_needing_sync(
        &self,
        pool: &SqlitePool,
        force: bool,
    ) -> Result<Vec<i64>, sqlx::Error> {
        let spec = self.spec();
        let sql = if force {
            format!("SELECT id FROM {} WHERE {}", spec.table, spec.visibility)
        } else {
            format!(
                "SELECT id FROM {} WHERE {} AND needs_reindex = 1",
                spec.table, spec.visibility
            )
        };
        sqlx::query_scalar(&sql).fetch_all(pool).await
    }

    /// Counters over the visible rows only, matching what a sweep would push.
    pub async fn stats(&self, pool: &SqlitePool) -> Result<TypeSyncStats, sqlx::Error> {
        let spec = self.spec();
        let sql = format!(
            "SELECT COUNT(*), \
                 COALESCE(SUM(CASE WHEN vector_id IS NOT NULL THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN needs_reindex = 1 THEN 1 ELSE 0 END), 0) \
             FROM {} WHERE {}",
            spec.table, spec.visibility
        );
        let (total, vectorized, needs_reindex): (i64, i64, i64) =
            sqlx::query_as(&sql).fetch_one(pool).await?;
        let sync_percentage = if total > 0 {
            ((vectorized as f64 / total as f64) * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Ok(TypeSyncStats {
            total,
            vectorized,
            needs_reindex,
            sync_percentage,
        })
    }
}
