use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumString};

use crate::models::entity::EntityKind;

/// Lifecycle of one sync attempt: pending until the webhook is dispatched,
/// processing while the pipeline works, then success or failed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

/// One row of the sync ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RagSyncLog {
    pub id: i64,
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub action: SyncAction,
    pub vector_id: Option<String>,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub webhook_sent_at: Option<DateTime<Utc>>,
    pub vectorized_at: Option<DateTime<Utc>>,
    pub sync_metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RagSyncLog {
    const COLUMNS: &'static str = "id, entity_type, entity_id, action, vector_id, status, \
         error_message, webhook_sent_at, vectorized_at, sync_metadata, created_at, updated_at";

    /// Open a pending ledger entry for one entity change.
    pub async fn create(
        pool: &SqlitePool,
        entity_type: EntityKind,
        entity_id: i64,
        action: SyncAction,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO rag_sync_log (entity_type, entity_id, action)
             VALUES (?, ?, ?)
             RETURNING {}",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .bind(action)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM rag_sync_log WHERE id = ?", Self::COLUMNS);
        sqlx::query_as::<_, Self>(&sql).bind(id).fetch_optional(pool).await
    }

    /// Move a pending entry to processing once the webhook went out. Entries
    /// already finalized by a fast callback are left untouched.
    pub async fn mark_webhook_sent(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE rag_sync_log
             SET status = 'processing', webhook_sent_at = datetime('now', 'subsec'),
                 updated_at = datetime('now', 'subsec')
             WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// The webhook never left the building; fail the entry immediately.
    pub async fn mark_dispatch_failed(
        pool: &SqlitePool,
        id: i64,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE rag_sync_log
             SET status = 'failed', error_message = ?, updated_at = datetime('now', 'subsec')
             WHERE id = ? AND status = 'pending'",
        )
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Terminal transition driven by the pipeline callback. Only in-flight
    /// entries move; a duplicate callback on an already-final entry is a
    /// no-op and reports `false`.
    pub async fn finalize(
        pool: &SqlitePool,
        id: i64,
        status: SyncStatus,
        vector_id: Option<&str>,
        error_message: Option<&str>,
        sync_metadata: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let vectorized = matches!(status, SyncStatus::Success);
        let result = sqlx::query(
            "UPDATE rag_sync_log
             SET status = ?,
                 vector_id = COALESCE(?, vector_id),
                 error_message = ?,
                 sync_metadata = COALESCE(?, sync_metadata),
                 vectorized_at = CASE WHEN ? THEN datetime('now', 'subsec') ELSE vectorized_at END,
                 updated_at = datetime('now', 'subsec')
             WHERE id = ? AND status IN ('pending', 'processing')",
        )
        .bind(status)
        .bind(vector_id)
        .bind(error_message)
        .bind(sync_metadata)
        .bind(vectorized)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest in-flight entry for one entity, for callbacks that do not echo
    /// the ledger id back.
    pub async fn find_latest_in_flight(
        pool: &SqlitePool,
        entity_type: EntityKind,
        entity_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM rag_sync_log
             WHERE entity_type = ? AND entity_id = ? AND status IN ('pending', 'processing')
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(pool)
            .await
    }

    /// Fail every in-flight entry, optionally scoped to one entity type.
    /// Returns the number of entries cancelled.
    pub async fn cancel_in_flight(
        pool: &SqlitePool,
        entity_type: Option<EntityKind>,
        reason: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rag_sync_log
             SET status = 'failed', error_message = ?1, updated_at = datetime('now', 'subsec')
             WHERE status IN ('pending', 'processing')
               AND (?2 IS NULL OR entity_type = ?2)",
        )
        .bind(reason)
        .bind(entity_type)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Newest-first listing with optional type and status filters.
    pub async fn find_recent(
        pool: &SqlitePool,
        limit: i64,
        entity_type: Option<EntityKind>,
        status: Option<SyncStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM rag_sync_log
             WHERE (?1 IS NULL OR entity_type = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3",
            Self::COLUMNS
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(entity_type)
            .bind(status)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Entries still waiting on the pipeline within the recent window, used
    /// by the status report to show live activity.
    pub async fn count_in_flight_since(
        pool: &SqlitePool,
        window_minutes: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM rag_sync_log
             WHERE status IN ('pending', 'processing')
               AND created_at >= datetime('now', ?)",
        )
        .bind(format!("-{window_minutes} minutes"))
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    async fn open(pool: &SqlitePool) -> RagSyncLog {
        RagSyncLog::create(pool, EntityKind::YogaClass, 1, SyncAction::Update)
            .await
            .expect("create log")
    }

    #[tokio::test]
    async fn happy_path_lifecycle() {
        let db = DBService::new_in_memory().await.expect("db");
        let log = open(&db.pool).await;
        assert_eq!(log.status, SyncStatus::Pending);
        assert!(log.webhook_sent_at.is_none());

        RagSyncLog::mark_webhook_sent(&db.pool, log.id).await.expect("sent");
        let log = RagSyncLog::find_by_id(&db.pool, log.id).await.expect("query").expect("row");
        assert_eq!(log.status, SyncStatus::Processing);
        assert!(log.webhook_sent_at.is_some());

        let updated = RagSyncLog::finalize(
            &db.pool,
            log.id,
            SyncStatus::Success,
            Some("point-1"),
            None,
            Some(r#"{"chunks": 3}"#),
        )
        .await
        .expect("finalize");
        assert!(updated);

        let log = RagSyncLog::find_by_id(&db.pool, log.id).await.expect("query").expect("row");
        assert_eq!(log.status, SyncStatus::Success);
        assert_eq!(log.vector_id.as_deref(), Some("point-1"));
        assert!(log.vectorized_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_callback_is_a_no_op() {
        let db = DBService::new_in_memory().await.expect("db");
        let log = open(&db.pool).await;

        assert!(
            RagSyncLog::finalize(&db.pool, log.id, SyncStatus::Failed, None, Some("boom"), None)
                .await
                .expect("finalize")
        );
        // second callback does not resurrect or flip the entry
        assert!(
            !RagSyncLog::finalize(&db.pool, log.id, SyncStatus::Success, Some("p"), None, None)
                .await
                .expect("finalize")
        );

        let log = RagSyncLog::find_by_id(&db.pool, log.id).await.expect("query").expect("row");
        assert_eq!(log.status, SyncStatus::Failed);
        assert_eq!(log.error_message.as_deref(), Some("boom"));
        assert!(log.vector_id.is_none());
    }

    #[tokio::test]
    async fn dispatch_failure_only_hits_pending() {
        let db = DBService::new_in_memory().await.expect("db");
        let log = open(&db.pool).await;
        RagSyncLog::mark_webhook_sent(&db.pool, log.id).await.expect("sent");

        // the entry moved on already
        RagSyncLog::mark_dispatch_failed(&db.pool, log.id, "timeout").await.expect("fail");
        let log = RagSyncLog::find_by_id(&db.pool, log.id).await.expect("query").expect("row");
        assert_eq!(log.status, SyncStatus::Processing);
    }

    #[tokio::test]
    async fn cancel_in_flight_respects_scope() {
        let db = DBService::new_in_memory().await.expect("db");
        let a = RagSyncLog::create(&db.pool, EntityKind::YogaClass, 1, SyncAction::Update)
            .await
            .expect("create");
        let b = RagSyncLog::create(&db.pool, EntityKind::Promotion, 2, SyncAction::Create)
            .await
            .expect("create");

        let cancelled =
            RagSyncLog::cancel_in_flight(&db.pool, Some(EntityKind::YogaClass), "reinicio")
                .await
                .expect("cancel");
        assert_eq!(cancelled, 1);

        let a = RagSyncLog::find_by_id(&db.pool, a.id).await.expect("query").expect("row");
        assert_eq!(a.status, SyncStatus::Failed);
        let b = RagSyncLog::find_by_id(&db.pool, b.id).await.expect("query").expect("row");
        assert_eq!(b.status, SyncStatus::Pending);

        let cancelled = RagSyncLog::cancel_in_flight(&db.pool, None, "reinicio global")
            .await
            .expect("cancel");
        assert_eq!(cancelled, 1);
    }

    #[tokio::test]
    async fn recent_listing_applies_filters() {
        let db = DBService::new_in_memory().await.expect("db");
        for i in 0..3 {
            RagSyncLog::create(&db.pool, EntityKind::Content, i, SyncAction::Update)
                .await
                .expect("create");
        }
        let failed = RagSyncLog::create(&db.pool, EntityKind::Massage, 9, SyncAction::Delete)
            .await
            .expect("create");
        RagSyncLog::finalize(&db.pool, failed.id, SyncStatus::Failed, None, Some("x"), None)
            .await
            .expect("finalize");

        let all = RagSyncLog::find_recent(&db.pool, 50, None, None).await.expect("query");
        assert_eq!(all.len(), 4);
        // newest first
        assert_eq!(all[0].id, failed.id);

        let contents = RagSyncLog::find_recent(&db.pool, 50, Some(EntityKind::Content), None)
            .await
            .expect("query");
        assert_eq!(contents.len(), 3);

        let failures = RagSyncLog::find_recent(&db.pool, 50, None, Some(SyncStatus::Failed))
            .await
            .expect("query");
        assert_eq!(failures.len(), 1);

        let limited = RagSyncLog::find_recent(&db.pool, 2, None, None).await.expect("query");
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn in_flight_window_counts_open_entries() {
        let db = DBService::new_in_memory().await.expect("db");
        let open_log = open(&db.pool).await;
        let done = RagSyncLog::create(&db.pool, EntityKind::Activity, 5, SyncAction::Update)
            .await
            .expect("create");
        RagSyncLog::finalize(&db.pool, done.id, SyncStatus::Success, Some("p"), None, None)
            .await
            .expect("finalize");

        let count = RagSyncLog::count_in_flight_since(&db.pool, 5).await.expect("count");
        assert_eq!(count, 1);

        RagSyncLog::finalize(&db.pool, open_log.id, SyncStatus::Success, Some("q"), None, None)
            .await
            .expect("finalize");
        let count = RagSyncLog::count_in_flight_since(&db.pool, 5).await.expect("count");
        assert_eq!(count, 0);
    }
}
