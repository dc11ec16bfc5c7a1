//! Aggregated view of how much of the knowledge base is vectorized.

use std::collections::BTreeMap;

use db::models::entity::{EntityKind, TypeSyncStats};
use db::models::sync_log::RagSyncLog;
use serde::Serialize;
use sqlx::SqlitePool;

/// Ledger entries older than this are no longer counted as live activity.
pub const IN_FLIGHT_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Serialize)]
pub struct SyncStatusReport {
    /// Per-type counters, keyed by the entity type name.
    pub per_type: BTreeMap<String, TypeSyncStats>,
    pub total_needs_reindex: i64,
    /// In-flight ledger entries opened within the recent window.
    pub processing_count: i64,
}

pub async fn get_sync_status(pool: &SqlitePool) -> Result<SyncStatusReport, sqlx::Error> {
    let mut per_type = BTreeMap::new();
    let mut total_needs_reindex = 0;
    for kind in EntityKind::ALL {
        let stats = kind.stats(pool).await?;
        total_needs_reindex += stats.needs_reindex;
        per_type.insert(kind.to_string(), stats);
    }
    let processing_count =
        RagSyncLog::count_in_flight_since(pool, IN_FLIGHT_WINDOW_MINUTES).await?;

    Ok(SyncStatusReport {
        per_type,
        total_needs_reindex,
        processing_count,
    })
}
