//! RAG synchronization: turns entity changes into webhook notifications,
//! records each attempt in the sync ledger and applies pipeline callbacks
//! back onto the entity rows.

use std::str::FromStr;
use std::sync::Arc;

use db::DBService;
use db::models::entity::{EntityKind, SyncableRecord};
use db::models::sync_log::{RagSyncLog, SyncAction, SyncStatus};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use utils::text::slugify;
use uuid::Uuid;

use crate::services::vector_index::{VectorIndex, deterministic_point_id};
use crate::services::webhook::{FlatFields, SyncWebhookPayload, WebhookDispatcher};

#[derive(Debug, Error)]
pub enum RagSyncError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("tipo de entidad desconocido: '{0}'")]
    UnknownEntityType(String),
    #[error("estado de sincronización inválido: '{0}'")]
    InvalidStatus(String),
}

/// Callback body posted by the pipeline after it finished one entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncCallback {
    pub entity_type: String,
    pub entity_id: i64,
    pub status: String,
    pub vector_id: Option<String>,
    pub error_message: Option<String>,
    pub log_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

/// What a callback ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Ledger and entity row updated.
    Updated,
    /// The entity row disappeared between dispatch and callback; only the
    /// ledger was touched.
    StaleEntity,
}

#[derive(Clone)]
pub struct RagSyncService {
    db: DBService,
    dispatcher: Option<Arc<dyn WebhookDispatcher>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl RagSyncService {
    pub fn new(
        db: DBService,
        dispatcher: Option<Arc<dyn WebhookDispatcher>>,
        vector_index: Option<Arc<dyn VectorIndex>>,
    ) -> Self {
        Self {
            db,
            dispatcher,
            vector_index,
        }
    }

    /// Open a ledger entry for one entity change and fire the webhook in the
    /// background. Returns the ledger id; the caller's write path never waits
    /// on the network.
    pub async fn notify_entity_changed(
        &self,
        kind: EntityKind,
        entity_id: i64,
        action: SyncAction,
        snapshot: Option<SyncableRecord>,
    ) -> Result<i64, RagSyncError> {
        let log = RagSyncLog::create(&self.db.pool, kind, entity_id, action).await?;

        let record = match snapshot {
            Some(record) => Some(record),
            None => kind.fetch(&self.db.pool, entity_id).await?,
        };
        // a delete without a snapshot still syncs fine; anything else needs
        // the row to exist
        if record.is_none() && action != SyncAction::Delete {
            warn!(
                entity_type = %kind,
                entity_id,
                "entity vanished before sync dispatch"
            );
            RagSyncLog::mark_dispatch_failed(&self.db.pool, log.id, "entidad no encontrada")
                .await?;
            return Ok(log.id);
        }

        let payload = build_payload(kind, entity_id, action, log.id, record);
        let service = self.clone();
        tokio::spawn(async move {
            service.dispatch_and_record(payload).await;
        });

        Ok(log.id)
    }

    /// Dispatch one payload and record the outcome in the ledger. Runs
    /// detached from the request that triggered it.
    async fn dispatch_and_record(&self, payload: SyncWebhookPayload) {
        match &self.dispatcher {
            Some(dispatcher) => match dispatcher.dispatch(&payload).await {
                Ok(()) => {
                    debug!(
                        entity_type = %payload.entity_type,
                        entity_id = payload.id,
                        log_id = payload.log_id,
                        "sync webhook dispatched"
                    );
                    if let Err(e) = RagSyncLog::mark_webhook_sent(&self.db.pool, payload.log_id).await
                    {
                        warn!(log_id = payload.log_id, "failed to record dispatch: {e}");
                    }
                }
                Err(e) => {
                    warn!(
                        entity_type = %payload.entity_type,
                        entity_id = payload.id,
                        "sync webhook failed: {e}"
                    );
                    if let Err(db_err) =
                        RagSyncLog::mark_dispatch_failed(&self.db.pool, payload.log_id, &e.to_string())
                            .await
                    {
                        warn!(log_id = payload.log_id, "failed to record failure: {db_err}");
                    }
                }
            },
            None => {
                debug!(
                    entity_type = %payload.entity_type,
                    entity_id = payload.id,
                    "no webhook configured, sync entry stays pending"
                );
            }
        }

        if payload.action == SyncAction::Delete {
            self.delete_vector_point(&payload).await;
        }
    }

    /// Best-effort removal of the entity's point from the vector store. The
    /// pipeline cannot do this itself once the source row is gone.
    async fn delete_vector_point(&self, payload: &SyncWebhookPayload) {
        let Some(index) = &self.vector_index else {
            return;
        };
        let point_id = Uuid::parse_str(&payload.vector_id)
            .unwrap_or_else(|_| deterministic_point_id(payload.entity_type, payload.id));
        if let Err(e) = index.delete_point(point_id).await {
            warn!(
                entity_type = %payload.entity_type,
                entity_id = payload.id,
                %point_id,
                "vector point delete failed: {e}"
            );
        }
    }

    /// Apply one pipeline callback: close the matching ledger entry and
    /// stamp or re-flag the entity row.
    pub async fn report_sync_result(
        &self,
        callback: SyncCallback,
    ) -> Result<CallbackOutcome, RagSyncError> {
        let kind = EntityKind::from_str(&callback.entity_type)
            .map_err(|_| RagSyncError::UnknownEntityType(callback.entity_type.clone()))?;
        let status = match SyncStatus::from_str(&callback.status) {
            Ok(status @ (SyncStatus::Success | SyncStatus::Failed)) => status,
            _ => return Err(RagSyncError::InvalidStatus(callback.status.clone())),
        };

        let log = match callback.log_id {
            Some(id) => RagSyncLog::find_by_id(&self.db.pool, id).await?,
            None => {
                RagSyncLog::find_latest_in_flight(&self.db.pool, kind, callback.entity_id).await?
            }
        };
        let vector_id = callback
            .vector_id
            .clone()
            .unwrap_or_else(|| deterministic_point_id(kind, callback.entity_id).to_string());
        let metadata = callback.metadata.as_ref().map(|v| v.to_string());

        if let Some(log) = log {
            let closed = RagSyncLog::finalize(
                &self.db.pool,
                log.id,
                status,
                Some(&vector_id),
                callback.error_message.as_deref(),
                metadata.as_deref(),
            )
            .await?;
            if !closed {
                debug!(log_id = log.id, "callback for already-final sync entry ignored");
            }
        } else {
            warn!(
                entity_type = %kind,
                entity_id = callback.entity_id,
                "callback without a matching sync entry"
            );
        }

        let entity_updated = match status {
            SyncStatus::Success => {
                kind.apply_sync_success(&self.db.pool, callback.entity_id, &vector_id)
                    .await?
            }
            _ => kind.apply_sync_failure(&self.db.pool, callback.entity_id).await?,
        };

        if entity_updated {
            Ok(CallbackOutcome::Updated)
        } else {
            Ok(CallbackOutcome::StaleEntity)
        }
    }

    /// Tear down the assistant's memory for one entity type, or for all of
    /// them. In-flight entries are cancelled first so the delete
    /// notifications opened here are not swept up; then every stored vector
    /// reference is dropped and the reindex flags raised. Returns the number
    /// of entity rows reset.
    pub async fn reset_sync_scope(&self, scope: Option<EntityKind>) -> Result<u64, RagSyncError> {
        let cancelled =
            RagSyncLog::cancel_in_flight(&self.db.pool, scope, "cancelled by reset").await?;
        if cancelled > 0 {
            debug!(cancelled, "cancelled in-flight sync entries before reset");
        }

        let kinds: Vec<EntityKind> = match scope {
            Some(kind) => vec![kind],
            None => EntityKind::ALL.to_vec(),
        };

        let mut reset_count = 0u64;
        for kind in kinds {
            for id in kind.ids_with_vector(&self.db.pool).await? {
                self.notify_entity_changed(kind, id, SyncAction::Delete, None)
                    .await?;
            }
            reset_count += kind.clear_sync_state(&self.db.pool).await?;
        }
        Ok(reset_count)
    }

    /// Push every visible row that needs indexing through the pipeline.
    /// Returns how many notifications were opened.
    pub async fn trigger_sync(
        &self,
        scope: Option<EntityKind>,
        force: bool,
    ) -> Result<u64, RagSyncError> {
        let kinds: Vec<EntityKind> = match scope {
            Some(kind) => vec![kind],
            None => EntityKind::ALL.to_vec(),
        };

        let mut triggered = 0u64;
        for kind in kinds {
            for id in kind.ids_needing_sync(&self.db.pool, force).await? {
                self.notify_entity_changed(kind, id, SyncAction::Update, None)
                    .await?;
                triggered += 1;
            }
        }
        Ok(triggered)
    }
}

fn sanitize(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Tags may be stored as a JSON list or as plain text; either way the
/// payload carries a comma-separated string.
fn normalize_tags(raw: Option<String>) -> Option<String> {
    let raw = sanitize(raw)?;
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(&raw) {
        let joined = items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        return if joined.is_empty() { None } else { Some(joined) };
    }
    Some(raw)
}

/// Synthesize the webhook body from whatever the row holds. Every field
/// degrades to something non-empty so the pipeline never chokes on blanks.
fn build_payload(
    kind: EntityKind,
    entity_id: i64,
    action: SyncAction,
    log_id: i64,
    record: Option<SyncableRecord>,
) -> SyncWebhookPayload {
    let record = record.unwrap_or_else(|| SyncableRecord {
        id: entity_id,
        ..Default::default()
    });

    let title = sanitize(record.title).unwrap_or_else(|| format!("Entity {entity_id}"));
    let mut content = sanitize(record.content).unwrap_or_else(|| title.clone());
    if let Some(extra) = sanitize(record.extra) {
        content = format!("{content}\n\n{extra}");
    }
    let content = format!("# {title}\n\n{content}");

    let slug = sanitize(record.slug)
        .or_else(|| sanitize(Some(slugify(&title))))
        .unwrap_or_else(|| format!("entity-{entity_id}"));

    let fields = FlatFields {
        title,
        content,
        slug,
        category: sanitize(record.category),
        tags: normalize_tags(record.tags),
    };

    SyncWebhookPayload {
        id: entity_id,
        entity_type: kind,
        action,
        log_id,
        vector_id: record.vector_id.unwrap_or_default(),
        fields: fields.clone(),
        data: fields,
    }
}
