//! Sync coordinator - optimistic mutation with rollback-free reconciliation
//!
//! Every mutation walks the same state machine:
//!
//!   Requested -> Optimistic -> { Confirmed | Queued }
//!
//! The optimistic cache write happens before any network traffic and is
//! unconditional. A `Network` failure queues the full intended end-state
//! for later replay; a `Rejected` response surfaces the server's message
//! and leaves the optimistic snapshot in place (no automatic revert).
//! There is no rollback path anywhere.
//!
//! Mutations against the same (kind, id) are serialized through a per-entity
//! async mutex; mutations against different entities interleave freely.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::LocalCache;
use crate::db::DbError;
use crate::derived::advance_due_date;
use crate::gateway::{GatewayError, RemoteGateway};
use crate::models::{ClientConfig, Entity, EntityKind, Patch, Recurrence, Task, TaskPatch, TaskStatus};
use crate::sync::queue::{OpKind, PendingOperation, PendingQueue, QueueError};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No cached snapshot for {0}")]
    NotFound(String),

    #[error("Undo window expired for {0}")]
    UndoExpired(String),
}

/// Where a mutation ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// The server accepted it; the snapshot is authoritative.
    Confirmed,
    /// The network was unreachable; the operation is queued for replay
    /// and the optimistic snapshot stays authoritative locally.
    Queued,
}

#[derive(Debug, Clone)]
pub struct MutationResult<E> {
    pub entity: E,
    pub status: MutationStatus,
}

/// Result of draining the pending queue
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub replayed: usize,
    pub remaining: usize,
    /// Error that stopped the drain, if any. The failed operation and
    /// everything after it stay queued.
    pub halted: Option<String>,
}

/// Completing a recurring task may spawn a successor
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub completed: Task,
    pub successor: Option<Task>,
}

type EntityKey = (EntityKind, String);

/// Orchestrates the cache, the queue and the gateway
pub struct SyncCoordinator<G: RemoteGateway> {
    gateway: Arc<G>,
    cache: LocalCache,
    queue: PendingQueue,
    /// Per-entity mutation locks
    locks: Mutex<HashMap<EntityKey, Arc<Mutex<()>>>>,
    /// Pre-delete snapshots kept around for undo
    retained: Mutex<HashMap<EntityKey, (Value, Instant)>>,
    undo_window: Duration,
}

impl<G: RemoteGateway> SyncCoordinator<G> {
    pub fn new(gateway: Arc<G>, cache: LocalCache, queue: PendingQueue, config: &ClientConfig) -> Self {
        Self {
            gateway,
            cache,
            queue,
            locks: Mutex::new(HashMap::new()),
            retained: Mutex::new(HashMap::new()),
            undo_window: Duration::from_secs(config.undo_window_secs),
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    async fn entity_lock(&self, kind: EntityKind, id: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().await;
        map.entry((kind, id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a per-entity lock once nothing else holds it, so the map does
    /// not grow with every id ever mutated. Waiters hold their own clone,
    /// which keeps the strong count above one.
    async fn prune_entity_lock(&self, kind: EntityKind, id: &str) {
        let mut map = self.locks.lock().await;
        let key = (kind, id.to_string());
        if map.get(&key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            map.remove(&key);
        }
    }

    #[cfg(test)]
    pub(crate) async fn entity_lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create an entity. A tentative UUID is assigned and cached before the
    /// network is touched; on confirmation every reference is rewritten to
    /// the server's id.
    pub async fn create<E: Entity>(&self, mut entity: E) -> SyncResult<MutationResult<E>> {
        let tentative = Uuid::new_v4().to_string();
        entity.set_id(tentative.clone());

        let lock = self.entity_lock(E::KIND, &tentative).await;
        let guard = lock.lock().await;

        let result = async {
            self.cache.put(&entity).await?;

            let payload = to_value(&entity)?;
            match self.gateway.create(E::KIND, &payload).await {
                Ok(authoritative) => {
                    let confirmed: E = from_value(authoritative)?;
                    self.promote(E::KIND, &tentative, &confirmed).await?;
                    Ok(MutationResult { entity: confirmed, status: MutationStatus::Confirmed })
                }
                Err(GatewayError::Network(reason)) => {
                    log::warn!("create {} {} unreachable ({}), queued", E::KIND.as_str(), tentative, reason);
                    self.queue.enqueue(&PendingOperation::new(
                        OpKind::Create,
                        E::KIND,
                        &tentative,
                        payload,
                    ))?;
                    Ok(MutationResult { entity, status: MutationStatus::Queued })
                }
                Err(e) => Err(e.into()),
            }
        }
        .await;

        drop(guard);
        drop(lock);
        self.prune_entity_lock(E::KIND, &tentative).await;
        result
    }

    /// Apply a typed partial update. The patched snapshot is cached before
    /// the network is touched; the wire payload is the sparse patch itself.
    pub async fn update<E, P>(&self, id: &str, patch: P) -> SyncResult<MutationResult<E>>
    where
        E: Entity,
        P: Patch<E>,
    {
        let lock = self.entity_lock(E::KIND, id).await;
        let guard = lock.lock().await;

        let result = async {
            let mut entity: E = self
                .cache
                .get(id)
                .await?
                .ok_or_else(|| SyncError::NotFound(format!("{} {}", E::KIND.as_str(), id)))?;

            patch.apply(&mut entity);
            entity.touch();
            self.cache.put(&entity).await?;

            let wire = to_value(&patch)?;
            match self.gateway.update(E::KIND, id, &wire).await {
                Ok(authoritative) => {
                    let confirmed: E = from_value(authoritative)?;
                    self.cache.put(&confirmed).await?;
                    Ok(MutationResult { entity: confirmed, status: MutationStatus::Confirmed })
                }
                Err(GatewayError::Network(reason)) => {
                    log::warn!("update {} {} unreachable ({}), queued", E::KIND.as_str(), id, reason);
                    self.queue.enqueue(&PendingOperation::new(
                        OpKind::Update,
                        E::KIND,
                        id,
                        to_value(&entity)?,
                    ))?;
                    Ok(MutationResult { entity, status: MutationStatus::Queued })
                }
                Err(e) => Err(e.into()),
            }
        }
        .await;

        drop(guard);
        drop(lock);
        self.prune_entity_lock(E::KIND, id).await;
        result
    }

    /// Delete an entity, retaining its snapshot for `restore` within the
    /// undo window.
    pub async fn delete<E: Entity>(&self, id: &str) -> SyncResult<MutationStatus> {
        let lock = self.entity_lock(E::KIND, id).await;
        let guard = lock.lock().await;

        let result = async {
            if let Some(snapshot) = self.cache.get_raw(E::KIND, id).await? {
                let mut retained = self.retained.lock().await;
                retained.retain(|_, (_, at)| at.elapsed() <= self.undo_window);
                retained.insert((E::KIND, id.to_string()), (snapshot, Instant::now()));
            }
            self.cache.delete(E::KIND, id).await?;

            match self.gateway.delete(E::KIND, id).await {
                Ok(()) => Ok(MutationStatus::Confirmed),
                Err(GatewayError::Network(reason)) => {
                    log::warn!("delete {} {} unreachable ({}), queued", E::KIND.as_str(), id, reason);
                    self.queue.enqueue(&PendingOperation::new(
                        OpKind::Delete,
                        E::KIND,
                        id,
                        serde_json::json!({}),
                    ))?;
                    Ok(MutationStatus::Queued)
                }
                Err(e) => Err(e.into()),
            }
        }
        .await;

        drop(guard);
        drop(lock);
        self.prune_entity_lock(E::KIND, id).await;
        result
    }

    /// Undo a recent delete: the retained fields are re-created as a new
    /// entity with a fresh identifier.
    pub async fn restore<E: Entity>(&self, id: &str) -> SyncResult<MutationResult<E>> {
        let snapshot = {
            let mut retained = self.retained.lock().await;
            match retained.remove(&(E::KIND, id.to_string())) {
                Some((value, at)) if at.elapsed() <= self.undo_window => value,
                Some(_) | None => {
                    return Err(SyncError::UndoExpired(format!("{} {}", E::KIND.as_str(), id)))
                }
            }
        };

        let entity: E = from_value(snapshot)?;
        self.create(entity).await
    }

    /// Add tags to several contacts at once: optimistic set union on every
    /// target, then one batched call. On network failure each contact's
    /// full current state is queued as an update.
    pub async fn bulk_add_tags(
        &self,
        contact_ids: &[String],
        tags: &[String],
    ) -> SyncResult<MutationStatus> {
        use crate::models::Contact;

        let mut touched: Vec<Contact> = Vec::new();
        for id in contact_ids {
            let lock = self.entity_lock(EntityKind::Contacts, id).await;
            let guard = lock.lock().await;

            let result: SyncResult<Option<Contact>> = async {
                let Some(mut contact) = self.cache.get::<Contact>(id).await? else {
                    return Ok(None);
                };
                for tag in tags {
                    if !contact.tags.iter().any(|t| t == tag) {
                        contact.tags.push(tag.clone());
                    }
                }
                contact.touch();
                self.cache.put(&contact).await?;
                Ok(Some(contact))
            }
            .await;

            drop(guard);
            drop(lock);
            self.prune_entity_lock(EntityKind::Contacts, id).await;

            if let Some(contact) = result? {
                touched.push(contact);
            }
        }

        match self.gateway.bulk_add_tags(contact_ids, tags).await {
            Ok(updated) => {
                let contacts: Vec<Contact> = updated
                    .into_iter()
                    .map(from_value)
                    .collect::<SyncResult<_>>()?;
                self.cache.put_all(&contacts).await?;
                Ok(MutationStatus::Confirmed)
            }
            Err(GatewayError::Network(reason)) => {
                log::warn!("bulk tag add unreachable ({}), queueing per-contact updates", reason);
                for contact in &touched {
                    self.queue.enqueue(&PendingOperation::new(
                        OpKind::Update,
                        EntityKind::Contacts,
                        &contact.id,
                        to_value(contact)?,
                    ))?;
                }
                Ok(MutationStatus::Queued)
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Replay
    // =========================================================================

    /// Drain the pending queue, oldest first. Each success removes its
    /// operation; the first failure halts the drain and leaves the failed
    /// operation and everything after it queued, preserving per-entity
    /// create-before-update order.
    pub async fn replay(&self) -> SyncResult<ReplayOutcome> {
        let mut replayed = 0usize;
        let mut halted = None;

        for op in self.queue.all()? {
            let lock = self.entity_lock(op.entity_kind, &op.entity_id).await;
            let guard = lock.lock().await;

            let result = match op.op_kind {
                OpKind::Create => self.replay_create(&op).await,
                OpKind::Update => self.replay_update(&op).await,
                OpKind::Delete => self.replay_delete(&op).await,
            };

            drop(guard);
            drop(lock);
            self.prune_entity_lock(op.entity_kind, &op.entity_id).await;

            match result {
                Ok(()) => {
                    if let Some(row_id) = op.id {
                        self.queue.remove(row_id)?;
                    }
                    replayed += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Replay halted on {} {} {}: {}",
                        op.op_kind.as_str(),
                        op.entity_kind.as_str(),
                        op.entity_id,
                        e
                    );
                    halted = Some(e.to_string());
                    break;
                }
            }
        }

        let remaining = self.queue.len()? as usize;
        if replayed > 0 || remaining > 0 {
            log::info!("Replay finished: {} replayed, {} remaining", replayed, remaining);
        }
        Ok(ReplayOutcome { replayed, remaining, halted })
    }

    async fn replay_create(&self, op: &PendingOperation) -> SyncResult<()> {
        let authoritative = self.gateway.create(op.entity_kind, &op.payload).await?;
        let new_id = authoritative
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::Serialization("create response without id".to_string()))?
            .to_string();

        self.cache
            .put_raw(op.entity_kind, &new_id, authoritative)
            .await?;
        if new_id != op.entity_id {
            self.cache.delete(op.entity_kind, &op.entity_id).await?;
            self.queue
                .rewrite_entity_id(op.entity_kind, &op.entity_id, &new_id)?;
        }
        Ok(())
    }

    async fn replay_update(&self, op: &PendingOperation) -> SyncResult<()> {
        let authoritative = self
            .gateway
            .update(op.entity_kind, &op.entity_id, &op.payload)
            .await?;
        self.cache
            .put_raw(op.entity_kind, &op.entity_id, authoritative)
            .await?;
        Ok(())
    }

    async fn replay_delete(&self, op: &PendingOperation) -> SyncResult<()> {
        self.gateway.delete(op.entity_kind, &op.entity_id).await?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch the full collection from the server and cache it. When the
    /// network is unreachable, serve the cached snapshots instead.
    pub async fn refresh<E: Entity>(&self) -> SyncResult<Vec<E>> {
        match self.gateway.list(E::KIND).await {
            Ok(values) => {
                let entities: Vec<E> = values
                    .into_iter()
                    .map(from_value)
                    .collect::<SyncResult<_>>()?;
                self.cache.put_all(&entities).await?;
                Ok(entities)
            }
            Err(GatewayError::Network(reason)) => {
                log::info!(
                    "list {} unreachable ({}), serving cached snapshots",
                    E::KIND.as_str(),
                    reason
                );
                Ok(self.cache.all().await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch one entity, falling back to the cache when offline
    pub async fn get<E: Entity>(&self, id: &str) -> SyncResult<Option<E>> {
        match self.gateway.fetch(E::KIND, id).await {
            Ok(value) => {
                let entity: E = from_value(value)?;
                self.cache.put(&entity).await?;
                Ok(Some(entity))
            }
            Err(GatewayError::Network(reason)) => {
                log::info!("fetch {} {} unreachable ({}), serving cache", E::KIND.as_str(), id, reason);
                Ok(self.cache.get(id).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Mark a task completed. If it recurs and carries a due date, a
    /// successor task is created with the advanced due date, linked back
    /// through `parent_task_id`. No successor is created past the
    /// recurrence end date.
    pub async fn complete_task(&self, id: &str) -> SyncResult<TaskCompletion> {
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            completed_at: Some(chrono::Utc::now()),
            ..Default::default()
        };
        let completed = self.update::<Task, _>(id, patch).await?.entity;

        let successor = match (completed.recurrence, completed.due_date) {
            (Recurrence::None, _) | (_, None) => None,
            (recurrence, Some(due)) => {
                let next = advance_due_date(due, recurrence);
                let past_end = completed
                    .recurrence_end_date
                    .is_some_and(|end| next > end);
                if past_end {
                    log::debug!("Task {} recurrence ended, no successor", completed.id);
                    None
                } else {
                    let mut next_task = completed.clone();
                    next_task.id = String::new();
                    next_task.status = TaskStatus::Pending;
                    next_task.completed_at = None;
                    next_task.due_date = Some(next);
                    next_task.parent_task_id = Some(completed.id.clone());
                    Some(self.create(next_task).await?.entity)
                }
            }
        };

        Ok(TaskCompletion { completed, successor })
    }

    // =========================================================================
    // Pass-through (directly awaited, never queued)
    // =========================================================================

    pub async fn search(&self, kind: EntityKind, query: &str) -> SyncResult<Vec<Value>> {
        Ok(self.gateway.search(kind, query).await?)
    }

    pub async fn export(
        &self,
        kind: EntityKind,
        format: crate::gateway::ExchangeFormat,
    ) -> SyncResult<String> {
        Ok(self.gateway.export(kind, format).await?)
    }

    pub async fn import(
        &self,
        kind: EntityKind,
        format: crate::gateway::ExchangeFormat,
        body: String,
    ) -> SyncResult<Value> {
        Ok(self.gateway.import(kind, format, body).await?)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Replace a tentative snapshot with the confirmed one and rewrite the
    /// tentative id everywhere it may appear.
    async fn promote<E: Entity>(&self, kind: EntityKind, tentative: &str, confirmed: &E) -> SyncResult<()> {
        self.cache.put(confirmed).await?;
        if confirmed.id() != tentative {
            self.cache.delete(kind, tentative).await?;
            self.queue.rewrite_entity_id(kind, tentative, confirmed.id())?;
        }
        Ok(())
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> SyncResult<Value> {
    serde_json::to_value(value).map_err(|e| SyncError::Serialization(e.to_string()))
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> SyncResult<T> {
    serde_json::from_value(value).map_err(|e| SyncError::Serialization(e.to_string()))
}
