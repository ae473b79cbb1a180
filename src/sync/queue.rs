//! Pending-operation queue - durable log of unconfirmed mutations
//!
//! When a mutation cannot reach the server (network down, timeout), its
//! full intended end-state is appended here and replayed later:
//! - SQLite-backed persistent queue, survives restarts
//! - Strict insertion order, oldest first
//! - No dedup or merge: payloads are complete snapshots, so replaying
//!   every queued operation in order converges on the intended state
//! - Queue status reporting (per-kind counts)

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::db::{Database, DbError};
use crate::models::EntityKind;

// ============================================================================
// Data Types
// ============================================================================

/// Kind of queued mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One queued mutation.
///
/// `payload` is the full intended end-state of the entity (empty object
/// for deletes), so operations never need merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: Option<i64>,
    pub op_kind: OpKind,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn new(
        op_kind: OpKind,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: None,
            op_kind,
            entity_kind,
            entity_id: entity_id.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: i64,
    pub creates: i64,
    pub updates: i64,
    pub deletes: i64,
}

// ============================================================================
// Errors
// ============================================================================

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Corrupt queue row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

// ============================================================================
// Queue
// ============================================================================

/// Durable FIFO of pending mutations
#[derive(Clone)]
pub struct PendingQueue {
    db: Arc<Database>,
}

impl PendingQueue {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append an operation; returns its queue row id
    pub fn enqueue(&self, op: &PendingOperation) -> QueueResult<i64> {
        let payload = op.payload.to_string();
        let row_id = self.db.insert(
            r#"
            INSERT INTO sync_queue (op_kind, entity_kind, entity_id, payload, enqueued_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                op.op_kind.as_str(),
                op.entity_kind.as_str(),
                op.entity_id,
                payload,
                op.enqueued_at.to_rfc3339(),
            ],
        )?;

        log::debug!(
            "Queued {} {} {} as row {}",
            op.op_kind.as_str(),
            op.entity_kind.as_str(),
            op.entity_id,
            row_id
        );
        Ok(row_id)
    }

    /// All pending operations in insertion order, oldest first
    pub fn all(&self) -> QueueResult<Vec<PendingOperation>> {
        let rows = self.db.query(
            r#"
            SELECT id, op_kind, entity_kind, entity_id, payload, enqueued_at
            FROM sync_queue
            ORDER BY id ASC
            "#,
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )?;

        rows.into_iter().map(parse_row).collect()
    }

    /// Remove one operation by its queue row id
    pub fn remove(&self, row_id: i64) -> QueueResult<()> {
        self.db
            .execute("DELETE FROM sync_queue WHERE id = ?1", params![row_id])?;
        Ok(())
    }

    /// Remove the oldest operation matching (kind, id, op_kind)
    pub fn remove_first(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        op_kind: OpKind,
    ) -> QueueResult<bool> {
        let affected = self.db.execute(
            r#"
            DELETE FROM sync_queue WHERE id = (
                SELECT id FROM sync_queue
                WHERE entity_kind = ?1 AND entity_id = ?2 AND op_kind = ?3
                ORDER BY id ASC LIMIT 1
            )
            "#,
            params![entity_kind.as_str(), entity_id, op_kind.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Rewrite every reference to a tentative id after a confirmed create.
    ///
    /// Updates both the entity_id column and the `id` field inside each
    /// payload, so later replays target the authoritative record.
    pub fn rewrite_entity_id(
        &self,
        entity_kind: EntityKind,
        old_id: &str,
        new_id: &str,
    ) -> QueueResult<usize> {
        let rows = self.db.query(
            r#"
            SELECT id, payload FROM sync_queue
            WHERE entity_kind = ?1 AND entity_id = ?2
            "#,
            params![entity_kind.as_str(), old_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut conn = self.db.get_conn().map_err(DbError::from)?;
        let tx = conn.transaction().map_err(DbError::from)?;
        for (row_id, payload) in &rows {
            let mut value: Value =
                serde_json::from_str(payload).map_err(|e| QueueError::CorruptRow {
                    id: *row_id,
                    reason: e.to_string(),
                })?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("id".to_string(), Value::String(new_id.to_string()));
            }
            tx.execute(
                "UPDATE sync_queue SET entity_id = ?1, payload = ?2 WHERE id = ?3",
                params![new_id, value.to_string(), row_id],
            )
            .map_err(DbError::from)?;
        }
        tx.commit().map_err(DbError::from)?;

        if !rows.is_empty() {
            log::info!(
                "Rewrote {} queued ops for {} {} -> {}",
                rows.len(),
                entity_kind.as_str(),
                old_id,
                new_id
            );
        }
        Ok(rows.len())
    }

    pub fn len(&self) -> QueueResult<i64> {
        Ok(self
            .db
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?)
    }

    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> QueueResult<QueueStats> {
        let rows = self.db.query(
            "SELECT op_kind, COUNT(*) FROM sync_queue GROUP BY op_kind",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut stats = QueueStats {
            total: 0,
            creates: 0,
            updates: 0,
            deletes: 0,
        };
        for (kind, count) in rows {
            stats.total += count;
            match kind.as_str() {
                "create" => stats.creates = count,
                "update" => stats.updates = count,
                "delete" => stats.deletes = count,
                _ => {}
            }
        }
        Ok(stats)
    }
}

fn parse_row(
    (id, op_kind, entity_kind, entity_id, payload, enqueued_at): (
        i64,
        String,
        String,
        String,
        String,
        String,
    ),
) -> QueueResult<PendingOperation> {
    let op_kind = OpKind::from_str(&op_kind).ok_or_else(|| QueueError::CorruptRow {
        id,
        reason: format!("unknown op kind '{}'", op_kind),
    })?;
    let entity_kind =
        EntityKind::from_str(&entity_kind).ok_or_else(|| QueueError::CorruptRow {
            id,
            reason: format!("unknown entity kind '{}'", entity_kind),
        })?;
    let payload: Value = serde_json::from_str(&payload).map_err(|e| QueueError::CorruptRow {
        id,
        reason: e.to_string(),
    })?;
    let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at)
        .map_err(|e| QueueError::CorruptRow {
            id,
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);

    Ok(PendingOperation {
        id: Some(id),
        op_kind,
        entity_kind,
        entity_id,
        payload,
        enqueued_at,
    })
}

// ============================================================================
// Tests
// ============================================================================
