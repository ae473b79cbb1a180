//! Local cache module - durable entity snapshot store
//!
//! Persists one snapshot per (entity kind, id) in SQLite so the client stays
//! usable offline, with an in-memory moka layer in front for hot reads:
//! - LRU eviction with TTL/TTI expiration
//! - Thread-safe async operations
//! - Hit/miss statistics
//!
//! `put` overwrites unconditionally: the caller decides what is
//! authoritative. Entries leave the store only through explicit `delete`.

use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{Database, DbError, DbResult};
use crate::models::{Entity, EntityKind};

/// Cache configuration for the in-memory read layer
pub struct CacheConfig {
    /// Maximum number of snapshots to keep in memory
    pub max_capacity: u64,

    /// Time-to-live for in-memory entries (seconds)
    pub ttl_secs: u64,

    /// Time-to-idle for in-memory entries (seconds)
    pub tti_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 2000,
            ttl_secs: 1800,
            tti_secs: 600,
        }
    }
}

/// Durable (kind, id)-keyed snapshot store with a moka front cache
#[derive(Clone)]
pub struct LocalCache {
    db: Arc<Database>,
    hot: Arc<Cache<(EntityKind, String), Value>>,
    hits: Arc<std::sync::atomic::AtomicU64>,
    misses: Arc<std::sync::atomic::AtomicU64>,
}

impl LocalCache {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_config(db, CacheConfig::default())
    }

    pub fn with_config(db: Arc<Database>, config: CacheConfig) -> Self {
        let hot = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .time_to_idle(Duration::from_secs(config.tti_secs))
            .build();

        Self {
            db,
            hot: Arc::new(hot),
            hits: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            misses: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    /// Get a typed snapshot
    pub async fn get<E: Entity>(&self, id: &str) -> DbResult<Option<E>> {
        match self.get_raw(E::KIND, id).await? {
            Some(value) => {
                let entity = serde_json::from_value(value)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Get a raw JSON snapshot (used by replay, where the kind is dynamic)
    pub async fn get_raw(&self, kind: EntityKind, id: &str) -> DbResult<Option<Value>> {
        let key = (kind, id.to_string());
        if let Some(value) = self.hot.get(&key).await {
            self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Ok(Some(value));
        }
        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let rows = self.db.query(
            "SELECT snapshot FROM entity_cache WHERE entity_kind = ?1 AND entity_id = ?2",
            rusqlite::params![kind.as_str(), id],
            |row| row.get::<_, String>(0),
        )?;

        match rows.into_iter().next() {
            Some(json) => {
                let value: Value = serde_json::from_str(&json)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                self.hot.insert(key, value.clone()).await;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Store a typed snapshot, overwriting any previous one
    pub async fn put<E: Entity>(&self, entity: &E) -> DbResult<()> {
        let value =
            serde_json::to_value(entity).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.put_raw(E::KIND, entity.id(), value).await
    }

    /// Store a raw JSON snapshot under (kind, id)
    pub async fn put_raw(&self, kind: EntityKind, id: &str, value: Value) -> DbResult<()> {
        let json =
            serde_json::to_string(&value).map_err(|e| DbError::Serialization(e.to_string()))?;

        self.db.execute(
            r#"
            INSERT INTO entity_cache (entity_kind, entity_id, snapshot, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(entity_kind, entity_id) DO UPDATE SET
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![kind.as_str(), id, json, chrono::Utc::now().to_rfc3339()],
        )?;

        self.hot.insert((kind, id.to_string()), value).await;
        Ok(())
    }

    /// Store a batch of snapshots in one transaction
    pub async fn put_all<E: Entity>(&self, entities: &[E]) -> DbResult<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO entity_cache (entity_kind, entity_id, snapshot, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(entity_kind, entity_id) DO UPDATE SET
                    snapshot = excluded.snapshot,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for entity in entities {
                let json = serde_json::to_string(entity)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                stmt.execute(rusqlite::params![
                    E::KIND.as_str(),
                    entity.id(),
                    json,
                    now
                ])?;
            }
        }
        tx.commit()?;

        for entity in entities {
            let value = serde_json::to_value(entity)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            self.hot.insert((E::KIND, entity.id().to_string()), value).await;
        }
        Ok(())
    }

    /// Remove a snapshot
    pub async fn delete(&self, kind: EntityKind, id: &str) -> DbResult<()> {
        self.db.execute(
            "DELETE FROM entity_cache WHERE entity_kind = ?1 AND entity_id = ?2",
            rusqlite::params![kind.as_str(), id],
        )?;
        self.hot.invalidate(&(kind, id.to_string())).await;
        Ok(())
    }

    /// All snapshots of one kind, most recently written first
    pub async fn all<E: Entity>(&self) -> DbResult<Vec<E>> {
        let rows = self.db.query(
            r#"
            SELECT snapshot FROM entity_cache
            WHERE entity_kind = ?1
            ORDER BY updated_at DESC, entity_id ASC
            "#,
            rusqlite::params![E::KIND.as_str()],
            |row| row.get::<_, String>(0),
        )?;

        rows.into_iter()
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| DbError::Serialization(e.to_string()))
            })
            .collect()
    }

    /// Number of cached snapshots of one kind
    pub fn count(&self, kind: EntityKind) -> DbResult<i64> {
        self.db.query_row(
            "SELECT COUNT(*) FROM entity_cache WHERE entity_kind = ?1",
            rusqlite::params![kind.as_str()],
            |row| row.get(0),
        )
    }

    /// Read-layer statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(std::sync::atomic::Ordering::Relaxed);
        let misses = self.misses.load(std::sync::atomic::Ordering::Relaxed);
        CacheStats { hits, misses }
    }
}

/// Hit/miss counters for the in-memory layer
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}
