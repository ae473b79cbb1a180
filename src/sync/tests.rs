//! End-to-end scenarios for the sync pipeline against a scriptable
//! in-memory gateway (toggle offline, force rejections).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::LocalCache;
use crate::db::Database;
use crate::gateway::{ExchangeFormat, GatewayError, GatewayResult, RemoteGateway};
use crate::models::{ClientConfig, Contact, ContactPatch, EntityKind, Recurrence, Task, TaskStatus};
use crate::sync::coordinator::{MutationStatus, SyncCoordinator, SyncError};
use crate::sync::queue::{OpKind, PendingQueue};

// ============================================================================
// Mock gateway
// ============================================================================

#[derive(Default)]
struct MockGateway {
    offline: AtomicBool,
    next_id: AtomicU64,
    /// Simulated round-trip latency, milliseconds
    delay_ms: AtomicU64,
    store: Mutex<HashMap<(EntityKind, String), Value>>,
    reject_with: Mutex<Option<(u16, String)>>,
}

impl MockGateway {
    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    async fn reject_with(&self, status: u16, message: &str) {
        *self.reject_with.lock().await = Some((status, message.to_string()));
    }

    async fn accept_again(&self) {
        *self.reject_with.lock().await = None;
    }

    async fn gate(&self) -> GatewayResult<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("connection refused".to_string()));
        }
        if let Some((status, message)) = self.reject_with.lock().await.clone() {
            return Err(GatewayError::Rejected { status, message });
        }
        Ok(())
    }

    async fn stored(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.store.lock().await.get(&(kind, id.to_string())).cloned()
    }

    async fn count(&self, kind: EntityKind) -> usize {
        self.store
            .lock()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn list(&self, kind: EntityKind) -> GatewayResult<Vec<Value>> {
        self.gate().await?;
        Ok(self
            .store
            .lock()
            .await
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn fetch(&self, kind: EntityKind, id: &str) -> GatewayResult<Value> {
        self.gate().await?;
        self.stored(kind, id).await.ok_or(GatewayError::Rejected {
            status: 404,
            message: "Not found".to_string(),
        })
    }

    async fn create(&self, kind: EntityKind, payload: &Value) -> GatewayResult<Value> {
        self.gate().await?;
        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut record = payload.clone();
        if let Some(obj) = record.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.clone()));
        }
        self.store.lock().await.insert((kind, id), record.clone());
        Ok(record)
    }

    async fn update(&self, kind: EntityKind, id: &str, payload: &Value) -> GatewayResult<Value> {
        self.gate().await?;
        let mut store = self.store.lock().await;
        let record = store
            .get_mut(&(kind, id.to_string()))
            .ok_or(GatewayError::Rejected {
                status: 404,
                message: "Not found".to_string(),
            })?;
        if let (Some(target), Some(patch)) = (record.as_object_mut(), payload.as_object()) {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
            target.insert("id".to_string(), Value::String(id.to_string()));
        }
        Ok(record.clone())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> GatewayResult<()> {
        self.gate().await?;
        self.store.lock().await.remove(&(kind, id.to_string()));
        Ok(())
    }

    async fn bulk_add_tags(
        &self,
        contact_ids: &[String],
        tags: &[String],
    ) -> GatewayResult<Vec<Value>> {
        self.gate().await?;
        let mut store = self.store.lock().await;
        let mut updated = Vec::new();
        for id in contact_ids {
            if let Some(record) = store.get_mut(&(EntityKind::Contacts, id.clone())) {
                if let Some(existing) = record.get_mut("tags").and_then(Value::as_array_mut) {
                    for tag in tags {
                        let tag_value = Value::String(tag.clone());
                        if !existing.contains(&tag_value) {
                            existing.push(tag_value);
                        }
                    }
                }
                updated.push(record.clone());
            }
        }
        Ok(updated)
    }

    async fn search(&self, kind: EntityKind, query: &str) -> GatewayResult<Vec<Value>> {
        self.gate().await?;
        let needle = query.to_lowercase();
        Ok(self
            .store
            .lock()
            .await
            .iter()
            .filter(|((k, _), v)| {
                *k == kind
                    && v.get("name")
                        .and_then(Value::as_str)
                        .map(|n| n.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn export(&self, kind: EntityKind, _format: ExchangeFormat) -> GatewayResult<String> {
        self.gate().await?;
        Ok(format!("{} records", self.count(kind).await))
    }

    async fn import(
        &self,
        _kind: EntityKind,
        _format: ExchangeFormat,
        _body: String,
    ) -> GatewayResult<Value> {
        self.gate().await?;
        Ok(json!({ "imported": 0 }))
    }
}

// ============================================================================
// Harness
// ============================================================================

fn harness() -> (Arc<MockGateway>, SyncCoordinator<MockGateway>) {
    harness_with_undo_window(30)
}

fn harness_with_undo_window(secs: u64) -> (Arc<MockGateway>, SyncCoordinator<MockGateway>) {
    let db = Arc::new(Database::in_memory().expect("test db"));
    let cache = LocalCache::new(db.clone());
    let queue = PendingQueue::new(db);
    let gateway = Arc::new(MockGateway::default());
    let config = ClientConfig {
        undo_window_secs: secs,
        ..Default::default()
    };
    let coordinator = SyncCoordinator::new(gateway.clone(), cache, queue, &config);
    (gateway, coordinator)
}

fn contact(name: &str) -> Contact {
    Contact::new("u1", name)
}

// ============================================================================
// Create / confirm / queue
// ============================================================================

#[tokio::test]
async fn test_online_create_confirms_with_server_id() {
    let (gateway, coordinator) = harness();

    let result = coordinator.create(contact("Jane")).await.unwrap();
    assert_eq!(result.status, MutationStatus::Confirmed);
    assert!(result.entity.id.starts_with("srv-"));

    assert!(gateway
        .stored(EntityKind::Contacts, &result.entity.id)
        .await
        .is_some());
    assert_eq!(coordinator.cache().count(EntityKind::Contacts).unwrap(), 1);
}

#[tokio::test]
async fn test_offline_create_is_visible_under_tentative_id() {
    let (gateway, coordinator) = harness();
    gateway.set_offline(true);

    let result = coordinator.create(contact("Jane")).await.unwrap();
    assert_eq!(result.status, MutationStatus::Queued);

    // Immediately readable under its tentative id.
    let cached: Option<Contact> = coordinator.cache().get(&result.entity.id).await.unwrap();
    assert_eq!(cached.unwrap().name, "Jane");
    assert_eq!(coordinator.queue().len().unwrap(), 1);
}

#[tokio::test]
async fn test_replay_promotes_tentative_id_to_authoritative() {
    let (gateway, coordinator) = harness();
    gateway.set_offline(true);

    let tentative_id = coordinator.create(contact("Jane")).await.unwrap().entity.id;

    gateway.set_offline(false);
    let outcome = coordinator.replay().await.unwrap();
    assert_eq!(outcome.replayed, 1);
    assert_eq!(outcome.remaining, 0);

    // Exactly one snapshot, under the authoritative id, none under the
    // tentative one.
    assert_eq!(coordinator.cache().count(EntityKind::Contacts).unwrap(), 1);
    let gone: Option<Contact> = coordinator.cache().get(&tentative_id).await.unwrap();
    assert!(gone.is_none());

    let all: Vec<Contact> = coordinator.cache().all().await.unwrap();
    assert!(all[0].id.starts_with("srv-"));
    assert!(gateway
        .stored(EntityKind::Contacts, &all[0].id)
        .await
        .is_some());
}

#[tokio::test]
async fn test_replay_preserves_enqueue_order() {
    let (gateway, coordinator) = harness();
    gateway.set_offline(true);

    let tentative_id = coordinator.create(contact("Jane")).await.unwrap().entity.id;
    let patch = ContactPatch {
        name: Some("Jane Doe".to_string()),
        ..Default::default()
    };
    coordinator
        .update::<Contact, _>(&tentative_id, patch)
        .await
        .unwrap();

    let kinds: Vec<OpKind> = coordinator
        .queue()
        .all()
        .unwrap()
        .iter()
        .map(|o| o.op_kind)
        .collect();
    assert_eq!(kinds, vec![OpKind::Create, OpKind::Update]);

    gateway.set_offline(false);
    let outcome = coordinator.replay().await.unwrap();
    assert_eq!(outcome.replayed, 2);

    // The update replayed against the rewritten server id.
    assert_eq!(gateway.count(EntityKind::Contacts).await, 1);
    let all: Vec<Contact> = coordinator.cache().all().await.unwrap();
    assert_eq!(all[0].name, "Jane Doe");
    let remote = gateway
        .stored(EntityKind::Contacts, &all[0].id)
        .await
        .unwrap();
    assert_eq!(remote["name"], "Jane Doe");
}

#[tokio::test]
async fn test_replay_halts_on_first_failure() {
    let (gateway, coordinator) = harness();
    gateway.set_offline(true);

    coordinator.create(contact("Jane")).await.unwrap();
    coordinator.create(contact("John")).await.unwrap();

    gateway.set_offline(false);
    gateway.reject_with(500, "server exploded").await;

    let outcome = coordinator.replay().await.unwrap();
    assert_eq!(outcome.replayed, 0);
    assert_eq!(outcome.remaining, 2);
    assert!(outcome.halted.is_some());

    gateway.accept_again().await;
    let outcome = coordinator.replay().await.unwrap();
    assert_eq!(outcome.replayed, 2);
    assert_eq!(outcome.remaining, 0);
}

#[tokio::test]
async fn test_rejected_update_surfaces_message_and_keeps_optimistic_state() {
    let (gateway, coordinator) = harness();

    let id = coordinator.create(contact("Jane")).await.unwrap().entity.id;

    gateway.reject_with(400, "Name too long").await;
    let patch = ContactPatch {
        name: Some("Jane Doe".to_string()),
        ..Default::default()
    };
    let err = coordinator
        .update::<Contact, _>(&id, patch)
        .await
        .unwrap_err();

    match err {
        SyncError::Gateway(GatewayError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Name too long");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }

    // No rollback: the optimistic snapshot stays.
    let cached: Contact = coordinator.cache().get(&id).await.unwrap().unwrap();
    assert_eq!(cached.name, "Jane Doe");
    // And nothing was queued.
    assert_eq!(coordinator.queue().len().unwrap(), 0);
}

// ============================================================================
// Delete / restore
// ============================================================================

#[tokio::test]
async fn test_delete_then_restore_yields_new_id_with_old_fields() {
    let (_gateway, coordinator) = harness();

    let mut original = contact("Jane");
    original.company = Some("Acme".to_string());
    let old_id = coordinator.create(original).await.unwrap().entity.id;

    let status = coordinator.delete::<Contact>(&old_id).await.unwrap();
    assert_eq!(status, MutationStatus::Confirmed);
    assert_eq!(coordinator.cache().count(EntityKind::Contacts).unwrap(), 0);

    let restored = coordinator.restore::<Contact>(&old_id).await.unwrap().entity;
    assert_ne!(restored.id, old_id);
    assert_eq!(restored.name, "Jane");
    assert_eq!(restored.company.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn test_restore_outside_undo_window_fails() {
    let (_gateway, coordinator) = harness_with_undo_window(0);

    let id = coordinator.create(contact("Jane")).await.unwrap().entity.id;
    coordinator.delete::<Contact>(&id).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let err = coordinator.restore::<Contact>(&id).await.unwrap_err();
    assert!(matches!(err, SyncError::UndoExpired(_)));
}

#[tokio::test]
async fn test_offline_delete_is_queued() {
    let (gateway, coordinator) = harness();

    let id = coordinator.create(contact("Jane")).await.unwrap().entity.id;

    gateway.set_offline(true);
    let status = coordinator.delete::<Contact>(&id).await.unwrap();
    assert_eq!(status, MutationStatus::Queued);

    gateway.set_offline(false);
    coordinator.replay().await.unwrap();
    assert!(gateway.stored(EntityKind::Contacts, &id).await.is_none());
    assert_eq!(coordinator.queue().len().unwrap(), 0);
}

// ============================================================================
// Bulk tags
// ============================================================================

#[tokio::test]
async fn test_bulk_add_tags_is_a_set_union() {
    let (gateway, coordinator) = harness();

    let mut jane = contact("Jane");
    jane.tags = vec!["friend".to_string()];
    let jane_id = coordinator.create(jane).await.unwrap().entity.id;
    let john_id = coordinator.create(contact("John")).await.unwrap().entity.id;

    let status = coordinator
        .bulk_add_tags(
            &[jane_id.clone(), john_id.clone()],
            &["friend".to_string(), "work".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(status, MutationStatus::Confirmed);

    let jane: Contact = coordinator.cache().get(&jane_id).await.unwrap().unwrap();
    assert_eq!(jane.tags, vec!["friend", "work"]);
    let john: Contact = coordinator.cache().get(&john_id).await.unwrap().unwrap();
    assert_eq!(john.tags, vec!["friend", "work"]);

    let remote = gateway
        .stored(EntityKind::Contacts, &jane_id)
        .await
        .unwrap();
    assert_eq!(remote["tags"], json!(["friend", "work"]));
}

#[tokio::test]
async fn test_offline_bulk_add_tags_queues_one_update_per_contact() {
    let (gateway, coordinator) = harness();

    let jane_id = coordinator.create(contact("Jane")).await.unwrap().entity.id;
    let john_id = coordinator.create(contact("John")).await.unwrap().entity.id;

    gateway.set_offline(true);
    let status = coordinator
        .bulk_add_tags(&[jane_id.clone(), john_id], &["work".to_string()])
        .await
        .unwrap();
    assert_eq!(status, MutationStatus::Queued);
    assert_eq!(coordinator.queue().len().unwrap(), 2);

    gateway.set_offline(false);
    coordinator.replay().await.unwrap();

    let remote = gateway
        .stored(EntityKind::Contacts, &jane_id)
        .await
        .unwrap();
    assert_eq!(remote["tags"], json!(["work"]));
}

// ============================================================================
// Per-entity serialization
// ============================================================================

#[tokio::test]
async fn test_mutations_against_one_entity_apply_in_call_order() {
    let (gateway, coordinator) = harness();
    let coordinator = Arc::new(coordinator);

    let id = coordinator.create(contact("Jane")).await.unwrap().entity.id;

    // Make the first update slow; without per-id serialization the second
    // update would commit first and be overwritten by the stale response.
    gateway.set_delay_ms(50);

    let slow = {
        let coordinator = coordinator.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let patch = ContactPatch {
                name: Some("Jane First".to_string()),
                ..Default::default()
            };
            coordinator.update::<Contact, _>(&id, patch).await
        })
    };
    // Let the first update take the entity lock before racing the second.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let fast = {
        let coordinator = coordinator.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let patch = ContactPatch {
                name: Some("Jane Second".to_string()),
                ..Default::default()
            };
            coordinator.update::<Contact, _>(&id, patch).await
        })
    };

    slow.await.unwrap().unwrap();
    fast.await.unwrap().unwrap();

    // Call order wins, locally and remotely.
    let cached: Contact = coordinator.cache().get(&id).await.unwrap().unwrap();
    assert_eq!(cached.name, "Jane Second");
    let remote = gateway.stored(EntityKind::Contacts, &id).await.unwrap();
    assert_eq!(remote["name"], "Jane Second");
}

#[tokio::test]
async fn test_entity_locks_are_pruned_after_use() {
    let (gateway, coordinator) = harness();

    let jane_id = coordinator.create(contact("Jane")).await.unwrap().entity.id;
    let john_id = coordinator.create(contact("John")).await.unwrap().entity.id;

    let patch = ContactPatch {
        name: Some("Jane Doe".to_string()),
        ..Default::default()
    };
    coordinator
        .update::<Contact, _>(&jane_id, patch)
        .await
        .unwrap();
    coordinator.delete::<Contact>(&john_id).await.unwrap();

    // Offline mutations and replay release their locks too.
    gateway.set_offline(true);
    coordinator.create(contact("Jim")).await.unwrap();
    gateway.set_offline(false);
    coordinator.replay().await.unwrap();

    assert_eq!(coordinator.entity_lock_count().await, 0);
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_refresh_falls_back_to_cache_when_offline() {
    let (gateway, coordinator) = harness();

    coordinator.create(contact("Jane")).await.unwrap();
    coordinator.create(contact("John")).await.unwrap();

    gateway.set_offline(true);
    let contacts: Vec<Contact> = coordinator.refresh().await.unwrap();
    assert_eq!(contacts.len(), 2);
}

#[tokio::test]
async fn test_get_falls_back_to_cache_when_offline() {
    let (gateway, coordinator) = harness();

    let id = coordinator.create(contact("Jane")).await.unwrap().entity.id;

    gateway.set_offline(true);
    let cached: Option<Contact> = coordinator.get(&id).await.unwrap();
    assert_eq!(cached.unwrap().name, "Jane");
}

// ============================================================================
// Recurring tasks
// ============================================================================

#[tokio::test]
async fn test_completing_a_recurring_task_spawns_a_successor() {
    let (_gateway, coordinator) = harness();

    let mut task = Task::new("u1", "Water plants");
    task.due_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 31);
    task.recurrence = Recurrence::Monthly;
    let id = coordinator.create(task).await.unwrap().entity.id;

    let completion = coordinator.complete_task(&id).await.unwrap();
    assert_eq!(completion.completed.status, TaskStatus::Completed);
    assert!(completion.completed.completed_at.is_some());

    let successor = completion.successor.unwrap();
    assert_ne!(successor.id, id);
    assert_eq!(successor.status, TaskStatus::Pending);
    assert_eq!(successor.parent_task_id.as_deref(), Some(id.as_str()));
    // Month-end clamp.
    assert_eq!(
        successor.due_date,
        chrono::NaiveDate::from_ymd_opt(2024, 2, 29)
    );
}

#[tokio::test]
async fn test_no_successor_past_the_recurrence_end_date() {
    let (_gateway, coordinator) = harness();

    let mut task = Task::new("u1", "Quarterly review");
    task.due_date = chrono::NaiveDate::from_ymd_opt(2024, 11, 1);
    task.recurrence = Recurrence::Monthly;
    task.recurrence_end_date = chrono::NaiveDate::from_ymd_opt(2024, 11, 30);
    let id = coordinator.create(task).await.unwrap().entity.id;

    let completion = coordinator.complete_task(&id).await.unwrap();
    assert!(completion.successor.is_none());
}

#[tokio::test]
async fn test_non_recurring_task_completes_without_successor() {
    let (_gateway, coordinator) = harness();

    let mut task = Task::new("u1", "One-off errand");
    task.due_date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1);
    let id = coordinator.create(task).await.unwrap().entity.id;

    let completion = coordinator.complete_task(&id).await.unwrap();
    assert_eq!(completion.completed.status, TaskStatus::Completed);
    assert!(completion.successor.is_none());
}
