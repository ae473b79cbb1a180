//! # Rolo Sync
//!
//! Offline-first data synchronization core for the Rolo personal CRM client.
//!
//! The crate keeps a durable local cache of entity snapshots, applies every
//! mutation optimistically before the network is touched, queues mutations
//! made while unreachable, and replays them oldest-first once the server is
//! back. Derived state (duplicate detection, profile completeness, task
//! recurrence) is computed by pure functions over cached snapshots.

pub mod cache;
pub mod db;
pub mod derived;
pub mod gateway;
pub mod models;
pub mod sync;

pub use cache::{CacheConfig, CacheStats, LocalCache};
pub use db::{Database, DbError, DbResult};
pub use derived::{advance_due_date, find_duplicates, profile_completeness, Completeness};
pub use gateway::{
    AuthResponse, ExchangeFormat, GatewayError, GatewayResult, HttpGateway, LoginRequest,
    RegisterRequest, RemoteGateway,
};
pub use models::{
    CalendarEvent, ClientConfig, Contact, ContactGroup, ContactPatch, Entity, EntityKind,
    EventPatch, GroupPatch, Meeting, MeetingPatch, Patch, Recurrence, Tag, TagPatch, Task,
    TaskPatch, TaskPriority, TaskStatus,
};
pub use sync::{
    MutationResult, MutationStatus, OpKind, PendingOperation, PendingQueue, ReplayOutcome,
    SyncCoordinator, SyncError, SyncResult, TaskCompletion,
};
