//! Sync module - offline-first mutation pipeline
//!
//! Keeps the local snapshot store and the server converging without ever
//! rolling back user-visible state:
//! - Optimistic writes: the cache is updated before the network is touched
//! - Pending-operation queue for mutations made while unreachable
//! - Oldest-first replay that halts on the first failure
//! - Tentative UUIDs on create, rewritten once the server assigns an id

pub mod coordinator;
pub mod queue;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use coordinator::{
    MutationResult, MutationStatus, ReplayOutcome, SyncCoordinator, SyncError, SyncResult,
    TaskCompletion,
};
pub use queue::{OpKind, PendingOperation, PendingQueue, QueueError, QueueStats};
