//! Synchronization core
//!
//! `reconcile` plans, `policies` decide, `queue` serializes, `engine`
//! executes.

pub mod engine;
pub mod policies;
pub mod queue;
pub mod reconcile;

pub use engine::SyncEngine;
pub use queue::{QueueStatus, SyncQueue, SyncTask, TaskExecutor, TaskKind};
pub use reconcile::{apply_to_snapshot, resolve, resolve_mirror, ReconcilePolicy};
