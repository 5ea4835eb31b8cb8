//! Collaborator seams
//!
//! The engine consumes storage, the account configuration and the IMAP-like
//! session through these narrow traits. Concrete backends live with the
//! host; nothing in this crate opens a database or a socket.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AccountConfig;
use crate::types::error::SyncError;
use crate::types::{Action, GreetingRecord, SyncEntity, VoicemailRecord};

/// Failure applying or reading a record store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Backend(String),

    /// Apply is not all-or-nothing; a partial failure describes the subset
    /// that did not land.
    #[error("partial apply: {description}")]
    PartialApply { description: String },
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err.to_string())
    }
}

/// One store of reconcilable records (the local database, or the remote
/// mailbox viewed through a session).
#[async_trait]
pub trait RecordStore<E: SyncEntity>: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<E>, StoreError>;

    async fn apply(&self, actions: &[Action<E>]) -> Result<(), StoreError>;
}

/// Last-known-good snapshot of the remote store, used to detect local
/// deletions without re-fetching the server.
#[async_trait]
pub trait MirrorStore<E: SyncEntity>: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<E>, StoreError>;

    /// Replace the whole snapshot after a successful sync.
    async fn replace(&self, records: Vec<E>) -> Result<(), StoreError>;
}

/// Persistence for the subscriber account configuration.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn load(&self) -> Result<AccountConfig, StoreError>;

    async fn save(&self, config: &AccountConfig) -> Result<(), StoreError>;
}

/// An open IMAP-like session for out-of-band protocol commands.
#[async_trait]
pub trait ProtocolSession: Send {
    /// Send one request line, returning the server's response lines.
    async fn send_command(&mut self, line: &str) -> Result<Vec<String>, SyncError>;

    /// Gracefully close the session.
    async fn terminate(&mut self) -> Result<(), SyncError>;
}

/// Opens protocol sessions on demand.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ProtocolSession>, SyncError>;
}

/// Hands the engine the stores a reconciliation works against.
///
/// Injected at construction; no process-wide resolver exists.
pub trait StoreProvider: Send + Sync {
    fn local_voicemails(&self) -> Arc<dyn RecordStore<VoicemailRecord>>;

    fn remote_voicemails(&self) -> Arc<dyn RecordStore<VoicemailRecord>>;

    fn voicemail_mirror(&self) -> Arc<dyn MirrorStore<VoicemailRecord>>;

    fn local_greetings(&self) -> Arc<dyn RecordStore<GreetingRecord>>;

    fn remote_greetings(&self) -> Arc<dyn RecordStore<GreetingRecord>>;
}
