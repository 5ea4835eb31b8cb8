//! omtp-sync - OMTP visual voicemail synchronization engine
//!
//! Decodes SMS-carried OMTP protocol messages, reconciles local, remote
//! and mirror snapshots of voicemail and greeting records, and drives
//! synchronization through a serialized, retrying task queue. Storage,
//! transport and presentation stay behind injected collaborator traits.
//!
//! ## Module Organization
//!
//! - `protocol/`: wire-message parsing (SYNC and STATUS forms)
//! - `dispatch/`: routing of decoded messages to handling routines
//! - `sync/`: reconciliation, policies, task queue and engine
//! - `command/`: out-of-band session commands
//! - `store/`: collaborator traits for storage and sessions
//! - `events/`: the fire-and-forget notification bus
//! - `config/`: engine and persisted account configuration
//! - `types/`: records, actions and the error taxonomy

pub mod command;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod protocol;
pub mod service;
pub mod store;
pub mod sync;
pub mod types;

pub use command::{CommandError, ProtocolCommandClient};
pub use config::{AccountConfig, SyncConfig};
pub use dispatch::MessageDispatcher;
pub use events::{EventSink, GreetingsErrorKind, SyncEvent};
pub use protocol::{
    MessageParser, ProvisioningStatus, StatusMessage, SyncMessage, TriggerEvent, WireMessage,
};
pub use service::OmtpService;
pub use store::{
    AccountStore, MirrorStore, ProtocolSession, RecordStore, SessionProvider, StoreError,
    StoreProvider,
};
pub use sync::{QueueStatus, SyncEngine, SyncQueue, TaskExecutor, TaskKind};
pub use types::error::{AuthFailure, ParseError, SyncError};
pub use types::{
    Action, ActionKind, ActionPlan, GreetingKind, GreetingRecord, GreetingsUpdateType,
    SyncEntity, VoicemailRecord,
};
