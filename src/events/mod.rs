//! Notification bus
//!
//! Everything user-visible leaves the engine through here as a
//! fire-and-forget event; the engine itself never does UI work. Hosts
//! subscribe to the receiver half and render however they like.

use chrono::{DateTime, Utc};
use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::message::ProvisioningStatus;
use crate::types::error::AuthFailure;
use crate::types::GreetingsUpdateType;

/// Which side of a greetings sync failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GreetingsErrorKind {
    FetchFailed,
    UploadFailed,
}

/// Event emitted by the sync engine. At most one per triggering event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// Connectivity came back after a failure streak
    ConnectivityOk,
    ConnectivityFailed {
        cause: String,
    },
    AuthenticationFailed {
        reason: AuthFailure,
    },
    /// A voicemail arrived but its details were incomplete on the wire
    MessageWaiting {
        sender: Option<String>,
        duration_seconds: Option<u32>,
        timestamp: Option<DateTime<Utc>>,
    },
    StatusChanged {
        status: Option<ProvisioningStatus>,
        tui_number_changed: bool,
    },
    GreetingsUpdate {
        update_type: GreetingsUpdateType,
    },
    GreetingsError {
        kind: GreetingsErrorKind,
    },
    LanguageChangeFailed,
}

/// Sending half of the notification bus. Cheap to clone; emission never
/// blocks and never fails the caller.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<SyncEvent>,
}

impl EventSink {
    pub fn new() -> (Self, Receiver<SyncEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            debug!("no event subscriber, notification dropped");
        }
    }
}
