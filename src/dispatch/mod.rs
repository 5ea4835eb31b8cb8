//! Inbound message dispatch
//!
//! Routes a decoded wire message to the right handling routine: the
//! NEW_MESSAGE fast path inserts straight into the local store, mailbox
//! and greetings updates enqueue sync tasks, and STATUS merges into the
//! persisted account configuration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::events::{EventSink, SyncEvent};
use crate::protocol::message::{StatusMessage, SyncMessage, TriggerEvent, WireMessage};
use crate::store::{AccountStore, RecordStore};
use crate::sync::queue::{SyncQueue, TaskKind};
use crate::types::error::{Result, SyncError};
use crate::types::{Action, GreetingsUpdateType, VoicemailRecord};

/// Visitor over decoded wire messages.
pub struct MessageDispatcher {
    accounts: Arc<dyn AccountStore>,
    local_voicemails: Arc<dyn RecordStore<VoicemailRecord>>,
    queue: SyncQueue,
    events: EventSink,
}

impl MessageDispatcher {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        local_voicemails: Arc<dyn RecordStore<VoicemailRecord>>,
        queue: SyncQueue,
        events: EventSink,
    ) -> Self {
        Self {
            accounts,
            local_voicemails,
            queue,
            events,
        }
    }

    /// Route one message. Errors out of here are store/config failures;
    /// a message that is merely uninteresting is dropped with a log line.
    pub async fn dispatch(&self, message: WireMessage) -> Result<()> {
        match message {
            WireMessage::Sync(sync) => match sync.trigger_event {
                TriggerEvent::NewMessage => self.on_new_message(sync).await,
                TriggerEvent::MailboxUpdate => {
                    info!("mailbox update, scheduling full sync");
                    self.queue.submit(TaskKind::FullSync).await;
                    Ok(())
                }
                TriggerEvent::GreetingsUpdate => {
                    info!("greetings update, scheduling greetings sync");
                    self.events.emit(SyncEvent::GreetingsUpdate {
                        update_type: GreetingsUpdateType::FetchContent,
                    });
                    self.queue
                        .submit(TaskKind::GreetingsSync {
                            update: GreetingsUpdateType::FetchContent,
                        })
                        .await;
                    Ok(())
                }
            },
            WireMessage::Status(status) => self.on_status(status).await,
        }
    }

    /// Fast path: a single new voicemail goes straight into the local
    /// store without a reconciliation round-trip.
    async fn on_new_message(&self, message: SyncMessage) -> Result<()> {
        let config = self
            .accounts
            .load()
            .await
            .map_err(|e| SyncError::Store(e.to_string()))?;

        // Only the provider's own origin number may announce voicemails.
        if let Some(origin) = &config.sms_origin_number {
            if origin != &message.originator {
                info!(
                    originator = %message.originator,
                    "dropping new-message sync from unexpected origin"
                );
                return Ok(());
            }
        }

        // Sender falls back to the spoken-menu number; a record with no
        // duration or timestamp is still stored, but the user learns the
        // details are incomplete.
        let sender = message.sender.clone().or_else(|| config.tui_number.clone());
        if message.length_seconds.is_none() || message.timestamp.is_none() {
            self.events.emit(SyncEvent::MessageWaiting {
                sender: sender.clone(),
                duration_seconds: message.length_seconds,
                timestamp: message.timestamp,
            });
        }

        let Some(id) = message.id else {
            // Without a key there is nothing to insert; let a full sync
            // pick the message up from the server instead.
            warn!("new-message sync without id, scheduling full sync");
            self.queue.submit(TaskKind::FullSync).await;
            return Ok(());
        };

        let record = VoicemailRecord {
            key: id,
            read: false,
            deleted: false,
            content_downloaded: false,
            sender,
            duration_seconds: message.length_seconds,
            timestamp: message.timestamp,
        };

        if let Err(err) = self.local_voicemails.apply(&[Action::insert(record)]).await {
            // Self-healing: if the fast path cannot land the record, a
            // full sync will.
            warn!(error = %err, "fast-path insert failed, scheduling full sync");
            self.queue.submit(TaskKind::FullSync).await;
        }

        Ok(())
    }

    /// Merge present STATUS fields into the persisted configuration and
    /// announce the change.
    async fn on_status(&self, status: StatusMessage) -> Result<()> {
        let mut config = self
            .accounts
            .load()
            .await
            .map_err(|e| SyncError::Store(e.to_string()))?;

        let tui_number_changed = config.merge_status(&status);

        self.accounts
            .save(&config)
            .await
            .map_err(|e| SyncError::Store(e.to_string()))?;

        info!(
            status = ?config.provisioning_status,
            tui_number_changed,
            "account status updated"
        );
        self.events.emit(SyncEvent::StatusChanged {
            status: config.provisioning_status,
            tui_number_changed,
        });

        Ok(())
    }
}
