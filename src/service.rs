//! Composition root
//!
//! Wires parser, dispatcher, queue and engine together from explicitly
//! injected collaborators. Hosts that want finer control can assemble the
//! pieces themselves; nothing here is required by the core.

use std::sync::Arc;

use flume::Receiver;
use tracing::info;
use uuid::Uuid;

use crate::command::ProtocolCommandClient;
use crate::config::SyncConfig;
use crate::dispatch::MessageDispatcher;
use crate::events::{EventSink, SyncEvent};
use crate::protocol::{MessageParser, WireMessage};
use crate::store::{AccountStore, SessionProvider, StoreProvider};
use crate::sync::engine::SyncEngine;
use crate::sync::queue::{QueueStatus, SyncQueue, TaskKind};
use crate::types::error::Result;

/// A fully wired OMTP sync service for one voicemail account.
pub struct OmtpService {
    parser: MessageParser,
    dispatcher: MessageDispatcher,
    queue: SyncQueue,
    commands: ProtocolCommandClient,
    events: Receiver<SyncEvent>,
}

impl OmtpService {
    pub fn new(
        stores: Arc<dyn StoreProvider>,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionProvider>,
        config: SyncConfig,
    ) -> Self {
        let (sink, events) = EventSink::new();

        let engine = Arc::new(SyncEngine::new(stores.clone(), sessions.clone()));
        let queue = SyncQueue::new(engine, accounts.clone(), sink.clone(), config.clone());
        let dispatcher = MessageDispatcher::new(
            accounts,
            stores.local_voicemails(),
            queue.clone(),
            sink,
        );

        info!("omtp sync service assembled");

        Self {
            parser: MessageParser::new(config.timestamp_format),
            dispatcher,
            queue,
            commands: ProtocolCommandClient::new(sessions),
            events,
        }
    }

    /// Feed one raw SMS body through parse and dispatch.
    pub async fn receive_sms(&self, body: &str, originator: &str) -> Result<()> {
        let message = self.parser.parse(body, originator)?;
        self.dispatcher.dispatch(message).await
    }

    /// Dispatch an already-decoded message (for hosts that parse
    /// elsewhere).
    pub async fn dispatch(&self, message: WireMessage) -> Result<()> {
        self.dispatcher.dispatch(message).await
    }

    /// Enqueue a sync task; external triggers use this for the mirror
    /// upload pass the wire protocol never asks for.
    pub async fn submit(&self, kind: TaskKind) -> Uuid {
        self.queue.submit(kind).await
    }

    /// Drop the active task without touching the queued tail.
    pub async fn drop_current(&self) {
        self.queue.drop_current().await
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.status().await
    }

    /// One-shot commands that bypass the queue.
    pub fn commands(&self) -> &ProtocolCommandClient {
        &self.commands
    }

    /// The notification stream. All user-visible behavior of the engine
    /// flows out of here.
    pub fn events(&self) -> &Receiver<SyncEvent> {
        &self.events
    }
}
