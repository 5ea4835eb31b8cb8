//! Sync task execution
//!
//! The engine is what the queue drives: for each task kind it fetches the
//! snapshots, runs the reconciler and applies the planned actions back
//! through the store collaborators. Local-side and remote-side application
//! run concurrently; a task only completes when both sides have finished.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::join;
use tracing::{info, warn};

use crate::command::ProtocolCommandClient;
use crate::store::{RecordStore, SessionProvider, StoreProvider};
use crate::sync::policies::{GreetingPolicy, VoicemailPolicy};
use crate::sync::queue::{SyncTask, TaskExecutor, TaskKind};
use crate::sync::reconcile::{apply_to_snapshot, resolve, resolve_mirror};
use crate::types::error::{Result, SyncError};
use crate::types::{ActionPlan, GreetingsUpdateType, SyncEntity};

/// Executes sync tasks against the injected store and session
/// collaborators.
pub struct SyncEngine {
    stores: Arc<dyn StoreProvider>,
    sessions: Arc<dyn SessionProvider>,
}

impl SyncEngine {
    pub fn new(stores: Arc<dyn StoreProvider>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { stores, sessions }
    }

    /// Reconcile the local voicemail store against a fresh remote
    /// snapshot, then refresh the mirror to the post-sync remote state.
    async fn full_sync(&self) -> Result<()> {
        let local_store = self.stores.local_voicemails();
        let remote_store = self.stores.remote_voicemails();

        let (local, remote) = join!(local_store.fetch_all(), remote_store.fetch_all());
        // Either fetch failing means no reconciliation at all.
        let local = local.map_err(|e| SyncError::Domain(format!("local fetch failed: {e}")))?;
        let remote = remote.map_err(|e| SyncError::Transport(e.to_string()))?;

        let plan = resolve(&VoicemailPolicy, &local, &remote);
        info!(
            local = local.len(),
            remote = remote.len(),
            local_actions = plan.local.len(),
            remote_actions = plan.remote.len(),
            "full sync planned"
        );

        self.apply_both(&*local_store, &*remote_store, &plan).await?;

        let mirror_snapshot = apply_to_snapshot(&remote, &plan.remote);
        self.stores
            .voicemail_mirror()
            .replace(mirror_snapshot)
            .await
            .map_err(|e| SyncError::Domain(format!("mirror refresh failed: {e}")))?;

        Ok(())
    }

    /// Upload local read/delete changes detected against the mirror. The
    /// local store is authoritative here and is never written.
    async fn upload_local_changes(&self) -> Result<()> {
        let local_store = self.stores.local_voicemails();
        let mirror_store = self.stores.voicemail_mirror();

        let (local, mirror) = join!(local_store.fetch_all(), mirror_store.fetch_all());
        let local = local.map_err(|e| SyncError::Domain(format!("local fetch failed: {e}")))?;
        let mirror = mirror.map_err(|e| SyncError::Domain(format!("mirror fetch failed: {e}")))?;

        let actions = resolve_mirror(&local, &mirror);
        if actions.is_empty() {
            info!("no local changes to upload");
            return Ok(());
        }
        info!(remote_actions = actions.len(), "uploading local changes");

        self.stores
            .remote_voicemails()
            .apply(&actions)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let refreshed = apply_to_snapshot(&mirror, &actions);
        mirror_store
            .replace(refreshed)
            .await
            .map_err(|e| SyncError::Domain(format!("mirror refresh failed: {e}")))?;

        Ok(())
    }

    /// Greetings run the exact same reconciliation as voicemails, with
    /// the greeting policy plugged in.
    async fn sync_greetings(&self, update: GreetingsUpdateType) -> Result<()> {
        let local_store = self.stores.local_greetings();
        let remote_store = self.stores.remote_greetings();

        let (local, remote) = join!(local_store.fetch_all(), remote_store.fetch_all());
        let local = local.map_err(|e| SyncError::Domain(format!("local fetch failed: {e}")))?;
        let remote = remote.map_err(|e| SyncError::Transport(e.to_string()))?;

        let plan = resolve(&GreetingPolicy, &local, &remote);
        info!(
            update = ?update,
            local_actions = plan.local.len(),
            remote_actions = plan.remote.len(),
            "greetings sync planned"
        );

        self.apply_both(&*local_store, &*remote_store, &plan).await
    }

    async fn change_language(&self, code: u8) -> Result<()> {
        let client = ProtocolCommandClient::new(self.sessions.clone());
        client.change_tui_language(code).await?;
        Ok(())
    }

    /// Apply both sides of a plan concurrently. A failure from either side
    /// is reported exactly once; a second failure in the same application
    /// is logged and suppressed.
    async fn apply_both<E: SyncEntity>(
        &self,
        local: &dyn RecordStore<E>,
        remote: &dyn RecordStore<E>,
        plan: &ActionPlan<E>,
    ) -> Result<()> {
        let (local_result, remote_result) = join!(apply_side(local, plan, true), apply_side(remote, plan, false));

        let mut reported: Option<SyncError> = None;

        if let Err(err) = local_result {
            reported = Some(err);
        }
        match remote_result {
            Err(err) if reported.is_none() => reported = Some(err),
            Err(err) => warn!(error = %err, "suppressing second apply failure"),
            Ok(()) => {}
        }

        match reported {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn apply_side<E: SyncEntity>(
    store: &dyn RecordStore<E>,
    plan: &ActionPlan<E>,
    is_local: bool,
) -> Result<()> {
    let actions = if is_local { &plan.local } else { &plan.remote };
    if actions.is_empty() {
        return Ok(());
    }
    store.apply(actions).await.map_err(|e| {
        if is_local {
            SyncError::Domain(format!("local apply failed: {e}"))
        } else {
            SyncError::Transport(e.to_string())
        }
    })
}

#[async_trait]
impl TaskExecutor for SyncEngine {
    async fn execute(&self, task: &SyncTask) -> Result<()> {
        match task.kind {
            TaskKind::FullSync => self.full_sync().await,
            TaskKind::LocalOnlySync => self.upload_local_changes().await,
            TaskKind::GreetingsSync { update } => self.sync_greetings(update).await,
            TaskKind::LanguageChange { code } => self.change_language(code).await,
        }
    }
}
