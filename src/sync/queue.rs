//! Serialized sync task queue
//!
//! A FIFO of sync requests with exactly one task in flight at a time.
//! Submissions while a task is active only enqueue. Each task starts with
//! a fresh attempt budget; transient transport failures re-run the task
//! until the budget runs out, authentication failures are terminal, and
//! domain failures surface immediately.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::events::{EventSink, GreetingsErrorKind, SyncEvent};
use crate::protocol::message::ProvisioningStatus;
use crate::store::AccountStore;
use crate::types::error::{AuthFailure, Result, SyncError};
use crate::types::GreetingsUpdateType;

/// The kinds of work the queue serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Reconcile the local store against a fresh remote snapshot
    FullSync,
    /// Upload local read/delete changes detected against the mirror
    LocalOnlySync,
    GreetingsSync { update: GreetingsUpdateType },
    LanguageChange { code: u8 },
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FullSync => "full_sync",
            Self::LocalOnlySync => "local_only_sync",
            Self::GreetingsSync { .. } => "greetings_sync",
            Self::LanguageChange { .. } => "language_change",
        }
    }

    fn is_greetings(&self) -> bool {
        matches!(self, Self::GreetingsSync { .. })
    }
}

/// One queued synchronization request.
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub id: Uuid,
    pub kind: TaskKind,
}

impl SyncTask {
    fn new(kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }
}

/// Executes one task attempt. Implemented by the sync engine; tests swap
/// in scripted executors.
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    async fn execute(&self, task: &SyncTask) -> Result<()>;
}

/// Queue introspection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub active: Option<TaskKind>,
    pub attempts_left: Option<u32>,
    pub pending: usize,
}

/// Server response substrings that mean authentication failed, checked
/// case-insensitively against transport error text.
static AUTH_RESPONSES: Lazy<Vec<(&'static str, AuthFailure)>> = Lazy::new(|| {
    vec![
        ("user is blocked", AuthFailure::Blocked),
        ("unknown user", AuthFailure::UnknownUser),
        ("invalid password", AuthFailure::InvalidPassword),
        ("service not activated", AuthFailure::NotActivated),
        ("mailbox not initialized", AuthFailure::NotInitialized),
        ("service not provisioned", AuthFailure::NotProvisioned),
        ("unknown client", AuthFailure::UnknownClient),
        ("authentication failed", AuthFailure::Unknown),
        ("login failed", AuthFailure::Unknown),
    ]
});

/// Match a server response against the authentication-failure table.
pub fn classify_auth_response(text: &str) -> Option<AuthFailure> {
    let lowered = text.to_lowercase();
    AUTH_RESPONSES
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map(|(_, reason)| *reason)
}

/// Provisioning state implied by an authentication-failure subtype, where
/// one is implied at all.
fn provisioning_transition(reason: AuthFailure) -> Option<ProvisioningStatus> {
    match reason {
        AuthFailure::Blocked => Some(ProvisioningStatus::Blocked),
        AuthFailure::UnknownUser => Some(ProvisioningStatus::Unknown),
        AuthFailure::NotProvisioned | AuthFailure::NotActivated => Some(ProvisioningStatus::New),
        _ => None,
    }
}

struct ActiveTask {
    task: SyncTask,
    attempts_left: u32,
}

impl ActiveTask {
    fn start(task: SyncTask, budget: u32) -> Self {
        Self {
            task,
            attempts_left: budget,
        }
    }
}

struct QueueState {
    active: Option<ActiveTask>,
    pending: VecDeque<SyncTask>,
    /// Consecutive greetings failures, shared across greeting tasks so a
    /// flapping greetings sync only notifies once per budget-sized streak.
    greeting_failures: u32,
    online: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    executor: Arc<dyn TaskExecutor>,
    accounts: Arc<dyn AccountStore>,
    events: EventSink,
    config: SyncConfig,
}

/// The serialized sync queue. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct SyncQueue {
    inner: Arc<QueueInner>,
}

impl SyncQueue {
    pub fn new(
        executor: Arc<dyn TaskExecutor>,
        accounts: Arc<dyn AccountStore>,
        events: EventSink,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    active: None,
                    pending: VecDeque::new(),
                    greeting_failures: 0,
                    online: true,
                }),
                executor,
                accounts,
                events,
                config,
            }),
        }
    }

    /// Submit a task. If a task is already active the new one only
    /// enqueues; otherwise it starts immediately with a fresh attempt
    /// budget. Returns the task's identity token.
    pub async fn submit(&self, kind: TaskKind) -> Uuid {
        let task = SyncTask::new(kind);
        let id = task.id;

        let start = {
            let mut state = self.inner.state.lock().await;
            if state.active.is_some() {
                debug!(task = kind.label(), "task enqueued behind active task");
                state.pending.push_back(task);
                None
            } else {
                state.active = Some(ActiveTask::start(
                    task.clone(),
                    self.inner.config.max_retries,
                ));
                Some(task)
            }
        };

        if let Some(task) = start {
            tokio::spawn(drive(self.inner.clone(), task));
        }

        id
    }

    /// Drop the active task without touching the queued tail. In-flight
    /// I/O for the dropped task is not interrupted; its completion is
    /// ignored because the task is no longer the active one. The next
    /// queued task, if any, is promoted.
    pub async fn drop_current(&self) {
        let promoted = {
            let mut state = self.inner.state.lock().await;
            let Some(active) = state.active.take() else {
                return;
            };
            info!(task = active.task.kind.label(), "dropping active sync task");

            match state.pending.pop_front() {
                Some(next) => {
                    state.active = Some(ActiveTask::start(
                        next.clone(),
                        self.inner.config.max_retries,
                    ));
                    Some(next)
                }
                None => None,
            }
        };

        if let Some(task) = promoted {
            tokio::spawn(drive(self.inner.clone(), task));
        }
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock().await;
        QueueStatus {
            active: state.active.as_ref().map(|a| a.task.kind),
            attempts_left: state.active.as_ref().map(|a| a.attempts_left),
            pending: state.pending.len(),
        }
    }
}

enum FailureClass {
    Transport(String),
    Authentication(AuthFailure),
    Domain(String),
}

fn classify(err: &SyncError) -> FailureClass {
    match err {
        SyncError::Authentication(reason) => FailureClass::Authentication(*reason),
        // Transport errors carry raw server text; an authentication
        // rejection hiding in there is terminal, not retryable.
        SyncError::Transport(cause) => match classify_auth_response(cause) {
            Some(reason) => FailureClass::Authentication(reason),
            None => FailureClass::Transport(cause.clone()),
        },
        other => FailureClass::Domain(other.to_string()),
    }
}

/// Run the active task to completion, then keep draining the queue until
/// it is empty. One driver exists per activation; a driver whose task was
/// dropped exits as soon as it notices it is stale.
async fn drive(inner: Arc<QueueInner>, task: SyncTask) {
    let mut current = task;

    loop {
        info!(task = current.kind.label(), id = %current.id, "sync task attempt");
        let result = inner.executor.execute(&current).await;

        let mut transition: Option<ProvisioningStatus> = None;

        let next = {
            let mut state = inner.state.lock().await;

            let still_active =
                state.active.as_ref().map(|a| a.task.id) == Some(current.id);
            if !still_active {
                info!(task = current.kind.label(), "stale task completion ignored");
                return;
            }

            match result {
                Ok(()) => {
                    info!(task = current.kind.label(), "sync task completed");
                    if current.kind.is_greetings() {
                        state.greeting_failures = 0;
                    }
                    if !state.online {
                        state.online = true;
                        inner.events.emit(SyncEvent::ConnectivityOk);
                    }
                }
                Err(err) => match classify(&err) {
                    FailureClass::Transport(cause) => {
                        let retry = match state.active.as_mut() {
                            Some(active) => {
                                active.attempts_left = active.attempts_left.saturating_sub(1);
                                active.attempts_left > 0
                            }
                            None => false,
                        };

                        if retry {
                            warn!(
                                task = current.kind.label(),
                                cause = %cause,
                                "transport failure, retrying"
                            );
                            continue;
                        }

                        warn!(
                            task = current.kind.label(),
                            cause = %cause,
                            "transport failure, attempts exhausted"
                        );
                        state.online = false;
                        inner.events.emit(SyncEvent::ConnectivityFailed { cause });
                        if matches!(current.kind, TaskKind::LanguageChange { .. }) {
                            inner.events.emit(SyncEvent::LanguageChangeFailed);
                        }
                    }
                    FailureClass::Authentication(reason) => {
                        warn!(
                            task = current.kind.label(),
                            reason = %reason,
                            "authentication failure, task abandoned"
                        );
                        if let Some(active) = state.active.as_mut() {
                            active.attempts_left = 0;
                        }
                        inner
                            .events
                            .emit(SyncEvent::AuthenticationFailed { reason });
                        if matches!(current.kind, TaskKind::LanguageChange { .. }) {
                            inner.events.emit(SyncEvent::LanguageChangeFailed);
                        }
                        transition = provisioning_transition(reason);
                    }
                    FailureClass::Domain(detail) => {
                        warn!(
                            task = current.kind.label(),
                            detail = %detail,
                            "sync task failed"
                        );
                        if let TaskKind::GreetingsSync { update } = current.kind {
                            state.greeting_failures += 1;
                            // Notify once per budget-sized streak, not on
                            // every failure.
                            if state.greeting_failures % inner.config.max_retries == 0 {
                                let kind = match update {
                                    GreetingsUpdateType::FetchContent => {
                                        GreetingsErrorKind::FetchFailed
                                    }
                                    GreetingsUpdateType::UploadContent => {
                                        GreetingsErrorKind::UploadFailed
                                    }
                                };
                                inner.events.emit(SyncEvent::GreetingsError { kind });
                            }
                        }
                        if matches!(current.kind, TaskKind::LanguageChange { .. }) {
                            inner.events.emit(SyncEvent::LanguageChangeFailed);
                        }
                    }
                },
            }

            // Advance the queue.
            match state.pending.pop_front() {
                Some(next) => {
                    state.active = Some(ActiveTask::start(
                        next.clone(),
                        inner.config.max_retries,
                    ));
                    Some(next)
                }
                None => {
                    state.active = None;
                    None
                }
            }
        };

        if let Some(status) = transition {
            apply_provisioning_transition(&inner, status).await;
        }

        match next {
            Some(task) => current = task,
            None => return,
        }
    }
}

/// Persist a provisioning-status change implied by an authentication
/// failure. Best-effort: a store failure here is logged, not surfaced.
async fn apply_provisioning_transition(inner: &QueueInner, status: ProvisioningStatus) {
    let mut config = match inner.accounts.load().await {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "could not load account config for provisioning update");
            return;
        }
    };

    if config.provisioning_status == Some(status) {
        return;
    }

    info!(status = status.code(), "recording provisioning transition");
    config.provisioning_status = Some(status);
    if let Err(err) = inner.accounts.save(&config).await {
        warn!(error = %err, "could not persist provisioning update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Executor that pops scripted results and counts calls per kind.
    struct ScriptedExecutor {
        results: Mutex<VecDeque<Result<()>>>,
        calls: Mutex<Vec<TaskKind>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedExecutor {
        fn new(results: Vec<Result<()>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn gated(results: Vec<Result<()>>, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
                gate: Some(gate),
            })
        }

        async fn calls(&self) -> Vec<TaskKind> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl TaskExecutor for ScriptedExecutor {
        async fn execute(&self, task: &SyncTask) -> Result<()> {
            self.calls.lock().await.push(task.kind);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.results.lock().await.pop_front().unwrap_or(Ok(()))
        }
    }

    struct MemoryAccountStore {
        config: Mutex<AccountConfig>,
        saves: AtomicU32,
    }

    impl MemoryAccountStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                config: Mutex::new(AccountConfig::default()),
                saves: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl AccountStore for MemoryAccountStore {
        async fn load(&self) -> std::result::Result<AccountConfig, StoreError> {
            Ok(self.config.lock().await.clone())
        }

        async fn save(
            &self,
            config: &AccountConfig,
        ) -> std::result::Result<(), StoreError> {
            *self.config.lock().await = config.clone();
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn queue_with(executor: Arc<ScriptedExecutor>) -> (SyncQueue, flume::Receiver<SyncEvent>) {
        let (events, rx) = EventSink::new();
        let queue = SyncQueue::new(
            executor,
            MemoryAccountStore::new(),
            events,
            SyncConfig::default(),
        );
        (queue, rx)
    }

    async fn wait_idle(queue: &SyncQueue) {
        for _ in 0..200 {
            let status = queue.status().await;
            if status.active.is_none() && status.pending == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue never went idle");
    }

    /// Keep releasing the executor gate until the queue drains.
    async fn release_until_idle(gate: &Notify, queue: &SyncQueue) {
        for _ in 0..200 {
            gate.notify_one();
            tokio::time::sleep(Duration::from_millis(5)).await;
            let status = queue.status().await;
            if status.active.is_none() && status.pending == 0 {
                return;
            }
        }
        panic!("queue never went idle");
    }

    /// Wait until the executor has been entered `count` times.
    async fn wait_calls(executor: &ScriptedExecutor, count: usize) {
        for _ in 0..200 {
            if executor.calls().await.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("executor never reached {count} calls");
    }

    fn drain(rx: &flume::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        rx.try_iter().collect()
    }

    #[tokio::test]
    async fn test_transport_failure_retries_exactly_budget_times() {
        let transport = || Err(SyncError::Transport("connection reset".to_string()));
        let executor = ScriptedExecutor::new(vec![transport(), transport(), transport()]);
        let (queue, rx) = queue_with(executor.clone());

        queue.submit(TaskKind::FullSync).await;
        wait_idle(&queue).await;

        // Budget of 3 means exactly 3 attempts, then surface and stop.
        assert_eq!(executor.calls().await.len(), 3);
        let events = drain(&rx);
        assert_eq!(
            events,
            vec![SyncEvent::ConnectivityFailed {
                cause: "connection reset".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_transient_failure_then_success_recovers() {
        let executor = ScriptedExecutor::new(vec![
            Err(SyncError::Transport("timeout".to_string())),
            Ok(()),
        ]);
        let (queue, rx) = queue_with(executor.clone());

        queue.submit(TaskKind::FullSync).await;
        wait_idle(&queue).await;

        assert_eq!(executor.calls().await.len(), 2);
        // Recovery within the same task never reported a failure, so no
        // connectivity edge events either.
        assert!(drain(&rx).is_empty());
    }

    #[tokio::test]
    async fn test_authentication_failure_is_terminal() {
        let executor = ScriptedExecutor::new(vec![Err(SyncError::Authentication(
            AuthFailure::InvalidPassword,
        ))]);
        let (queue, rx) = queue_with(executor.clone());

        queue.submit(TaskKind::FullSync).await;
        wait_idle(&queue).await;

        // One attempt, one notification, no retries.
        assert_eq!(executor.calls().await.len(), 1);
        let events = drain(&rx);
        assert_eq!(
            events,
            vec![SyncEvent::AuthenticationFailed {
                reason: AuthFailure::InvalidPassword
            }]
        );
    }

    #[tokio::test]
    async fn test_auth_substring_in_transport_error_is_reclassified() {
        let executor = ScriptedExecutor::new(vec![Err(SyncError::Transport(
            "NO response: user is blocked".to_string(),
        ))]);
        let (events, rx) = EventSink::new();
        let accounts = MemoryAccountStore::new();
        let queue = SyncQueue::new(
            executor.clone(),
            accounts.clone(),
            events,
            SyncConfig::default(),
        );

        queue.submit(TaskKind::FullSync).await;
        wait_idle(&queue).await;

        assert_eq!(executor.calls().await.len(), 1);
        assert_eq!(
            drain(&rx),
            vec![SyncEvent::AuthenticationFailed {
                reason: AuthFailure::Blocked
            }]
        );
        // Blocked implies a provisioning transition, persisted once.
        for _ in 0..100 {
            if accounts.saves.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let config = accounts.load().await.unwrap();
        assert_eq!(config.provisioning_status, Some(ProvisioningStatus::Blocked));
    }

    #[tokio::test]
    async fn test_submissions_while_active_only_enqueue() {
        let gate = Arc::new(Notify::new());
        let executor = ScriptedExecutor::gated(vec![Ok(()), Ok(())], gate.clone());
        let (queue, _rx) = queue_with(executor.clone());

        queue.submit(TaskKind::FullSync).await;
        queue
            .submit(TaskKind::GreetingsSync {
                update: GreetingsUpdateType::FetchContent,
            })
            .await;

        // The greetings task must wait behind the gated full sync.
        wait_calls(&executor, 1).await;
        let status = queue.status().await;
        assert_eq!(status.active, Some(TaskKind::FullSync));
        assert_eq!(status.pending, 1);
        assert_eq!(executor.calls().await.len(), 1);

        release_until_idle(&gate, &queue).await;

        assert_eq!(
            executor.calls().await,
            vec![
                TaskKind::FullSync,
                TaskKind::GreetingsSync {
                    update: GreetingsUpdateType::FetchContent
                }
            ]
        );
    }

    #[tokio::test]
    async fn test_domain_failure_is_not_retried() {
        let executor =
            ScriptedExecutor::new(vec![Err(SyncError::Domain("apply failed".to_string()))]);
        let (queue, rx) = queue_with(executor.clone());

        queue.submit(TaskKind::FullSync).await;
        wait_idle(&queue).await;

        assert_eq!(executor.calls().await.len(), 1);
        assert!(drain(&rx).is_empty());
    }

    #[tokio::test]
    async fn test_greeting_failures_throttle_notifications() {
        let domain = || Err(SyncError::Domain("greeting fetch failed".to_string()));
        // Six consecutive greetings failures with a budget of 3: exactly
        // two notifications.
        let executor = ScriptedExecutor::new((0..6).map(|_| domain()).collect());
        let (queue, rx) = queue_with(executor.clone());

        for _ in 0..6 {
            queue
                .submit(TaskKind::GreetingsSync {
                    update: GreetingsUpdateType::FetchContent,
                })
                .await;
            wait_idle(&queue).await;
        }

        let greeting_errors: Vec<_> = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, SyncEvent::GreetingsError { .. }))
            .collect();
        assert_eq!(greeting_errors.len(), 2);
    }

    #[tokio::test]
    async fn test_greeting_success_resets_failure_streak() {
        let domain = || Err(SyncError::Domain("greeting fetch failed".to_string()));
        let executor = ScriptedExecutor::new(vec![domain(), domain(), Ok(()), domain()]);
        let (queue, rx) = queue_with(executor.clone());

        for _ in 0..4 {
            queue
                .submit(TaskKind::GreetingsSync {
                    update: GreetingsUpdateType::FetchContent,
                })
                .await;
            wait_idle(&queue).await;
        }

        // 2 failures, success, 1 failure: the streak never reaches 3.
        assert!(drain(&rx)
            .iter()
            .all(|e| !matches!(e, SyncEvent::GreetingsError { .. })));
    }

    #[tokio::test]
    async fn test_language_change_failure_emits_dedicated_event() {
        let executor = ScriptedExecutor::new(vec![Err(SyncError::Domain(
            "invalid language".to_string(),
        ))]);
        let (queue, rx) = queue_with(executor.clone());

        queue.submit(TaskKind::LanguageChange { code: 5 }).await;
        wait_idle(&queue).await;

        assert_eq!(drain(&rx), vec![SyncEvent::LanguageChangeFailed]);
    }

    #[tokio::test]
    async fn test_connectivity_ok_emitted_on_recovery_edge() {
        let executor = ScriptedExecutor::new(vec![
            Err(SyncError::Transport("down".to_string())),
            Err(SyncError::Transport("down".to_string())),
            Err(SyncError::Transport("down".to_string())),
            Ok(()),
        ]);
        let (queue, rx) = queue_with(executor.clone());

        queue.submit(TaskKind::FullSync).await;
        wait_idle(&queue).await;
        queue.submit(TaskKind::FullSync).await;
        wait_idle(&queue).await;

        let events = drain(&rx);
        assert_eq!(
            events,
            vec![
                SyncEvent::ConnectivityFailed {
                    cause: "down".to_string()
                },
                SyncEvent::ConnectivityOk,
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_current_ignores_late_completion_and_promotes_next() {
        let gate = Arc::new(Notify::new());
        let executor = ScriptedExecutor::gated(vec![Ok(()), Ok(())], gate.clone());
        let (queue, rx) = queue_with(executor.clone());

        queue.submit(TaskKind::FullSync).await;
        queue.submit(TaskKind::LocalOnlySync).await;
        wait_calls(&executor, 1).await;

        // Drop the stuck full sync; the queued local-only sync takes over
        // while the old task's I/O is still in flight.
        queue.drop_current().await;
        let status = queue.status().await;
        assert_eq!(status.active, Some(TaskKind::LocalOnlySync));

        // Let both in-flight executions finish. The dropped task's late
        // completion must not advance the queue a second time.
        release_until_idle(&gate, &queue).await;

        assert_eq!(
            executor.calls().await,
            vec![TaskKind::FullSync, TaskKind::LocalOnlySync]
        );
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_classify_auth_response_table() {
        assert_eq!(
            classify_auth_response("NO AUTHENTICATE unknown user"),
            Some(AuthFailure::UnknownUser)
        );
        assert_eq!(
            classify_auth_response("Service NOT PROVISIONED for subscriber"),
            Some(AuthFailure::NotProvisioned)
        );
        assert_eq!(classify_auth_response("connection refused"), None);
    }
}
