//! Data structures shared across the sync engine
//!
//! Records are the reconciled entities (voicemails and greetings), actions
//! are the pure-data operations a reconciliation plans against a store.

pub mod error;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity contract shared by every reconcilable record.
///
/// A record's key is its stable source identifier and is never reassigned
/// after creation. Key equality is the only notion of identity the
/// reconciler uses; payload equality never participates.
pub trait SyncEntity: Clone + Send + Sync + 'static {
    /// Stable source identifier.
    fn key(&self) -> &str;

    /// Read flag for voicemails, activation flag for greetings.
    fn flag(&self) -> bool;

    /// Whether the record is locally marked as deleted.
    fn is_deleted(&self) -> bool;

    /// Whether the record's payload is available on this side.
    fn has_content(&self) -> bool;
}

/// A single voicemail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoicemailRecord {
    /// Stable source identifier, immutable once created
    pub key: String,
    pub read: bool,
    pub deleted: bool,
    pub content_downloaded: bool,
    pub sender: Option<String>,
    pub duration_seconds: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl VoicemailRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            read: false,
            deleted: false,
            content_downloaded: false,
            sender: None,
            duration_seconds: None,
            timestamp: None,
        }
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn with_content(mut self, downloaded: bool) -> Self {
        self.content_downloaded = downloaded;
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

impl SyncEntity for VoicemailRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn flag(&self) -> bool {
        self.read
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn has_content(&self) -> bool {
        self.content_downloaded
    }
}

/// Which spoken prompt a greeting record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GreetingKind {
    NormalGreeting,
    VoiceSignature,
}

/// A greeting record: a kind tag plus a voicemail-shaped payload record.
///
/// The payload carries the key, deletion flag and content flag; the
/// activation flag lives here because it is greeting-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreetingRecord {
    pub kind: GreetingKind,
    pub active: bool,
    pub payload: VoicemailRecord,
}

impl GreetingRecord {
    pub fn new(kind: GreetingKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            active: false,
            payload: VoicemailRecord::new(key),
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_content(mut self, downloaded: bool) -> Self {
        self.payload.content_downloaded = downloaded;
        self
    }
}

impl SyncEntity for GreetingRecord {
    fn key(&self) -> &str {
        &self.payload.key
    }

    fn flag(&self) -> bool {
        self.active
    }

    fn is_deleted(&self) -> bool {
        self.payload.deleted
    }

    fn has_content(&self) -> bool {
        self.payload.content_downloaded
    }
}

/// Operations a reconciliation can plan against a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Insert,
    Delete,
    /// Set the record's flag: read for voicemails, activation for greetings.
    MarkRead,
    FetchContent,
    DeleteContent,
}

/// A planned operation against one store. Actions are pure data; applying
/// one is the store collaborator's side effect, never the reconciler's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action<E> {
    pub kind: ActionKind,
    pub target: E,
}

impl<E> Action<E> {
    pub fn new(kind: ActionKind, target: E) -> Self {
        Self { kind, target }
    }

    pub fn insert(target: E) -> Self {
        Self::new(ActionKind::Insert, target)
    }

    pub fn delete(target: E) -> Self {
        Self::new(ActionKind::Delete, target)
    }

    pub fn mark_read(target: E) -> Self {
        Self::new(ActionKind::MarkRead, target)
    }

    pub fn fetch_content(target: E) -> Self {
        Self::new(ActionKind::FetchContent, target)
    }
}

/// The two action lists a full reconciliation produces, named by the store
/// they apply to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan<E> {
    pub local: Vec<Action<E>>,
    pub remote: Vec<Action<E>>,
}

impl<E> ActionPlan<E> {
    pub fn new() -> Self {
        Self {
            local: Vec::new(),
            remote: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }
}

impl<E> Default for ActionPlan<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// What a greetings sync was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GreetingsUpdateType {
    FetchContent,
    UploadContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_identity_delegates_to_payload() {
        let greeting = GreetingRecord::new(GreetingKind::NormalGreeting, "g1")
            .with_active(true)
            .with_content(true);

        assert_eq!(greeting.key(), "g1");
        assert!(greeting.flag());
        assert!(greeting.has_content());
        assert!(!greeting.is_deleted());
    }

    #[test]
    fn test_action_plan_starts_empty() {
        let plan: ActionPlan<VoicemailRecord> = ActionPlan::new();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_action_serialization_round_trip() {
        let action = Action::insert(VoicemailRecord::new("42").with_sender("+447000000000"));
        let json = serde_json::to_string(&action).unwrap();
        let back: Action<VoicemailRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
