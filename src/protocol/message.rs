//! Typed wire messages
//!
//! The two OMTP message forms as decoded, partially-optional field sets.
//! Every optional field is presence-tracked: "not provided" and "provided
//! as zero" are different things on this protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a SYNC message asks the client to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    NewMessage,
    MailboxUpdate,
    GreetingsUpdate,
}

impl TriggerEvent {
    /// Decode a wire code. Codes are matched case-sensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "NEW_MESSAGE" => Some(Self::NewMessage),
            "MAILBOX_UPDATE" => Some(Self::MailboxUpdate),
            "GREETINGS_UPDATE" => Some(Self::GreetingsUpdate),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NewMessage => "NEW_MESSAGE",
            Self::MailboxUpdate => "MAILBOX_UPDATE",
            Self::GreetingsUpdate => "GREETINGS_UPDATE",
        }
    }
}

/// Subscriber provisioning state as reported by STATUS messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningStatus {
    New,
    Ready,
    Provisioned,
    Unknown,
    Blocked,
}

impl ProvisioningStatus {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "N" => Some(Self::New),
            "R" => Some(Self::Ready),
            "P" => Some(Self::Provisioned),
            "U" => Some(Self::Unknown),
            "B" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::New => "N",
            Self::Ready => "R",
            Self::Provisioned => "P",
            Self::Unknown => "U",
            Self::Blocked => "B",
        }
    }
}

/// A decoded SYNC message.
///
/// The trigger event is the one mandatory field; everything else is
/// optional and presence-tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub trigger_event: TriggerEvent,
    pub new_message_count: Option<u32>,
    pub id: Option<String>,
    pub content_type: Option<String>,
    pub length_seconds: Option<u32>,
    pub sender: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Phone number the SMS arrived from
    pub originator: String,
}

/// A decoded STATUS message. A STATUS body with zero recognized fields is
/// valid: every field is simply reported absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub provisioning_status: Option<ProvisioningStatus>,
    pub return_code: Option<String>,
    pub subscription_url: Option<String>,
    pub server_address: Option<String>,
    pub imap_port: Option<u16>,
    pub imap_user: Option<String>,
    pub imap_password: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub tui_number: Option<String>,
    pub client_sms_destination: Option<String>,
    pub supported_languages: Option<String>,
    pub max_greeting_length: Option<u32>,
    pub max_voice_signature_length: Option<u32>,
    /// Phone number the SMS arrived from
    pub originator: String,
}

impl StatusMessage {
    /// An all-absent STATUS message from the given originator.
    pub fn empty(originator: impl Into<String>) -> Self {
        Self {
            provisioning_status: None,
            return_code: None,
            subscription_url: None,
            server_address: None,
            imap_port: None,
            imap_user: None,
            imap_password: None,
            smtp_user: None,
            smtp_password: None,
            tui_number: None,
            client_sms_destination: None,
            supported_languages: None,
            max_greeting_length: None,
            max_voice_signature_length: None,
            originator: originator.into(),
        }
    }
}

/// An inbound wire message, one variant per recognized prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireMessage {
    Sync(SyncMessage),
    Status(StatusMessage),
}

impl WireMessage {
    pub fn originator(&self) -> &str {
        match self {
            Self::Sync(m) => &m.originator,
            Self::Status(m) => &m.originator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_event_codes_are_case_sensitive() {
        assert_eq!(
            TriggerEvent::from_code("NEW_MESSAGE"),
            Some(TriggerEvent::NewMessage)
        );
        assert_eq!(TriggerEvent::from_code("new_message"), None);
        assert_eq!(TriggerEvent::from_code("NM"), None);
    }

    #[test]
    fn test_provisioning_status_round_trip() {
        for code in ["N", "R", "P", "U", "B"] {
            let status = ProvisioningStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(ProvisioningStatus::from_code("n"), None);
    }
}
