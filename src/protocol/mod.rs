//! OMTP SMS wire format
//!
//! An inbound message body starts with one of two fixed prefixes and
//! continues as unordered `key=value` entries. Entries are separated by
//! `';'`, keys from values by `'='`. Values may be absent for optional
//! fields, and unknown keys are carried along but never required.

pub mod fields;
pub mod message;
pub mod parser;

pub use fields::FieldMap;
pub use message::{ProvisioningStatus, StatusMessage, SyncMessage, TriggerEvent, WireMessage};
pub use parser::MessageParser;

pub const SYNC_PREFIX: &str = "SYNC:";
pub const STATUS_PREFIX: &str = "STATUS:";

pub const FIELD_SEPARATOR: char = ';';
pub const KEY_VALUE_SEPARATOR: char = '=';

/// Field keys of the SYNC message form.
pub mod sync_keys {
    pub const TRIGGER_EVENT: &str = "to";
    pub const NEW_MESSAGE_COUNT: &str = "n";
    pub const MESSAGE_ID: &str = "id";
    pub const CONTENT_TYPE: &str = "c";
    pub const LENGTH: &str = "l";
    pub const SENDER: &str = "s";
    pub const TIME: &str = "t";
}

/// Field keys of the STATUS message form.
pub mod status_keys {
    pub const PROVISIONING_STATUS: &str = "st";
    pub const RETURN_CODE: &str = "rc";
    pub const SUBSCRIPTION_URL: &str = "rs";
    pub const SERVER_ADDRESS: &str = "srv";
    pub const IMAP_PORT: &str = "ipt";
    pub const IMAP_USER: &str = "u";
    pub const IMAP_PASSWORD: &str = "pw";
    pub const SMTP_USER: &str = "smtp_u";
    pub const SMTP_PASSWORD: &str = "smtp_pw";
    pub const TUI_NUMBER: &str = "tui";
    pub const CLIENT_SMS_DESTINATION: &str = "dn";
    pub const SUPPORTED_LANGUAGES: &str = "lang";
    pub const MAX_GREETING_LENGTH: &str = "g_len";
    pub const MAX_VOICE_SIGNATURE_LENGTH: &str = "vs_len";
}
