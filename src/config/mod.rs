//! Engine and account configuration
//!
//! `SyncConfig` is the engine's own tuning; `AccountConfig` is the
//! persisted OMTP subscriber configuration, updated field-by-field from
//! inbound STATUS messages.

use serde::{Deserialize, Serialize};

use crate::protocol::message::{ProvisioningStatus, StatusMessage};

/// Compact OMTP timestamp form (`20230101000000`). Carriers that send the
/// zoned form configure `%d/%m/%Y %H:%M %z` instead.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Attempt budget per sync task. Also the number of consecutive
    /// greetings failures between user-visible greetings errors.
    pub max_retries: u32,
    /// chrono format for SYNC timestamp fields
    pub timestamp_format: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

/// Persisted subscriber configuration for one voicemail account.
///
/// Every field is optional: an account starts empty and fills in as STATUS
/// messages arrive. `sms_origin_number` is the exception: it comes from
/// the provider configuration, not from STATUS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub provisioning_status: Option<ProvisioningStatus>,
    pub subscription_url: Option<String>,
    pub server_address: Option<String>,
    pub imap_port: Option<u16>,
    pub imap_user: Option<String>,
    pub imap_password: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Spoken-menu (TUI) number, also the fallback sender for voicemails
    /// that arrive without one
    pub tui_number: Option<String>,
    pub client_sms_destination: Option<String>,
    pub supported_languages: Option<String>,
    pub max_greeting_length: Option<u32>,
    pub max_voice_signature_length: Option<u32>,
    /// Number the provider sends OMTP SMS from; messages from anywhere
    /// else are dropped
    pub sms_origin_number: Option<String>,
}

impl AccountConfig {
    /// Merge a STATUS message into this configuration. Only present fields
    /// overwrite; absent fields leave the existing value untouched.
    ///
    /// Returns whether the spoken-menu number changed from its last known
    /// value.
    pub fn merge_status(&mut self, status: &StatusMessage) -> bool {
        let previous_tui = self.tui_number.clone();

        merge(&mut self.provisioning_status, &status.provisioning_status);
        merge(&mut self.subscription_url, &status.subscription_url);
        merge(&mut self.server_address, &status.server_address);
        merge(&mut self.imap_port, &status.imap_port);
        merge(&mut self.imap_user, &status.imap_user);
        merge(&mut self.imap_password, &status.imap_password);
        merge(&mut self.smtp_user, &status.smtp_user);
        merge(&mut self.smtp_password, &status.smtp_password);
        merge(&mut self.tui_number, &status.tui_number);
        merge(
            &mut self.client_sms_destination,
            &status.client_sms_destination,
        );
        merge(&mut self.supported_languages, &status.supported_languages);
        merge(&mut self.max_greeting_length, &status.max_greeting_length);
        merge(
            &mut self.max_voice_signature_length,
            &status.max_voice_signature_length,
        );

        status.tui_number.is_some() && self.tui_number != previous_tui
    }
}

fn merge<T: Clone>(existing: &mut Option<T>, incoming: &Option<T>) {
    if incoming.is_some() {
        *existing = incoming.clone();
    }
}
