//! Stateless wire-message decoder
//!
//! Raw SMS text in, typed message out. The parser is total over
//! well-formed field strings: unknown keys never abort a message, and the
//! only mandatory field anywhere is the SYNC trigger event.

use tracing::debug;

use crate::types::error::ParseError;

use super::message::{ProvisioningStatus, StatusMessage, SyncMessage, TriggerEvent, WireMessage};
use super::{fields::FieldMap, status_keys, sync_keys, STATUS_PREFIX, SYNC_PREFIX};

/// Decoder for inbound OMTP SMS bodies.
pub struct MessageParser {
    timestamp_format: String,
}

impl MessageParser {
    /// Create a parser with the given chrono timestamp format.
    pub fn new(timestamp_format: impl Into<String>) -> Self {
        Self {
            timestamp_format: timestamp_format.into(),
        }
    }

    /// Decode a message body from the given originating number.
    pub fn parse(&self, body: &str, originator: &str) -> Result<WireMessage, ParseError> {
        let body = body.trim();

        if let Some(rest) = body.strip_prefix(SYNC_PREFIX) {
            return self.parse_sync(rest, originator).map(WireMessage::Sync);
        }
        if let Some(rest) = body.strip_prefix(STATUS_PREFIX) {
            return self.parse_status(rest, originator).map(WireMessage::Status);
        }

        debug!("unrecognized message prefix");
        Err(ParseError::UnknownMessage)
    }

    fn parse_sync(&self, body: &str, originator: &str) -> Result<SyncMessage, ParseError> {
        let fields = FieldMap::parse(body);

        let trigger_event = fields
            .code(sync_keys::TRIGGER_EVENT, TriggerEvent::from_code)?
            .ok_or_else(|| ParseError::missing(sync_keys::TRIGGER_EVENT))?;

        Ok(SyncMessage {
            trigger_event,
            new_message_count: fields.number(sync_keys::NEW_MESSAGE_COUNT)?,
            id: fields.text(sync_keys::MESSAGE_ID),
            content_type: fields.text(sync_keys::CONTENT_TYPE),
            length_seconds: fields.number(sync_keys::LENGTH)?,
            sender: fields.decoded_text(sync_keys::SENDER),
            timestamp: fields.timestamp(sync_keys::TIME, &self.timestamp_format),
            originator: originator.to_string(),
        })
    }

    fn parse_status(&self, body: &str, originator: &str) -> Result<StatusMessage, ParseError> {
        let fields = FieldMap::parse(body);

        Ok(StatusMessage {
            provisioning_status: fields.code(
                status_keys::PROVISIONING_STATUS,
                ProvisioningStatus::from_code,
            )?,
            return_code: fields.text(status_keys::RETURN_CODE),
            subscription_url: fields.text(status_keys::SUBSCRIPTION_URL),
            server_address: fields.text(status_keys::SERVER_ADDRESS),
            imap_port: fields.port(status_keys::IMAP_PORT)?,
            imap_user: fields.text(status_keys::IMAP_USER),
            imap_password: fields.text(status_keys::IMAP_PASSWORD),
            smtp_user: fields.text(status_keys::SMTP_USER),
            smtp_password: fields.text(status_keys::SMTP_PASSWORD),
            tui_number: fields.decoded_text(status_keys::TUI_NUMBER),
            client_sms_destination: fields.decoded_text(status_keys::CLIENT_SMS_DESTINATION),
            supported_languages: fields.text(status_keys::SUPPORTED_LANGUAGES),
            max_greeting_length: fields.number(status_keys::MAX_GREETING_LENGTH)?,
            max_voice_signature_length: fields.number(status_keys::MAX_VOICE_SIGNATURE_LENGTH)?,
            originator: originator.to_string(),
        })
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TIMESTAMP_FORMAT)
    }
}
