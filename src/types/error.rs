//! Unified error types for the sync engine
//!
//! This module defines error types that:
//! - Are serializable for host consumption
//! - Separate retryable transport failures from terminal ones
//! - Carry the offending field/value for wire-format errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while decoding an inbound wire message.
///
/// Parse errors are local to the parser: they are never retried and always
/// name the offending field where one exists.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParseError {
    #[error("unrecognized message body")]
    UnknownMessage,

    #[error("mandatory field missing: {field}")]
    MissingField { field: String },

    #[error("invalid value for field {field}: {value:?}")]
    FieldInvalid { field: String, value: String },
}

impl ParseError {
    pub fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, value: &str) -> Self {
        Self::FieldInvalid {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Authentication failure subtypes, derived from the server response text.
///
/// All of these are terminal: the sync queue never retries a task that
/// failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthFailure {
    Blocked,
    UnknownUser,
    InvalidPassword,
    NotActivated,
    NotInitialized,
    NotProvisioned,
    UnknownClient,
    Unknown,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "user is blocked",
            Self::UnknownUser => "unknown user",
            Self::InvalidPassword => "invalid password",
            Self::NotActivated => "service not activated",
            Self::NotInitialized => "mailbox not initialized",
            Self::NotProvisioned => "service not provisioned",
            Self::UnknownClient => "unknown client",
            Self::Unknown => "unknown authentication failure",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for sync tasks and protocol operations.
///
/// The sync queue classifies these on task failure: `Transport` is retried
/// against the task's attempt budget, `Authentication` is terminal, and
/// `Domain` is surfaced immediately without retry.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SyncError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Authentication(AuthFailure),

    #[error("sync failed: {0}")]
    Domain(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_field() {
        let err = ParseError::invalid("t", "not-a-date");
        assert_eq!(
            err.to_string(),
            "invalid value for field t: \"not-a-date\""
        );
    }

    #[test]
    fn test_sync_error_serializes_tagged() {
        let err = SyncError::Transport("connection reset".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"Transport\""));
        assert!(json.contains("connection reset"));
    }
}
