//! Key/value field map for wire message bodies
//!
//! Splitting is deliberately lenient: a malformed entry without a key/value
//! separator is kept with an empty value instead of failing the whole
//! message, and unknown keys ride along untouched. Typed accessors are
//! where strictness lives: a present-but-unparsable value names the
//! offending field.

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::percent_decode_str;
use tracing::warn;

use crate::types::error::ParseError;

use super::{FIELD_SEPARATOR, KEY_VALUE_SEPARATOR};

/// Ordered mapping from field key to raw string value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    /// Split a message body (prefix already stripped) into fields.
    pub fn parse(input: &str) -> Self {
        let mut entries = Vec::new();

        for entry in input.split(FIELD_SEPARATOR) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            match entry.split_once(KEY_VALUE_SEPARATOR) {
                Some((key, value)) => {
                    entries.push((key.trim().to_string(), value.trim().to_string()));
                }
                // Tolerated: keep the key with an empty value rather than
                // failing the whole message.
                None => entries.push((entry.to_string(), String::new())),
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Raw value lookup. First entry wins on duplicate keys. An empty value
    /// counts as absent; presence of a key with no value carries no data.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Plain text field.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// Percent-decoded text field (phone numbers arrive as `%2B44...`).
    pub fn decoded_text(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| percent_decode_str(v).decode_utf8_lossy().into_owned())
    }

    /// Unsigned numeric field. Present-and-unparsable is an error naming
    /// the field; absent is `Ok(None)`.
    pub fn number(&self, key: &str) -> Result<Option<u32>, ParseError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| ParseError::invalid(key, raw)),
        }
    }

    /// TCP port field.
    pub fn port(&self, key: &str) -> Result<Option<u16>, ParseError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u16>()
                .map(Some)
                .map_err(|_| ParseError::invalid(key, raw)),
        }
    }

    /// Enum-coded field decoded through a fixed code table.
    pub fn code<T>(
        &self,
        key: &str,
        decode: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ParseError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => decode(raw)
                .map(Some)
                .ok_or_else(|| ParseError::invalid(key, raw)),
        }
    }

    /// Timestamp field, parsed with the injected chrono format.
    ///
    /// A failed parse degrades to absent instead of failing the message:
    /// OMTP platforms are inconsistent about optional timestamp formatting,
    /// and a bad date must not cost us the rest of the fields.
    pub fn timestamp(&self, key: &str, format: &str) -> Option<DateTime<Utc>> {
        let raw = self.get(key)?;

        if let Ok(with_zone) = DateTime::parse_from_str(raw, format) {
            return Some(with_zone.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }

        warn!(field = key, value = raw, "dropping unparsable timestamp");
        None
    }
}
