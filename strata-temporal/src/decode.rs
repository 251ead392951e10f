//! Change-record decoding: serialized envelope in, [`ChangeEvent`] out.

use chrono::{DateTime, Utc};
use serde_json::Value;

use strata_core::config::DecoderConfig;
use strata_core::errors::DecodeError;
use strata_core::models::{ChangeEvent, Operation, RowImage};

/// Decoder for serialized change records.
///
/// Accepts the record object bare at the top level or nested one level
/// under `payload` (broker delivery) or `value` (object-store dump), so one
/// decoder serves every transport. The entity key is read from the
/// configured key field of the after-image, falling back to the
/// before-image for deletes.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    key_field: String,
}

impl EventDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            key_field: config.key_field.clone(),
        }
    }

    /// Decode one raw record.
    ///
    /// An unrecognized (or missing) operation marker decodes to
    /// [`Operation::Invalid`] rather than failing, as long as the envelope
    /// itself is sound; the caller decides to drop it. Missing key,
    /// sequence, or timestamp are hard decode errors.
    pub fn decode(&self, raw: &[u8]) -> Result<ChangeEvent, DecodeError> {
        let envelope: Value = serde_json::from_slice(raw)?;
        let record = unwrap_envelope(&envelope).ok_or(DecodeError::MissingRecord)?;

        let operation = match record.get("op").and_then(Value::as_str) {
            Some(marker) => Operation::from_marker(marker),
            None => Operation::Invalid,
        };

        let before_image = image_at(record, "before");
        let after_image = image_at(record, "after");
        let entity_key = self.derive_key(&after_image, &before_image)?;

        let source = record.get("source").and_then(Value::as_object);
        let sequence_number = source
            .and_then(|s| s.get("lsn"))
            .and_then(Value::as_u64)
            .ok_or(DecodeError::MissingSequence)?;
        // The store orders by a signed 64-bit column; anything above its
        // range would wrap negative and mis-sort.
        if sequence_number > i64::MAX as u64 {
            return Err(DecodeError::SequenceOutOfRange {
                sequence: sequence_number,
            });
        }
        let millis = source
            .and_then(|s| s.get("ts_ms"))
            .and_then(Value::as_i64)
            .ok_or(DecodeError::MissingTimestamp)?;
        let source_timestamp: DateTime<Utc> =
            DateTime::from_timestamp_millis(millis).ok_or(DecodeError::MissingTimestamp)?;

        if after_image.is_none() && operation.requires_after_image() {
            return Err(DecodeError::MissingImage {
                operation: operation.as_str().to_string(),
            });
        }

        Ok(ChangeEvent {
            entity_key,
            operation,
            before_image,
            after_image,
            sequence_number,
            source_timestamp,
        })
    }

    fn derive_key(
        &self,
        after: &Option<RowImage>,
        before: &Option<RowImage>,
    ) -> Result<String, DecodeError> {
        after
            .as_ref()
            .and_then(|img| img.get(&self.key_field))
            .or_else(|| before.as_ref().and_then(|img| img.get(&self.key_field)))
            .and_then(key_to_string)
            .ok_or_else(|| DecodeError::MissingKey {
                key_field: self.key_field.clone(),
            })
    }
}

/// Find the record object: bare, under `payload`, or under `value`.
fn unwrap_envelope(envelope: &Value) -> Option<&serde_json::Map<String, Value>> {
    let object = envelope.as_object()?;
    for nesting in ["payload", "value"] {
        if let Some(inner) = object.get(nesting).and_then(Value::as_object) {
            return Some(inner);
        }
    }
    if object.contains_key("op") || object.contains_key("source") {
        return Some(object);
    }
    None
}

fn image_at(record: &serde_json::Map<String, Value>, field: &str) -> Option<RowImage> {
    record.get(field).and_then(Value::as_object).cloned()
}

/// Normalize a key value to text: strings pass through, numbers take their
/// decimal form (so `42` and `"42"` name the same entity). Other JSON types
/// do not identify a row.
fn key_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
