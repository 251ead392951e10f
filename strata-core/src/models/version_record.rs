//! Materialized row-version types: VersionRecord, ApplyOutcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change_event::{Operation, RowImage};

/// One materialized row-version carrying an explicit validity interval
/// `[valid_from, valid_until)`.
///
/// Immutable once `valid_until` is closed by the next event in sequence;
/// the open-ended tail is the only record a later event may touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub entity_key: String,
    /// Sequence number of the event that produced this version.
    pub sequence_number: u64,
    /// The producing operation. Tombstones are produced by Delete.
    pub operation: Operation,
    /// Business fields copied from the after-image; None is the tombstone
    /// state.
    pub fields: Option<RowImage>,
    /// Source timestamp of the producing event. Inclusive bound.
    pub valid_from: DateTime<Utc>,
    /// Source timestamp of the next event for the same key. Exclusive bound;
    /// None is the open-ended sentinel.
    pub valid_until: Option<DateTime<Utc>>,
}

impl VersionRecord {
    /// Whether this version is the tombstone state.
    pub fn is_tombstone(&self) -> bool {
        self.fields.is_none()
    }

    /// Whether this version is the open-ended tail of its key.
    pub fn is_open(&self) -> bool {
        self.valid_until.is_none()
    }

    /// Whether this version's interval contains the instant `at`.
    /// Zero-width intervals contain no instant.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if at < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => at < until,
            None => true,
        }
    }

    /// Numeric value of a business field. Accepts JSON numbers and numeric
    /// strings (decimal columns often arrive as strings on the wire).
    pub fn field_f64(&self, field: &str) -> Option<f64> {
        match self.fields.as_ref()?.get(field)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Effect of feeding one event through the materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// In-order event: previous tail closed (if any) and one record appended.
    Applied { closed_tail: bool },
    /// Out-of-order event: the key's whole chain was rebuilt.
    Recomputed { records: usize },
    /// Exact (key, sequence) duplicate; the store is untouched.
    DuplicateAbsorbed,
    /// Invalid operation marker; dropped before chaining.
    InvalidDropped,
}
