//! Change-event types: ChangeEvent, Operation, RowImage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field name → value mapping for one observed row state.
pub type RowImage = serde_json::Map<String, serde_json::Value>;

/// The kind of mutation a change event describes.
///
/// Classified from the single-letter change-kind marker on the wire:
/// `c` → Create, `u` → Update, `d` → Delete, `r` → Snapshot. Any other
/// marker maps to Invalid and never reaches the temporal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    /// Initial read of a pre-existing row; chains exactly like Create.
    Snapshot,
    /// Unrecognized marker; dropped with a logged warning.
    Invalid,
}

impl Operation {
    /// Classify a wire marker.
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "c" => Operation::Create,
            "u" => Operation::Update,
            "d" => Operation::Delete,
            "r" => Operation::Snapshot,
            _ => Operation::Invalid,
        }
    }

    /// Stable lowercase name, as stored in the version table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Snapshot => "snapshot",
            Operation::Invalid => "invalid",
        }
    }

    /// Inverse of [`Operation::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Operation::Create),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            "snapshot" => Some(Operation::Snapshot),
            "invalid" => Some(Operation::Invalid),
            _ => None,
        }
    }

    /// Whether an event with this operation participates in chaining.
    pub fn is_chainable(&self) -> bool {
        !matches!(self, Operation::Invalid)
    }

    /// Whether a decoded event of this kind must carry an after-image.
    /// Delete carries none (the tombstone state); Invalid carries whatever
    /// it carries, since it is dropped anyway.
    pub fn requires_after_image(&self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Snapshot
        )
    }
}

/// One observed mutation against a source row. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Identifier of the row, stable across its lifetime.
    pub entity_key: String,
    /// What happened.
    pub operation: Operation,
    /// Row state before the mutation; absent for Create/Snapshot.
    pub before_image: Option<RowImage>,
    /// Row state after the mutation; absent for Delete.
    pub after_image: Option<RowImage>,
    /// Source log position. The authoritative total order; never wall clock,
    /// which may collide or skew. Bounded to `i64::MAX` by the store's
    /// signed sequence column; the decoder rejects anything above it.
    pub sequence_number: u64,
    /// Source wall-clock time, used only to record validity boundaries.
    pub source_timestamp: DateTime<Utc>,
}
