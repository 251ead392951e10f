//! The core chaining algorithm: a key's ordered events in, validity
//! intervals out.
//!
//! Ordering is always by `sequence_number`, never wall clock. Closing a
//! version only ever needs the next event's timestamp, so one forward pass
//! suffices and the incremental path is a plain close-and-append.

use strata_core::models::{ChangeEvent, Operation, RowImage, VersionRecord};

/// Business-field snapshot for a version: the after-image, absent for a
/// Delete (the tombstone state).
fn fields_for(event: &ChangeEvent) -> Option<RowImage> {
    match event.operation {
        Operation::Delete => None,
        _ => event.after_image.clone(),
    }
}

/// Materialize one event as the new open-ended tail of its key.
/// The in-order O(1) path: the store closes the previous tail at this
/// record's `valid_from` in the same transaction.
pub fn to_open_record(event: &ChangeEvent) -> VersionRecord {
    VersionRecord {
        entity_key: event.entity_key.clone(),
        sequence_number: event.sequence_number,
        operation: event.operation,
        fields: fields_for(event),
        valid_from: event.source_timestamp,
        valid_until: None,
    }
}

/// Derive the full version chain for one key from scratch.
///
/// The batch path, and the correctness oracle for the incremental path:
/// filter to the key, drop invalid operations, sort by sequence (stable, so
/// ties keep arrival order), collapse duplicate sequences (first arrival
/// wins), then the lead-one windowing pass. A key whose events are all
/// filtered out yields no records; that is a no-op, not an error.
///
/// Two events with identical timestamps but different sequences produce a
/// zero-width interval for the earlier one. It is still emitted: a real, if
/// instantaneous, observed state.
pub fn derive_versions(key: &str, events: &[ChangeEvent]) -> Vec<VersionRecord> {
    let mut own: Vec<&ChangeEvent> = events
        .iter()
        .filter(|e| e.operation.is_chainable() && e.entity_key == key)
        .collect();
    own.sort_by_key(|e| e.sequence_number);
    own.dedup_by_key(|e| e.sequence_number);

    let mut records = Vec::with_capacity(own.len());
    for (i, event) in own.iter().enumerate() {
        let valid_until = own.get(i + 1).map(|next| next.source_timestamp);
        records.push(VersionRecord {
            entity_key: event.entity_key.clone(),
            sequence_number: event.sequence_number,
            operation: event.operation,
            fields: fields_for(event),
            valid_from: event.source_timestamp,
            valid_until,
        });
    }
    records
}

/// Rebuild a key's events from its stored chain, for the out-of-order
/// recompute: a record keeps everything chaining needs (sequence,
/// operation, after-image, source timestamp). Before-images are not
/// retained; intervals never depend on them.
pub fn events_from_history(history: &[VersionRecord]) -> Vec<ChangeEvent> {
    history
        .iter()
        .map(|record| ChangeEvent {
            entity_key: record.entity_key.clone(),
            operation: record.operation,
            before_image: None,
            after_image: record.fields.clone(),
            sequence_number: record.sequence_number,
            source_timestamp: record.valid_from,
        })
        .collect()
}

/// Validate the chain invariants for one key's records (ascending
/// sequence order expected): non-negative intervals, gap-free adjacency,
/// and at most one open tail, which must be last.
pub fn validate_chain(records: &[VersionRecord]) -> Result<(), String> {
    for record in records {
        if let Some(until) = record.valid_until {
            if until < record.valid_from {
                return Err(format!(
                    "negative interval at sequence {}",
                    record.sequence_number
                ));
            }
        }
    }

    for pair in records.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.sequence_number >= b.sequence_number {
            return Err(format!(
                "sequence order violated: {} then {}",
                a.sequence_number, b.sequence_number
            ));
        }
        match a.valid_until {
            None => {
                return Err(format!(
                    "open tail at sequence {} is not last",
                    a.sequence_number
                ));
            }
            Some(until) if until != b.valid_from => {
                return Err(format!(
                    "gap or overlap between sequences {} and {}",
                    a.sequence_number, b.sequence_number
                ));
            }
            _ => {}
        }
    }

    Ok(())
}
