//! Chain derivation and key-partitioning tests. Pure logic, no database.

use chrono::{DateTime, Utc};
use strata_core::models::{ChangeEvent, Operation, RowImage, VersionRecord};
use strata_temporal::chain;
use strata_temporal::partition::{Admission, KeyBuffer, KeyPartitioner};

fn ts(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap()
}

fn image(price: f64) -> RowImage {
    let mut img = RowImage::new();
    img.insert("id".into(), serde_json::json!("K"));
    img.insert("price".into(), serde_json::json!(price));
    img
}

fn event(key: &str, seq: u64, op: Operation, price: Option<f64>, at_ms: i64) -> ChangeEvent {
    ChangeEvent {
        entity_key: key.to_string(),
        operation: op,
        before_image: None,
        after_image: price.map(image),
        sequence_number: seq,
        source_timestamp: ts(at_ms),
    }
}

fn lifecycle() -> Vec<ChangeEvent> {
    vec![
        event("K", 1, Operation::Create, Some(10.0), 100),
        event("K", 2, Operation::Update, Some(12.0), 200),
        event("K", 3, Operation::Delete, None, 300),
    ]
}

// ── CHN-01: Create → update → delete derives three chained versions ───────

#[test]
fn chn_01_lifecycle_derives_three_versions() {
    let records = chain::derive_versions("K", &lifecycle());

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].valid_from, ts(100));
    assert_eq!(records[0].valid_until, Some(ts(200)));
    assert_eq!(records[0].field_f64("price"), Some(10.0));
    assert_eq!(records[1].valid_from, ts(200));
    assert_eq!(records[1].valid_until, Some(ts(300)));
    assert_eq!(records[1].field_f64("price"), Some(12.0));
    assert!(records[2].is_tombstone());
    assert!(records[2].is_open());
    assert_eq!(records[2].valid_from, ts(300));
    chain::validate_chain(&records).unwrap();
}

// ── CHN-02: Arrival order does not change the derived chain ───────────────

#[test]
fn chn_02_arrival_order_does_not_matter() {
    let in_order = lifecycle();
    let shuffled = vec![
        event("K", 3, Operation::Delete, None, 300),
        event("K", 1, Operation::Create, Some(10.0), 100),
        event("K", 2, Operation::Update, Some(12.0), 200),
    ];

    assert_eq!(
        chain::derive_versions("K", &in_order),
        chain::derive_versions("K", &shuffled)
    );
}

// ── CHN-03: Duplicate sequences collapse, first arrival wins ──────────────

#[test]
fn chn_03_duplicate_sequence_first_arrival_wins() {
    let mut events = lifecycle();
    events.push(event("K", 2, Operation::Update, Some(99.0), 250));

    let records = chain::derive_versions("K", &events);
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].field_f64("price"), Some(12.0));
    assert_eq!(records[1].valid_from, ts(200));
}

// ── CHN-04: Identical timestamps produce a zero-width version ──────────────

#[test]
fn chn_04_zero_width_interval_emitted() {
    let events = vec![
        event("K", 1, Operation::Create, Some(10.0), 100),
        event("K", 2, Operation::Update, Some(11.0), 100),
        event("K", 3, Operation::Update, Some(12.0), 200),
    ];
    let records = chain::derive_versions("K", &events);

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].valid_from, records[0].valid_until.unwrap());
    // A zero-width interval exists in history but contains no instant.
    assert!(!records[0].contains(ts(100)));
    assert!(records[1].contains(ts(100)));
    chain::validate_chain(&records).unwrap();
}

// ── CHN-05: Snapshot opens a chain exactly like Create ─────────────────────

#[test]
fn chn_05_snapshot_chains_like_create() {
    let events = vec![
        event("K", 1, Operation::Snapshot, Some(5.0), 100),
        event("K", 2, Operation::Update, Some(6.0), 200),
    ];
    let records = chain::derive_versions("K", &events);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].operation, Operation::Snapshot);
    assert_eq!(records[0].valid_until, Some(ts(200)));
    assert_eq!(records[1].field_f64("price"), Some(6.0));
}

// ── CHN-06: Invalid operations never reach the chain ───────────────────────

#[test]
fn chn_06_invalid_operations_dropped() {
    let mut events = lifecycle();
    events.push(event("K", 4, Operation::Invalid, Some(1.0), 400));

    let records = chain::derive_versions("K", &events);
    assert_eq!(records.len(), 3);
    assert!(records[2].is_open());

    let only_invalid = vec![event("K", 1, Operation::Invalid, None, 100)];
    assert!(chain::derive_versions("K", &only_invalid).is_empty());
}

// ── CHN-07: Derivation filters to the requested key ────────────────────────

#[test]
fn chn_07_other_keys_ignored() {
    let mut events = lifecycle();
    events.push(event("L", 10, Operation::Create, Some(7.0), 150));

    let records = chain::derive_versions("K", &events);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.entity_key == "K"));
}

// ── CHN-08: validate_chain flags broken chains ─────────────────────────────

#[test]
fn chn_08_validate_chain_catches_violations() {
    let make = |seq: u64, from: i64, until: Option<i64>| VersionRecord {
        entity_key: "K".into(),
        sequence_number: seq,
        operation: Operation::Create,
        fields: Some(image(1.0)),
        valid_from: ts(from),
        valid_until: until.map(ts),
    };

    // Gap between adjacent intervals.
    let gapped = vec![make(1, 100, Some(200)), make(2, 250, None)];
    assert!(chain::validate_chain(&gapped).unwrap_err().contains("gap"));

    // Open tail in the middle.
    let two_open = vec![make(1, 100, None), make(2, 200, None)];
    assert!(chain::validate_chain(&two_open)
        .unwrap_err()
        .contains("open tail"));

    // Sequence order violated.
    let reordered = vec![make(2, 100, Some(200)), make(1, 200, None)];
    assert!(chain::validate_chain(&reordered)
        .unwrap_err()
        .contains("sequence order"));

    // valid_until before valid_from.
    let negative = vec![make(1, 200, Some(100))];
    assert!(chain::validate_chain(&negative)
        .unwrap_err()
        .contains("negative"));

    assert!(chain::validate_chain(&[]).is_ok());
}

// ── CHN-09: Stored history reconstructs the same chain ─────────────────────

#[test]
fn chn_09_history_round_trips_derivation() {
    let records = chain::derive_versions("K", &lifecycle());
    let rebuilt = chain::derive_versions("K", &chain::events_from_history(&records));
    assert_eq!(rebuilt, records);
}

// ── CHN-10: to_open_record maps events to open tails ───────────────────────

#[test]
fn chn_10_to_open_record() {
    let update = event("K", 7, Operation::Update, Some(3.5), 700);
    let record = chain::to_open_record(&update);
    assert_eq!(record.sequence_number, 7);
    assert_eq!(record.valid_from, ts(700));
    assert!(record.is_open());
    assert_eq!(record.field_f64("price"), Some(3.5));

    let delete = event("K", 8, Operation::Delete, None, 800);
    let tomb = chain::to_open_record(&delete);
    assert!(tomb.is_tombstone());
    assert!(tomb.is_open());
}

// ── PAR-01: Admission classifies in-order, duplicate, out-of-order ─────────

#[test]
fn par_01_admission_classification() {
    let partitioner = KeyPartitioner::new();

    let e1 = event("K", 1, Operation::Create, Some(1.0), 100);
    let e5 = event("K", 5, Operation::Update, Some(2.0), 500);
    let e3 = event("K", 3, Operation::Update, Some(3.0), 300);

    assert_eq!(partitioner.admit(&e1), Admission::InOrder);
    assert_eq!(partitioner.admit(&e5), Admission::InOrder);
    assert_eq!(partitioner.admit(&e5), Admission::Duplicate);
    assert_eq!(partitioner.admit(&e3), Admission::OutOfOrder);
    assert_eq!(partitioner.admit(&e1), Admission::Duplicate);

    // Keys are isolated: the same sequence on another key is fresh.
    let other = event("L", 1, Operation::Create, Some(1.0), 100);
    assert_eq!(partitioner.admit(&other), Admission::InOrder);
    assert_eq!(partitioner.key_count(), 2);
    assert_eq!(partitioner.applied_count("K"), 3);
}

// ── PAR-02: Revoke returns a sequence to admissible state ──────────────────

#[test]
fn par_02_revoke_allows_retry() {
    let partitioner = KeyPartitioner::new();
    let e1 = event("K", 1, Operation::Create, Some(1.0), 100);

    assert_eq!(partitioner.admit(&e1), Admission::InOrder);
    partitioner.revoke("K", 1);
    assert_eq!(partitioner.applied_count("K"), 0);
    assert_eq!(partitioner.admit(&e1), Admission::InOrder);
}

// ── PAR-03: Seeded state absorbs re-delivery after restart ─────────────────

#[test]
fn par_03_seed_absorbs_redelivery() {
    let partitioner = KeyPartitioner::new();
    partitioner.seed(vec![("K".to_string(), 1), ("K".to_string(), 2), ("L".to_string(), 7)]);

    assert_eq!(
        partitioner.admit(&event("K", 2, Operation::Update, Some(1.0), 200)),
        Admission::Duplicate
    );
    assert_eq!(
        partitioner.admit(&event("K", 3, Operation::Update, Some(2.0), 300)),
        Admission::InOrder
    );
    assert_eq!(partitioner.key_count(), 2);
}

// ── PAR-04: KeyBuffer drains in sequence order and rejects duplicates ──────

#[test]
fn par_04_key_buffer_orders_and_dedups() {
    let mut buffer = KeyBuffer::default();
    assert!(buffer.insert(event("K", 3, Operation::Update, Some(3.0), 300)));
    assert!(buffer.insert(event("K", 1, Operation::Create, Some(1.0), 100)));
    assert!(buffer.insert(event("K", 2, Operation::Update, Some(2.0), 200)));
    assert!(!buffer.insert(event("K", 2, Operation::Update, Some(9.0), 250)));
    assert_eq!(buffer.len(), 3);

    let drained = buffer.drain_ordered();
    let seqs: Vec<u64> = drained.iter().map(|e| e.sequence_number).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    // First arrival for sequence 2 won.
    assert_eq!(price_of(&drained[1]), Some(2.0));
    assert!(buffer.is_empty());
}

fn price_of(event: &ChangeEvent) -> Option<f64> {
    event
        .after_image
        .as_ref()
        .and_then(|img| img.get("price"))
        .and_then(serde_json::Value::as_f64)
}
