//! Decoder tests: envelope unwrapping, operation markers, key derivation,
//! and the decode-failure taxonomy.

use strata_core::config::DecoderConfig;
use strata_core::errors::DecodeError;
use strata_core::models::Operation;
use strata_temporal::EventDecoder;

fn decoder() -> EventDecoder {
    EventDecoder::new(&DecoderConfig::default())
}

// ── DEC-01: Bare record decodes to a Create event ──────────────────────────

#[test]
fn dec_01_bare_create() {
    let raw = serde_json::json!({
        "op": "c",
        "before": null,
        "after": {"id": "order-1", "price": 10.0},
        "source": {"lsn": 1, "ts_ms": 100}
    });
    let event = decoder().decode(raw.to_string().as_bytes()).unwrap();

    assert_eq!(event.operation, Operation::Create);
    assert_eq!(event.entity_key, "order-1");
    assert_eq!(event.sequence_number, 1);
    assert_eq!(event.source_timestamp.timestamp_millis(), 100);
    assert!(event.before_image.is_none());
    assert!(event.after_image.is_some());
}

// ── DEC-02: Broker delivery nests the record under "payload" ───────────────

#[test]
fn dec_02_payload_nesting() {
    let raw = serde_json::json!({
        "schema": {"type": "struct"},
        "payload": {
            "op": "u",
            "before": {"id": 7, "price": 1.0},
            "after": {"id": 7, "price": 2.0},
            "source": {"lsn": 42, "ts_ms": 2000}
        }
    });
    let event = decoder().decode(raw.to_string().as_bytes()).unwrap();

    assert_eq!(event.operation, Operation::Update);
    assert_eq!(event.entity_key, "7");
    assert_eq!(event.sequence_number, 42);
}

// ── DEC-03: Object-store dumps nest the record under "value" ───────────────

#[test]
fn dec_03_value_nesting() {
    let raw = serde_json::json!({
        "key": {"id": 7},
        "value": {
            "op": "r",
            "after": {"id": 7, "price": 3.0},
            "source": {"lsn": 5, "ts_ms": 500}
        }
    });
    let event = decoder().decode(raw.to_string().as_bytes()).unwrap();
    assert_eq!(event.operation, Operation::Snapshot);
}

// ── DEC-04: Delete derives its key from the before-image ───────────────────

#[test]
fn dec_04_delete_key_from_before_image() {
    let raw = serde_json::json!({
        "op": "d",
        "before": {"id": "order-9", "price": 4.0},
        "after": null,
        "source": {"lsn": 9, "ts_ms": 900}
    });
    let event = decoder().decode(raw.to_string().as_bytes()).unwrap();

    assert_eq!(event.operation, Operation::Delete);
    assert_eq!(event.entity_key, "order-9");
    assert!(event.after_image.is_none());
}

// ── DEC-05: Unknown markers decode as Invalid, not as an error ─────────────

#[test]
fn dec_05_unknown_marker_is_invalid_operation() {
    let raw = serde_json::json!({
        "op": "x",
        "after": {"id": "k"},
        "source": {"lsn": 1, "ts_ms": 100}
    });
    let event = decoder().decode(raw.to_string().as_bytes()).unwrap();
    assert_eq!(event.operation, Operation::Invalid);

    // Missing marker behaves the same way.
    let raw = serde_json::json!({
        "after": {"id": "k"},
        "source": {"lsn": 2, "ts_ms": 200}
    });
    let event = decoder().decode(raw.to_string().as_bytes()).unwrap();
    assert_eq!(event.operation, Operation::Invalid);
}

// ── DEC-06: Malformed input and missing fields fail loudly ─────────────────

#[test]
fn dec_06_decode_failures() {
    let d = decoder();

    assert!(matches!(
        d.decode(b"{not valid json"),
        Err(DecodeError::MalformedJson(_))
    ));

    // A JSON array is not a record envelope.
    assert!(matches!(
        d.decode(b"[1, 2, 3]"),
        Err(DecodeError::MissingRecord)
    ));

    // An object with neither marker nor source is not a record either.
    let bare = serde_json::json!({"id": "k"});
    assert!(matches!(
        d.decode(bare.to_string().as_bytes()),
        Err(DecodeError::MissingRecord)
    ));

    // No key field in either image.
    let keyless = serde_json::json!({
        "op": "c",
        "after": {"price": 1.0},
        "source": {"lsn": 1, "ts_ms": 100}
    });
    assert!(matches!(
        d.decode(keyless.to_string().as_bytes()),
        Err(DecodeError::MissingKey { .. })
    ));

    // No sequence.
    let unsequenced = serde_json::json!({
        "op": "c",
        "after": {"id": "k"},
        "source": {"ts_ms": 100}
    });
    assert!(matches!(
        d.decode(unsequenced.to_string().as_bytes()),
        Err(DecodeError::MissingSequence)
    ));

    // No timestamp.
    let untimed = serde_json::json!({
        "op": "c",
        "after": {"id": "k"},
        "source": {"lsn": 1}
    });
    assert!(matches!(
        d.decode(untimed.to_string().as_bytes()),
        Err(DecodeError::MissingTimestamp)
    ));

    // Create without an after-image cannot be materialized.
    let imageless = serde_json::json!({
        "op": "c",
        "before": {"id": "k"},
        "after": null,
        "source": {"lsn": 1, "ts_ms": 100}
    });
    assert!(matches!(
        d.decode(imageless.to_string().as_bytes()),
        Err(DecodeError::MissingImage { .. })
    ));
}

// ── DEC-07: Numeric and string keys normalize to the same text ─────────────

#[test]
fn dec_07_key_normalization() {
    let numeric = serde_json::json!({
        "op": "c",
        "after": {"id": 42, "price": 1.0},
        "source": {"lsn": 1, "ts_ms": 100}
    });
    let text = serde_json::json!({
        "op": "u",
        "after": {"id": "42", "price": 2.0},
        "source": {"lsn": 2, "ts_ms": 200}
    });

    let d = decoder();
    let first = d.decode(numeric.to_string().as_bytes()).unwrap();
    let second = d.decode(text.to_string().as_bytes()).unwrap();
    assert_eq!(first.entity_key, second.entity_key);
}

// ── DEC-08: The key field name is configurable ──────────────────────────────

#[test]
fn dec_08_configured_key_field() {
    let config = DecoderConfig {
        key_field: "order_id".to_string(),
    };
    let raw = serde_json::json!({
        "op": "c",
        "after": {"order_id": "A-1", "id": "ignored", "price": 1.0},
        "source": {"lsn": 1, "ts_ms": 100}
    });
    let event = EventDecoder::new(&config)
        .decode(raw.to_string().as_bytes())
        .unwrap();
    assert_eq!(event.entity_key, "A-1");
}

// ── DEC-09: Sequences past the storable range are rejected ──────────────────

#[test]
fn dec_09_sequence_above_signed_range_is_rejected() {
    let d = decoder();

    // The store's sequence column is signed; its ceiling still decodes.
    let at_limit = serde_json::json!({
        "op": "c",
        "after": {"id": "k", "price": 1.0},
        "source": {"lsn": i64::MAX as u64, "ts_ms": 100}
    });
    let event = d.decode(at_limit.to_string().as_bytes()).unwrap();
    assert_eq!(event.sequence_number, i64::MAX as u64);

    // One past it would wrap negative in storage and mis-sort the chain.
    let past_limit = serde_json::json!({
        "op": "c",
        "after": {"id": "k", "price": 1.0},
        "source": {"lsn": i64::MAX as u64 + 1, "ts_ms": 100}
    });
    assert!(matches!(
        d.decode(past_limit.to_string().as_bytes()),
        Err(DecodeError::SequenceOutOfRange { .. })
    ));
}
