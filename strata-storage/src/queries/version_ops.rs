//! Raw SQL operations for the version_records table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use strata_core::errors::StorageError;
use strata_core::models::{Operation, RowImage, VersionRecord};
use strata_core::{StrataError, StrataResult};

use crate::{to_storage_err, ts_from_sql, ts_to_sql};

/// Outcome of a transactional close-and-append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// Record inserted; whether an open tail was closed first.
    Appended { closed_tail: bool },
    /// The (key, sequence) pair already exists; nothing changed.
    Duplicate,
}

const SELECT_COLS: &str = "entity_key, sequence_number, operation, fields, valid_from, valid_until";

/// Raw version row, timestamps still TEXT.
#[derive(Debug, Clone)]
struct RawVersion {
    entity_key: String,
    sequence_number: i64,
    operation: String,
    fields: Option<String>,
    valid_from: String,
    valid_until: Option<String>,
}

fn corrupt(msg: String) -> StrataError {
    StrataError::Storage(StorageError::Corrupt(msg))
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> Result<RawVersion, rusqlite::Error> {
    Ok(RawVersion {
        entity_key: row.get(0)?,
        sequence_number: row.get(1)?,
        operation: row.get(2)?,
        fields: row.get(3)?,
        valid_from: row.get(4)?,
        valid_until: row.get(5)?,
    })
}

fn raw_to_record(raw: RawVersion) -> StrataResult<VersionRecord> {
    let operation = Operation::from_name(&raw.operation)
        .ok_or_else(|| corrupt(format!("unknown operation '{}'", raw.operation)))?;
    let fields: Option<RowImage> = match raw.fields {
        Some(json) => Some(
            serde_json::from_str(&json)
                .map_err(|e| corrupt(format!("fields json for '{}': {e}", raw.entity_key)))?,
        ),
        None => None,
    };
    let valid_from = ts_from_sql(&raw.valid_from)
        .map_err(|e| corrupt(format!("valid_from for '{}': {e}", raw.entity_key)))?;
    let valid_until = match raw.valid_until {
        Some(ts) => Some(
            ts_from_sql(&ts)
                .map_err(|e| corrupt(format!("valid_until for '{}': {e}", raw.entity_key)))?,
        ),
        None => None,
    };

    Ok(VersionRecord {
        entity_key: raw.entity_key,
        sequence_number: raw.sequence_number as u64,
        operation,
        fields,
        valid_from,
        valid_until,
    })
}

/// Insert one record. The UNIQUE(entity_key, sequence_number) constraint is
/// the idempotence backstop even when in-memory dedup state was lost;
/// a duplicate insert reports `false` instead of erroring.
fn insert_record(conn: &Connection, record: &VersionRecord) -> StrataResult<bool> {
    let fields_json = match &record.fields {
        Some(map) => Some(serde_json::to_string(map)?),
        None => None,
    };
    // Sequences order the chain through a signed column; a wrapped value
    // would silently mis-sort every read.
    let sequence = i64::try_from(record.sequence_number).map_err(|_| {
        to_storage_err(format!(
            "sequence {} exceeds the storable range",
            record.sequence_number
        ))
    })?;

    let result = conn.execute(
        "INSERT INTO version_records
            (entity_key, sequence_number, operation, fields, valid_from, valid_until)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.entity_key,
            sequence,
            record.operation.as_str(),
            fields_json,
            ts_to_sql(record.valid_from),
            record.valid_until.map(ts_to_sql),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(to_storage_err(e.to_string())),
    }
}

/// Close the key's open tail at `record.valid_from` (if one exists) and
/// insert `record`, in a single transaction. A reader sees either the old
/// tail or the closed-plus-open pair, never two open tails.
pub fn close_and_append(conn: &Connection, record: &VersionRecord) -> StrataResult<AppendResult> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(e.to_string()))?;

    let closed = tx
        .execute(
            "UPDATE version_records SET valid_until = ?1
             WHERE entity_key = ?2 AND valid_until IS NULL",
            params![ts_to_sql(record.valid_from), record.entity_key],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    if !insert_record(&tx, record)? {
        // Duplicate sequence: the tail-close must roll back with it.
        tx.rollback().map_err(|e| to_storage_err(e.to_string()))?;
        return Ok(AppendResult::Duplicate);
    }

    tx.commit().map_err(|e| to_storage_err(e.to_string()))?;
    Ok(AppendResult::Appended {
        closed_tail: closed > 0,
    })
}

/// Replace the whole chain for `key`, in a single transaction.
/// History is preserved in the new chain; this is the out-of-order
/// recompute path, not a user-facing delete.
pub fn rewrite_key(
    conn: &Connection,
    key: &str,
    records: &[VersionRecord],
) -> StrataResult<usize> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(e.to_string()))?;

    tx.execute(
        "DELETE FROM version_records WHERE entity_key = ?1",
        params![key],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    for record in records {
        if !insert_record(&tx, record)? {
            // Chain derivation guarantees distinct sequences; hitting the
            // constraint here means the caller handed us a malformed chain.
            tx.rollback().map_err(|e| to_storage_err(e.to_string()))?;
            return Err(corrupt(format!(
                "duplicate sequence {} in rewrite of '{key}'",
                record.sequence_number
            )));
        }
    }

    tx.commit().map_err(|e| to_storage_err(e.to_string()))?;
    Ok(records.len())
}

/// The version of `key` whose interval contains `at`, if any.
/// `valid_from` is inclusive, `valid_until` exclusive, so zero-width
/// intervals match no instant.
pub fn get_point_in_time(
    conn: &Connection,
    key: &str,
    at: DateTime<Utc>,
) -> StrataResult<Option<VersionRecord>> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLS} FROM version_records
                 WHERE entity_key = ?1 AND valid_from <= ?2
                   AND (valid_until IS NULL OR valid_until > ?2)
                 ORDER BY sequence_number DESC LIMIT 1"
            ),
            params![key, ts_to_sql(at)],
            row_to_raw,
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    raw.map(raw_to_record).transpose()
}

/// All records, across all keys, whose `valid_until` is open-ended or
/// greater than `now`.
pub fn get_currently_valid(
    conn: &Connection,
    now: DateTime<Utc>,
) -> StrataResult<Vec<VersionRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SELECT_COLS} FROM version_records
             WHERE valid_until IS NULL OR valid_until > ?1
             ORDER BY entity_key ASC, sequence_number ASC"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![ts_to_sql(now)], row_to_raw)
        .map_err(|e| to_storage_err(e.to_string()))?;

    rows.map(|raw| raw_to_record(raw.map_err(|e| to_storage_err(e.to_string()))?))
        .collect()
}

/// The full chain for `key` in ascending sequence order.
pub fn get_history(conn: &Connection, key: &str) -> StrataResult<Vec<VersionRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SELECT_COLS} FROM version_records
             WHERE entity_key = ?1
             ORDER BY sequence_number ASC"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![key], row_to_raw)
        .map_err(|e| to_storage_err(e.to_string()))?;

    rows.map(|raw| raw_to_record(raw.map_err(|e| to_storage_err(e.to_string()))?))
        .collect()
}

/// The key's open-ended tail, if one exists.
pub fn get_open_tail(conn: &Connection, key: &str) -> StrataResult<Option<VersionRecord>> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLS} FROM version_records
                 WHERE entity_key = ?1 AND valid_until IS NULL"
            ),
            params![key],
            row_to_raw,
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    raw.map(raw_to_record).transpose()
}

/// Every (key, sequence) pair in the store, for partitioner recovery.
pub fn applied_sequences(conn: &Connection) -> StrataResult<Vec<(String, u64)>> {
    let mut stmt = conn
        .prepare(
            "SELECT entity_key, sequence_number FROM version_records
             ORDER BY entity_key ASC, sequence_number ASC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

/// Every distinct entity key in the store.
pub fn distinct_keys(conn: &Connection) -> StrataResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT entity_key FROM version_records ORDER BY entity_key ASC")
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

/// Whether a (key, sequence) pair is already materialized.
pub fn record_exists(conn: &Connection, key: &str, sequence: u64) -> StrataResult<bool> {
    conn.prepare(
        "SELECT 1 FROM version_records WHERE entity_key = ?1 AND sequence_number = ?2",
    )
    .and_then(|mut stmt| stmt.exists(params![key, sequence as i64]))
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Total record count across all keys.
pub fn count_records(conn: &Connection) -> StrataResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM version_records", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|c| c as u64)
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Open tails for one key. Anything above 1 is an invariant violation.
pub fn count_open_tails(conn: &Connection, key: &str) -> StrataResult<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM version_records WHERE entity_key = ?1 AND valid_until IS NULL",
        params![key],
        |row| row.get::<_, i64>(0),
    )
    .map(|c| c as u64)
    .map_err(|e| to_storage_err(e.to_string()))
}
