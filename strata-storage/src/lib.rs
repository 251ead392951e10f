//! # strata-storage
//!
//! SQLite persistence layer for the materialized temporal table.
//! Single write connection + read pool (WAL mode); all multi-statement
//! mutations run in one transaction so readers never observe a key with
//! two open-ended tails.

pub mod migrations;
pub mod pool;
pub mod queries;

use chrono::{DateTime, SecondsFormat, Utc};

/// Helper to convert a string message into a StrataError::Storage.
pub fn to_storage_err(msg: String) -> strata_core::StrataError {
    strata_core::StrataError::Storage(strata_core::errors::StorageError::Sqlite(msg))
}

/// Timestamps are stored as RFC 3339 UTC with fixed millisecond precision so
/// TEXT comparison in SQL agrees with chronological order.
pub fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Inverse of [`ts_to_sql`].
pub fn ts_from_sql(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}
