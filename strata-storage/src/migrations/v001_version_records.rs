//! v001: schema version tracking + the materialized version table.

use rusqlite::Connection;

use strata_core::StrataResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> StrataResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS version_records (
            record_id       INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_key      TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,
            operation       TEXT NOT NULL,
            fields          TEXT,
            valid_from      TEXT NOT NULL,
            valid_until     TEXT,
            UNIQUE(entity_key, sequence_number)
        );

        CREATE INDEX IF NOT EXISTS idx_versions_key_from
            ON version_records(entity_key, valid_from);
        CREATE INDEX IF NOT EXISTS idx_versions_until
            ON version_records(valid_until);
        CREATE INDEX IF NOT EXISTS idx_versions_open_tail
            ON version_records(entity_key) WHERE valid_until IS NULL;
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
