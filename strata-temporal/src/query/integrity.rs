//! Store-wide invariant checks, for tests and operator diagnostics.

use rusqlite::Connection;

use strata_core::errors::StrataResult;
use strata_storage::queries::version_ops;

use crate::chain;

/// Walk every key's chain and validate it: ascending sequences, gap-free
/// adjacent intervals, at most one open tail per key and only at the end.
/// Returns one message per violation; empty means the table is sound.
pub fn verify_store_integrity(conn: &Connection) -> StrataResult<Vec<String>> {
    let mut violations = Vec::new();
    for key in version_ops::distinct_keys(conn)? {
        let history = version_ops::get_history(conn, &key)?;
        if let Err(violation) = chain::validate_chain(&history) {
            violations.push(format!("key {key}: {violation}"));
        }
    }
    Ok(violations)
}
