//! Reductions over the currently-valid rows.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use strata_core::errors::StrataResult;
use strata_core::models::{AggregateValue, Reducer, VersionRecord};
use strata_storage::queries::version_ops;

/// Reduce `field` across all currently-valid rows. Tombstones are alive in
/// the interval sense but carry no fields, so they contribute nothing.
pub fn currently_valid_aggregate(
    conn: &Connection,
    field: &str,
    reducer: Reducer,
    now: DateTime<Utc>,
) -> StrataResult<AggregateValue> {
    aggregate_where(conn, &|_| true, field, reducer, now)
}

/// Reduce `field` across the currently-valid rows matching `predicate`.
/// Rows without a numeric value for the field are skipped, Count included:
/// it counts rows that carry the field, not rows that exist.
pub fn aggregate_where(
    conn: &Connection,
    predicate: &dyn Fn(&VersionRecord) -> bool,
    field: &str,
    reducer: Reducer,
    now: DateTime<Utc>,
) -> StrataResult<AggregateValue> {
    let rows = version_ops::get_currently_valid(conn, now)?;
    let scanned = rows.len();
    let value = reducer.fold(
        rows.iter()
            .filter(|r| predicate(r))
            .filter_map(|r| r.field_f64(field)),
    );
    debug!(
        field,
        reducer = reducer.as_str(),
        scanned,
        "aggregated currently-valid rows"
    );
    Ok(value)
}
