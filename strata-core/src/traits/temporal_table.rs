//! ITemporalTable — the materialization and query surface.

use chrono::{DateTime, Utc};

use crate::errors::StrataResult;
use crate::models::{AggregateValue, ApplyOutcome, ChangeEvent, Reducer, VersionRecord};

/// The Type 2 temporal table: event application plus the embedded query
/// boundary exposed to external callers.
///
/// Implementations must keep queries read-consistent with the latest
/// completed append: a reader sees either the old open tail or the new
/// closed-plus-open pair, never both.
#[allow(async_fn_in_trait)]
pub trait ITemporalTable: Send + Sync {
    /// Feed one decoded event through partitioning and materialization.
    /// Duplicates and invalid operations are absorbed, not errors.
    ///
    /// Safe to call concurrently, including for the same key: an
    /// implementation must serialize same-key applies so classification
    /// and the store write cannot interleave across events.
    async fn apply_event(&self, event: ChangeEvent) -> StrataResult<ApplyOutcome>;

    /// The version of `key` whose validity interval contains `at`, if any.
    async fn point_in_time(
        &self,
        key: &str,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<VersionRecord>>;

    /// All records, across all keys, whose `valid_until` is open-ended or
    /// greater than `now`.
    async fn currently_valid(&self, now: DateTime<Utc>) -> StrataResult<Vec<VersionRecord>>;

    /// Reduce a business field over the currently-valid records, on a
    /// consistent read snapshot.
    async fn currently_valid_aggregate(
        &self,
        field: &str,
        reducer: Reducer,
        now: DateTime<Utc>,
    ) -> StrataResult<AggregateValue>;

    /// The full chain for `key` in ascending sequence order.
    async fn history(&self, key: &str) -> StrataResult<Vec<VersionRecord>>;
}
