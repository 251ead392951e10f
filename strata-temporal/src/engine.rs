//! TemporalTable — the central orchestrator behind [`ITemporalTable`].
//!
//! Owns the single write connection (every mutation), the read pool (every
//! query), and the partitioner state that keeps re-delivery idempotent.
//! Apply routing: in-order events take the O(1) close-and-append path,
//! late events trigger a per-key chain recompute, duplicates are absorbed.
//! Admission and the store write happen under one writer-lock acquisition,
//! so racing applies for the same key cannot commit in reverse admission
//! order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use strata_core::config::StrataConfig;
use strata_core::errors::StrataResult;
use strata_core::models::{
    AggregateValue, ApplyOutcome, ChangeEvent, Reducer, VersionRecord,
};
use strata_core::traits::ITemporalTable;
use strata_storage::pool::{ReadPool, WriteConnection};
use strata_storage::queries::version_ops::{self, AppendResult};

use crate::chain;
use crate::partition::{Admission, KeyBuffer, KeyPartitioner};
use crate::query;

/// Totals from one batch apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Distinct keys whose chains were rewritten.
    pub keys: usize,
    /// Records now stored for those keys.
    pub records: usize,
    /// Events absorbed as exact (key, sequence) duplicates.
    pub duplicates: usize,
    /// Events dropped for an invalid operation marker.
    pub invalid: usize,
}

/// The SQLite-backed Type 2 temporal table.
pub struct TemporalTable {
    pub(crate) writer: Arc<WriteConnection>,
    readers: Arc<ReadPool>,
    partitioner: KeyPartitioner,
    #[allow(dead_code)]
    config: StrataConfig,
}

impl TemporalTable {
    /// Open (or create) the table at `path`: run migrations on the write
    /// connection, open the read pool, and recover the partitioner's dedup
    /// state from whatever the store already holds.
    pub async fn open(path: &Path, config: StrataConfig) -> StrataResult<Self> {
        let writer = Arc::new(WriteConnection::open_with_timeout(
            path,
            config.storage.busy_timeout_ms,
        )?);
        let applied = writer
            .with_conn(strata_storage::migrations::run_migrations)
            .await?;
        let readers = Arc::new(ReadPool::open_with_timeout(
            path,
            config.storage.read_pool_size,
            config.storage.busy_timeout_ms,
        )?);

        let table = Self {
            writer,
            readers,
            partitioner: KeyPartitioner::new(),
            config,
        };
        let recovered = table.recover().await?;
        info!(
            path = %path.display(),
            migrations = applied,
            recovered,
            "temporal table opened"
        );
        Ok(table)
    }

    /// Assemble from pre-opened handles. Migrations must already have run;
    /// call [`recover`](Self::recover) if the database may hold records.
    pub fn new(
        writer: Arc<WriteConnection>,
        readers: Arc<ReadPool>,
        config: StrataConfig,
    ) -> Self {
        Self {
            writer,
            readers,
            partitioner: KeyPartitioner::new(),
            config,
        }
    }

    /// Seed the partitioner from stored (key, sequence) pairs so that
    /// re-delivery across a restart stays a no-op. Returns the pair count.
    pub async fn recover(&self) -> StrataResult<usize> {
        let pairs = self.readers.with_conn(version_ops::applied_sequences)?;
        let count = pairs.len();
        self.partitioner.seed(pairs);
        Ok(count)
    }

    /// Apply a whole batch, one chain derivation per key: group events,
    /// merge each group with the key's stored history, derive, rewrite.
    /// Bounded sources land here; the per-event path is
    /// [`ITemporalTable::apply_event`]. Admission happens per key, right
    /// before that key's rewrite, so a failed write leaves no other key's
    /// sequences marked applied.
    pub async fn apply_batch(&self, events: Vec<ChangeEvent>) -> StrataResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let mut groups: BTreeMap<String, KeyBuffer> = BTreeMap::new();

        for event in events {
            if !event.operation.is_chainable() {
                warn!(
                    key = %event.entity_key,
                    seq = event.sequence_number,
                    "dropping event with invalid operation marker"
                );
                outcome.invalid += 1;
                continue;
            }
            if !groups
                .entry(event.entity_key.clone())
                .or_default()
                .insert(event)
            {
                outcome.duplicates += 1;
            }
        }

        for (key, mut buffer) in groups {
            let events = buffer.drain_ordered();
            let (duplicates, written) = self
                .writer
                .with_conn(|conn| self.rewrite_group(conn, &key, events))
                .await?;
            outcome.duplicates += duplicates;
            if let Some(records) = written {
                outcome.keys += 1;
                outcome.records += records;
            }
        }

        debug!(
            keys = outcome.keys,
            records = outcome.records,
            duplicates = outcome.duplicates,
            invalid = outcome.invalid,
            "applied event batch"
        );
        Ok(outcome)
    }

    /// Reduce `field` over the currently-valid records matching `predicate`,
    /// all on one reader snapshot.
    pub fn aggregate_where<P>(
        &self,
        predicate: P,
        field: &str,
        reducer: Reducer,
        now: DateTime<Utc>,
    ) -> StrataResult<AggregateValue>
    where
        P: Fn(&VersionRecord) -> bool,
    {
        self.readers
            .with_conn(|conn| query::aggregate_where(conn, &predicate, field, reducer, now))
    }

    /// Validate every stored chain; empty means the table is sound.
    pub fn verify_integrity(&self) -> StrataResult<Vec<String>> {
        self.readers.with_conn(query::verify_store_integrity)
    }

    /// Total records in the store, all keys and versions included.
    pub fn record_count(&self) -> StrataResult<u64> {
        self.readers.with_conn(version_ops::count_records)
    }

    /// Admit one key's buffered events and rewrite its chain. Returns the
    /// duplicates absorbed and, when anything was admitted, the rewritten
    /// record count. A failed write revokes exactly the sequences this call
    /// admitted.
    fn rewrite_group(
        &self,
        conn: &Connection,
        key: &str,
        events: Vec<ChangeEvent>,
    ) -> StrataResult<(usize, Option<usize>)> {
        let mut duplicates = 0;
        let mut fresh = Vec::with_capacity(events.len());
        for event in events {
            match self.partitioner.admit(&event) {
                Admission::Duplicate => duplicates += 1,
                Admission::InOrder | Admission::OutOfOrder => fresh.push(event),
            }
        }
        if fresh.is_empty() {
            return Ok((duplicates, None));
        }

        let admitted: Vec<u64> = fresh.iter().map(|e| e.sequence_number).collect();
        match rewrite_merged(conn, key, fresh) {
            Ok(written) => Ok((duplicates, Some(written))),
            Err(e) => {
                for seq in admitted {
                    self.partitioner.revoke(key, seq);
                }
                Err(e)
            }
        }
    }

    fn apply_in_order(&self, conn: &Connection, event: &ChangeEvent) -> StrataResult<ApplyOutcome> {
        let record = chain::to_open_record(event);
        match version_ops::close_and_append(conn, &record) {
            Ok(AppendResult::Appended { closed_tail }) => {
                debug!(
                    key = %event.entity_key,
                    seq = event.sequence_number,
                    closed_tail,
                    "appended version"
                );
                Ok(ApplyOutcome::Applied { closed_tail })
            }
            Ok(AppendResult::Duplicate) => {
                // The unique constraint caught what the in-memory state
                // could not see (a fresh partitioner over an old file).
                debug!(
                    key = %event.entity_key,
                    seq = event.sequence_number,
                    "duplicate sequence absorbed by store"
                );
                Ok(ApplyOutcome::DuplicateAbsorbed)
            }
            Err(e) => {
                // Not consumed; the caller retries this event.
                self.partitioner
                    .revoke(&event.entity_key, event.sequence_number);
                Err(e)
            }
        }
    }

    fn apply_out_of_order(
        &self,
        conn: &Connection,
        event: &ChangeEvent,
    ) -> StrataResult<ApplyOutcome> {
        match rewrite_merged(conn, &event.entity_key, vec![event.clone()]) {
            Ok(records) => {
                debug!(
                    key = %event.entity_key,
                    seq = event.sequence_number,
                    records,
                    "late event rebuilt chain"
                );
                Ok(ApplyOutcome::Recomputed { records })
            }
            Err(e) => {
                self.partitioner
                    .revoke(&event.entity_key, event.sequence_number);
                Err(e)
            }
        }
    }
}

/// Merge fresh events into the key's stored history and rewrite the chain.
fn rewrite_merged(conn: &Connection, key: &str, fresh: Vec<ChangeEvent>) -> StrataResult<usize> {
    let history = version_ops::get_history(conn, key)?;
    let mut merged = chain::events_from_history(&history);
    merged.extend(fresh);
    let records = chain::derive_versions(key, &merged);
    version_ops::rewrite_key(conn, key, &records)
}

impl ITemporalTable for TemporalTable {
    async fn apply_event(&self, event: ChangeEvent) -> StrataResult<ApplyOutcome> {
        if !event.operation.is_chainable() {
            warn!(
                key = %event.entity_key,
                seq = event.sequence_number,
                "dropping event with invalid operation marker"
            );
            return Ok(ApplyOutcome::InvalidDropped);
        }

        // Classify and write without releasing the writer lock in between;
        // a racing apply for the same key sees the committed result.
        self.writer
            .with_conn(|conn| match self.partitioner.admit(&event) {
                Admission::Duplicate => {
                    debug!(
                        key = %event.entity_key,
                        seq = event.sequence_number,
                        "duplicate sequence absorbed"
                    );
                    Ok(ApplyOutcome::DuplicateAbsorbed)
                }
                Admission::InOrder => self.apply_in_order(conn, &event),
                Admission::OutOfOrder => self.apply_out_of_order(conn, &event),
            })
            .await
    }

    async fn point_in_time(
        &self,
        key: &str,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<VersionRecord>> {
        self.readers
            .with_conn(|conn| version_ops::get_point_in_time(conn, key, at))
    }

    async fn currently_valid(&self, now: DateTime<Utc>) -> StrataResult<Vec<VersionRecord>> {
        self.readers
            .with_conn(|conn| version_ops::get_currently_valid(conn, now))
    }

    async fn currently_valid_aggregate(
        &self,
        field: &str,
        reducer: Reducer,
        now: DateTime<Utc>,
    ) -> StrataResult<AggregateValue> {
        self.readers
            .with_conn(|conn| query::currently_valid_aggregate(conn, field, reducer, now))
    }

    async fn history(&self, key: &str) -> StrataResult<Vec<VersionRecord>> {
        self.readers
            .with_conn(|conn| version_ops::get_history(conn, key))
    }
}
