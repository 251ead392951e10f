//! The ingest loop: transport → decoder → temporal table.
//!
//! Pulls until the source is exhausted or a shutdown signal arrives.
//! Transport failures and store write failures are retried on the same
//! doubling backoff schedule, fatal once the retry budget is spent; decode
//! failures and invalid operations only cost the one record. The in-flight
//! event is always either fully applied or not applied at all.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use strata_core::config::StrataConfig;
use strata_core::errors::{StrataResult, TransportError};
use strata_core::models::{ApplyOutcome, ChangeEvent};
use strata_core::traits::{ITemporalTable, ITransport};
use strata_temporal::EventDecoder;

use crate::backoff::Backoff;

/// Counters accumulated over one [`IngestLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Raw records pulled off the transport.
    pub pulled: u64,
    /// Records that decoded into an event.
    pub decoded: u64,
    /// Events materialized (append or rebuild).
    pub applied: u64,
    /// Subset of `applied` that rebuilt a key's chain.
    pub recomputed: u64,
    /// Events absorbed as exact duplicates.
    pub duplicates: u64,
    /// Events dropped for an invalid operation marker.
    pub invalid: u64,
    /// Records skipped because they would not decode.
    pub decode_failures: u64,
    /// Failed attempts that were retried (transport and store together).
    pub retries: u64,
    /// Aggregate refreshes run, the end-of-stream one included.
    pub refreshes: u64,
}

/// Drives one transport into one temporal table.
pub struct IngestLoop {
    decoder: EventDecoder,
    config: StrataConfig,
}

impl IngestLoop {
    pub fn new(config: StrataConfig) -> Self {
        Self {
            decoder: EventDecoder::new(&config.decoder),
            config,
        }
    }

    /// Pull, decode, and apply until end-of-stream or shutdown, refreshing
    /// the configured aggregate on its cadence. Returns the accumulated
    /// stats; a spent retry budget surfaces as the fatal error instead.
    pub async fn run<T, S>(
        &self,
        mut transport: T,
        table: &S,
        mut shutdown: watch::Receiver<bool>,
    ) -> StrataResult<IngestStats>
    where
        T: ITransport,
        S: ITemporalTable,
    {
        let ingest = &self.config.ingest;
        let mut stats = IngestStats::default();
        let mut refresh = refresh_timer(ingest.refresh_interval_secs);
        let mut pull_backoff = Backoff::new(ingest.retry_backoff_ms, ingest.retry_backoff_max_ms);

        info!(
            retry_limit = ingest.retry_limit,
            refresh_interval_secs = ingest.refresh_interval_secs,
            "ingest loop started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as a shutdown request.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown signal received");
                        break;
                    }
                }
                _ = tick(&mut refresh) => {
                    self.refresh_aggregate(table, &mut stats).await?;
                }
                result = transport.next_record() => match result {
                    Ok(Some(raw)) => {
                        pull_backoff.reset();
                        stats.pulled += 1;
                        self.ingest_record(&raw, table, &mut stats).await?;
                    }
                    Ok(None) => {
                        info!("transport exhausted");
                        break;
                    }
                    Err(e) => {
                        let delay = pull_backoff.next_delay();
                        stats.retries += 1;
                        if pull_backoff.attempts() >= ingest.retry_limit {
                            warn!(
                                error = %e,
                                attempts = pull_backoff.attempts(),
                                "transport retry budget exhausted"
                            );
                            return Err(TransportError::RetriesExhausted {
                                attempts: pull_backoff.attempts(),
                            }
                            .into());
                        }
                        warn!(
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "transport fetch failed; backing off"
                        );
                        time::sleep(delay).await;
                    }
                },
            }
        }

        self.refresh_aggregate(table, &mut stats).await?;
        info!(?stats, "ingest loop stopped");
        Ok(stats)
    }

    async fn ingest_record<S: ITemporalTable>(
        &self,
        raw: &[u8],
        table: &S,
        stats: &mut IngestStats,
    ) -> StrataResult<()> {
        let event = match self.decoder.decode(raw) {
            Ok(event) => event,
            Err(e) => {
                stats.decode_failures += 1;
                warn!(error = %e, "skipping undecodable record");
                return Ok(());
            }
        };
        stats.decoded += 1;
        self.apply_with_retry(event, table, stats).await
    }

    /// A store write failure leaves the event unconsumed, so it is retried
    /// as-is on the same backoff schedule as the transport.
    async fn apply_with_retry<S: ITemporalTable>(
        &self,
        event: ChangeEvent,
        table: &S,
        stats: &mut IngestStats,
    ) -> StrataResult<()> {
        let ingest = &self.config.ingest;
        let mut backoff = Backoff::new(ingest.retry_backoff_ms, ingest.retry_backoff_max_ms);

        loop {
            match table.apply_event(event.clone()).await {
                Ok(outcome) => {
                    match outcome {
                        ApplyOutcome::Applied { .. } => stats.applied += 1,
                        ApplyOutcome::Recomputed { .. } => {
                            stats.applied += 1;
                            stats.recomputed += 1;
                        }
                        ApplyOutcome::DuplicateAbsorbed => {
                            stats.duplicates += 1;
                            debug!(
                                key = %event.entity_key,
                                seq = event.sequence_number,
                                "duplicate absorbed"
                            );
                        }
                        ApplyOutcome::InvalidDropped => stats.invalid += 1,
                    }
                    return Ok(());
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    stats.retries += 1;
                    if backoff.attempts() >= ingest.retry_limit {
                        warn!(
                            error = %e,
                            attempts = backoff.attempts(),
                            key = %event.entity_key,
                            seq = event.sequence_number,
                            "store retry budget exhausted"
                        );
                        return Err(e);
                    }
                    warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "apply failed; backing off"
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }

    async fn refresh_aggregate<S: ITemporalTable>(
        &self,
        table: &S,
        stats: &mut IngestStats,
    ) -> StrataResult<()> {
        let ingest = &self.config.ingest;
        let value = table
            .currently_valid_aggregate(
                &ingest.aggregate_field,
                ingest.aggregate_reducer,
                Utc::now(),
            )
            .await?;
        stats.refreshes += 1;
        info!(
            field = %ingest.aggregate_field,
            reducer = ingest.aggregate_reducer.as_str(),
            value = ?value,
            "aggregate refresh"
        );
        Ok(())
    }
}

/// Cadenced refresh timer; `None` when disabled. The first tick fires one
/// full period in, not immediately.
fn refresh_timer(interval_secs: u64) -> Option<Interval> {
    if interval_secs == 0 {
        return None;
    }
    let period = Duration::from_secs(interval_secs);
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(interval)
}

/// Tick the timer, or wait forever when the refresh is disabled.
async fn tick(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
