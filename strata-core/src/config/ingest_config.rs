//! Ingest loop configuration.

use serde::{Deserialize, Serialize};

use crate::models::Reducer;

/// Configuration for the ingest loop: retry policy and the periodic
/// aggregate refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Attempts per transport fetch or store append before giving up.
    pub retry_limit: u32,
    /// Base delay between retries; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// Ceiling for the doubled delay.
    pub retry_backoff_max_ms: u64,
    /// Cadence of the currently-valid aggregate refresh. 0 disables it.
    pub refresh_interval_secs: u64,
    /// Business field the refresh reduces over.
    pub aggregate_field: String,
    /// Reduction applied on refresh.
    pub aggregate_reducer: Reducer,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            retry_limit: 5,
            retry_backoff_ms: 200,
            retry_backoff_max_ms: 10_000,
            refresh_interval_secs: 10,
            aggregate_field: "price".to_string(),
            aggregate_reducer: Reducer::Sum,
        }
    }
}
