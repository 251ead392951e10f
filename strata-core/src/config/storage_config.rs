//! Materialized-store configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the SQLite-backed materialized store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Read-only connections kept open for queries.
    pub read_pool_size: usize,
    /// How long a connection waits on a locked database before erroring.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            read_pool_size: 2,
            busy_timeout_ms: 5_000,
        }
    }
}
