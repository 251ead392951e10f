/// Transport boundary errors.
///
/// Retried with backoff by the ingest loop; fatal only after the configured
/// retry budget is exhausted.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad path pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("retry budget exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}
