/// Materialized-store errors.
///
/// An append failure means the triggering event was not consumed; the ingest
/// loop retries it before escalating.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("migration v{version} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("corrupt version row: {0}")]
    Corrupt(String),
}
