//! Connection pool — single writer + read pool with round-robin selection.
//!
//! The only place in the workspace that holds `Mutex<Connection>`. All other
//! code reaches SQLite through `with_conn` closures.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;

use rusqlite::{Connection, OpenFlags};
use tokio::sync::Mutex;

use strata_core::errors::StorageError;
use strata_core::{StrataError, StrataResult};

/// Default number of reader connections.
const DEFAULT_READ_POOL_SIZE: usize = 2;

/// Default lock-contention timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

fn pool_err(msg: String) -> StrataError {
    StorageError::Pool(msg).into()
}

/// Apply production PRAGMAs to a fresh connection:
/// WAL for concurrent readers during writes, busy_timeout as the primary
/// lock-contention mechanism, NORMAL synchronous for the WAL durability
/// trade-off.
fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> StrataResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = {busy_timeout_ms};
        PRAGMA cache_size = -8000;
        PRAGMA mmap_size = 268435456;
        PRAGMA temp_store = MEMORY;
        ",
    ))
    .map_err(|e| pool_err(format!("configure connection: {e}")))
}

/// Same PRAGMAs plus `query_only = ON` so a reader can never mutate.
fn configure_readonly_connection(conn: &Connection, busy_timeout_ms: u64) -> StrataResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = {busy_timeout_ms};
        PRAGMA cache_size = -8000;
        PRAGMA mmap_size = 268435456;
        PRAGMA temp_store = MEMORY;
        PRAGMA query_only = ON;
        ",
    ))
    .map_err(|e| pool_err(format!("configure readonly connection: {e}")))
}

/// The single write connection. Every mutation goes through here; WAL mode
/// lets the read pool proceed concurrently.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    /// Open (or create) the database at `path` with write PRAGMAs applied.
    pub fn open(path: &Path) -> StrataResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// As [`WriteConnection::open`] with an explicit busy timeout.
    pub fn open_with_timeout(path: &Path, busy_timeout_ms: u64) -> StrataResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| pool_err(format!("open writer at {}: {e}", path.display())))?;
        configure_connection(&conn, busy_timeout_ms)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the write connection from async context.
    pub async fn with_conn<T, F>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&Connection) -> StrataResult<T>,
    {
        let conn = self.conn.lock().await;
        f(&conn)
    }

    /// Synchronous variant for non-async callers. Must not be called from
    /// inside a tokio runtime; `blocking_lock` panics there.
    pub fn with_conn_sync<T, F>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&Connection) -> StrataResult<T>,
    {
        let conn = self.conn.blocking_lock();
        f(&conn)
    }
}

/// Fixed set of read-only connections with round-robin selection.
pub struct ReadPool {
    readers: Vec<StdMutex<Connection>>,
    read_index: AtomicUsize,
}

impl ReadPool {
    /// Open `size` read-only connections against an existing database.
    /// The writer must have been opened first: a fresh database file only
    /// exists (and is already in WAL mode) after that.
    pub fn open(path: &Path, size: usize) -> StrataResult<Self> {
        Self::open_with_timeout(path, size, DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// As [`ReadPool::open`] with an explicit busy timeout.
    pub fn open_with_timeout(
        path: &Path,
        size: usize,
        busy_timeout_ms: u64,
    ) -> StrataResult<Self> {
        let size = if size == 0 { DEFAULT_READ_POOL_SIZE } else { size };

        let mut readers = Vec::with_capacity(size);
        for i in 0..size {
            let reader = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| pool_err(format!("open reader {i} at {}: {e}", path.display())))?;
            configure_readonly_connection(&reader, busy_timeout_ms)?;
            readers.push(StdMutex::new(reader));
        }

        Ok(Self {
            readers,
            read_index: AtomicUsize::new(0),
        })
    }

    /// Run a closure against a reader connection (round-robin).
    pub fn with_conn<T, F>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&Connection) -> StrataResult<T>,
    {
        let index = self.read_index.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[index]
            .lock()
            .map_err(|e| pool_err(format!("reader lock poisoned: {e}")))?;
        f(&conn)
    }

    /// Number of reader connections.
    pub fn size(&self) -> usize {
        self.readers.len()
    }
}
