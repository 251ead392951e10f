//! Change-event ingestion for strata.
//!
//! Wires a transport (NDJSON dumps, or an in-memory queue in tests) through
//! the envelope decoder into a temporal table, with retry backoff, cadenced
//! aggregate refreshes, and cooperative shutdown.

pub mod backoff;
pub mod ingest;
pub mod source;
pub mod telemetry;

pub use ingest::{IngestLoop, IngestStats};
pub use source::{MemorySource, NdjsonSource};
