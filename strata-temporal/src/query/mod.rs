//! Read-side queries over the materialized table.
//!
//! Everything here runs against a read-only pooled connection; the fetch
//! and any in-process fold share that connection, so each call sees one
//! consistent WAL snapshot.

pub mod aggregate;
pub mod integrity;

pub use aggregate::{aggregate_where, currently_valid_aggregate};
pub use integrity::verify_store_integrity;
