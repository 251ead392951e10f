//! # strata-temporal
//!
//! The materialization engine: change records in, a queryable Type 2
//! temporal table out. Decoding turns wire envelopes into [`ChangeEvent`]s,
//! the partitioner routes them by entity key and absorbs duplicates, and
//! the chain module derives non-overlapping `[valid_from, valid_until)`
//! intervals ordered by source sequence number.
//!
//! [`ChangeEvent`]: strata_core::models::ChangeEvent

pub mod chain;
pub mod decode;
pub mod engine;
pub mod partition;
pub mod query;

pub use decode::EventDecoder;
pub use engine::TemporalTable;
