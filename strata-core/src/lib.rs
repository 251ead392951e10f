//! # strata-core
//!
//! Foundation crate for the strata temporal materialization engine.
//! Defines the shared data model, error taxonomy, configuration, and the
//! boundary traits every other crate in the workspace builds against.

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::StrataConfig;
pub use errors::{StrataError, StrataResult};
pub use models::{AggregateValue, ApplyOutcome, ChangeEvent, Operation, Reducer, VersionRecord};
pub use traits::{ITemporalTable, ITransport};
