//! Transport sources: where raw change records come from.

mod memory;
mod ndjson;

pub use memory::MemorySource;
pub use ndjson::NdjsonSource;
