mod aggregate;
mod change_event;
mod version_record;

pub use aggregate::{AggregateValue, Reducer};
pub use change_event::{ChangeEvent, Operation, RowImage};
pub use version_record::{ApplyOutcome, VersionRecord};
