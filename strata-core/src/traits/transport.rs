//! ITransport — the pull-style record source boundary.

use crate::errors::TransportError;

/// A pull-style iterator over raw serialized change records.
///
/// Delivery is at-least-once with no ordering guarantee across keys; within
/// a key, sequence numbers are monotonic once decoded. Consumers must
/// therefore tolerate redelivery and reordering, which the partitioner's
/// deduplication rule makes safe.
#[allow(async_fn_in_trait)]
pub trait ITransport: Send {
    /// Pull the next raw record. `Ok(None)` signals the end of a bounded
    /// source; unbounded sources simply await the next record.
    async fn next_record(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}
