//! In-memory record source for tests and embedded use.

use std::collections::VecDeque;

use strata_core::errors::TransportError;
use strata_core::traits::ITransport;

enum Item {
    Record(Vec<u8>),
    Failure(String),
}

/// Bounded in-memory queue of raw records, with injectable transport
/// failures: a queued failure makes exactly one pull return `Err`.
#[derive(Default)]
pub struct MemorySource {
    items: VecDeque<Item>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one serialized record.
    pub fn push_record(&mut self, raw: impl Into<Vec<u8>>) {
        self.items.push_back(Item::Record(raw.into()));
    }

    /// Queue a transport failure.
    pub fn push_failure(&mut self, reason: &str) {
        self.items.push_back(Item::Failure(reason.to_string()));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ITransport for MemorySource {
    async fn next_record(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.items.pop_front() {
            Some(Item::Record(raw)) => Ok(Some(raw)),
            Some(Item::Failure(reason)) => Err(TransportError::Fetch(reason)),
            None => Ok(None),
        }
    }
}
