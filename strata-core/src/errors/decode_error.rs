/// Raw-record decoding errors.
///
/// A decode failure skips the offending record; it never halts the ingest
/// loop.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed json: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("envelope carries no record object")]
    MissingRecord,

    #[error("no image carries key field '{key_field}'")]
    MissingKey { key_field: String },

    #[error("missing or malformed sequence number")]
    MissingSequence,

    #[error("sequence number {sequence} exceeds the storable range")]
    SequenceOutOfRange { sequence: u64 },

    #[error("missing or malformed source timestamp")]
    MissingTimestamp,

    #[error("{operation} record has no after-image")]
    MissingImage { operation: String },
}
