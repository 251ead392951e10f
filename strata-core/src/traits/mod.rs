mod temporal_table;
mod transport;

pub use temporal_table::ITemporalTable;
pub use transport::ITransport;
