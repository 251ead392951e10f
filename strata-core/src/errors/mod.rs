mod config_error;
mod decode_error;
mod storage_error;
mod strata_error;
mod transport_error;

pub use config_error::ConfigError;
pub use decode_error::DecodeError;
pub use storage_error::StorageError;
pub use strata_error::{StrataError, StrataResult};
pub use transport_error::TransportError;
