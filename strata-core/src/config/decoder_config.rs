//! Event decoder configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the change-record decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Name of the primary-key field inside the row images.
    pub key_field: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            key_field: "id".to_string(),
        }
    }
}
