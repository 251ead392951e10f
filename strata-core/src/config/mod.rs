pub mod decoder_config;
pub mod ingest_config;
pub mod storage_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub use decoder_config::DecoderConfig;
pub use ingest_config::IngestConfig;
pub use storage_config::StorageConfig;

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StrataConfig {
    pub decoder: DecoderConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
}

impl StrataConfig {
    /// Load config from a TOML string, falling back to defaults for missing
    /// fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Reject values that would wedge the engine at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decoder.key_field.is_empty() {
            return Err(ConfigError::Invalid("decoder.key_field is empty".into()));
        }
        if self.storage.read_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "storage.read_pool_size must be at least 1".into(),
            ));
        }
        if self.ingest.retry_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "ingest.retry_backoff_ms must be nonzero".into(),
            ));
        }
        if self.ingest.retry_backoff_max_ms < self.ingest.retry_backoff_ms {
            return Err(ConfigError::Invalid(
                "ingest.retry_backoff_max_ms is below the base backoff".into(),
            ));
        }
        Ok(())
    }
}
