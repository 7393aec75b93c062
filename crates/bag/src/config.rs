//! Configuration for dataset creation and metadata import.

use serde::{Deserialize, Serialize};

/// Storage settings applied to layers created by a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BagConfig {
    /// Compression level for new layers (0-9, 0 disables compression).
    pub compression_level: u8,

    /// Chunk edge length for new layers (0 stores layers unchunked).
    pub chunk_size: u32,

    /// Validate metadata records before creating a dataset.
    pub validate_metadata: bool,
}

impl Default for BagConfig {
    fn default() -> Self {
        Self {
            compression_level: 1,
            chunk_size: 100,
            validate_metadata: true,
        }
    }
}

impl BagConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("BAG_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("BAG_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("BAG_VALIDATE_METADATA") {
            config.validate_metadata = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.compression_level > 9 {
            return Err("compression_level must be 0-9".to_string());
        }

        Ok(())
    }

    /// Chunk shape for a new `(rows, cols)` layer, clamped to the grid.
    pub fn chunk_dims(&self, dims: (u32, u32)) -> Option<(u32, u32)> {
        if self.chunk_size == 0 {
            return None;
        }
        Some((
            self.chunk_size.min(dims.0.max(1)),
            self.chunk_size.min(dims.1.max(1)),
        ))
    }

    /// Metadata import settings derived from this configuration.
    pub fn import_config(&self) -> ImportConfig {
        ImportConfig {
            validate: self.validate_metadata,
        }
    }
}

/// Settings for the metadata XML importer, passed explicitly per call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Reject records whose grid description is unusable.
    pub validate: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { validate: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BagConfig::default();
        assert_eq!(config.compression_level, 1);
        assert_eq!(config.chunk_size, 100);
        assert!(config.validate_metadata);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = BagConfig {
            compression_level: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_dims() {
        let config = BagConfig::default();
        assert_eq!(config.chunk_dims((1000, 40)), Some((100, 40)));

        let unchunked = BagConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(unchunked.chunk_dims((1000, 40)), None);
    }

    #[test]
    fn test_import_config_follows_validation_flag() {
        let config = BagConfig {
            validate_metadata: false,
            ..Default::default()
        };
        assert!(!config.import_config().validate);
    }
}
