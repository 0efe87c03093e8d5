//! Configuration for the query engine
//!
//! TOML-backed configuration with per-field defaults, covering the fetch
//! worker pool and the storage partitioning layout. The layout fields must
//! agree with what the storage collaborator reports at runtime; `validate`
//! catches the obviously inconsistent cases up front.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};

/// Top-level query engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerierConfig {
    /// Maximum number of concurrent in-flight storage fetches
    ///
    /// Bounds both memory and backend load; callers may not assume
    /// unlimited parallelism.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Storage partitioning layout
    #[serde(default)]
    pub layout: PartitionLayout,
}

/// Time partitioning layout of the backing store
///
/// Partitions are fixed, disjoint time sub-ranges of the retention window;
/// each subdivides into fixed-width chunk intervals.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartitionLayout {
    /// Width of one storage partition in milliseconds
    #[serde(default = "default_partition_size_ms")]
    pub partition_size_ms: i64,

    /// Width of one chunk interval inside a partition, in milliseconds
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: i64,
}

fn default_max_concurrent_fetches() -> usize {
    num_cpus::get()
}

fn default_partition_size_ms() -> i64 {
    24 * 60 * 60 * 1000 // one day
}

fn default_chunk_interval_ms() -> i64 {
    60 * 60 * 1000 // one hour
}

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            layout: PartitionLayout::default(),
        }
    }
}

impl Default for PartitionLayout {
    fn default() -> Self {
        Self {
            partition_size_ms: default_partition_size_ms(),
            chunk_interval_ms: default_chunk_interval_ms(),
        }
    }
}

impl QuerierConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: QuerierConfig = toml::from_str(input)
            .map_err(|e| QueryError::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(QueryError::Configuration(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        self.layout.validate()
    }
}

impl PartitionLayout {
    /// Check internal consistency of the partitioning metadata
    ///
    /// A layout the engine cannot interpret is a fatal configuration error,
    /// never a silent fallback.
    pub fn validate(&self) -> Result<()> {
        if self.partition_size_ms <= 0 {
            return Err(QueryError::Configuration(format!(
                "partition_size_ms must be positive, got {}",
                self.partition_size_ms
            )));
        }
        if self.chunk_interval_ms <= 0 {
            return Err(QueryError::Configuration(format!(
                "chunk_interval_ms must be positive, got {}",
                self.chunk_interval_ms
            )));
        }
        if self.chunk_interval_ms > self.partition_size_ms {
            return Err(QueryError::Configuration(format!(
                "chunk_interval_ms {} exceeds partition_size_ms {}",
                self.chunk_interval_ms, self.partition_size_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QuerierConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.max_concurrent_fetches >= 1);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = QuerierConfig::from_toml(
            r#"
            max_concurrent_fetches = 4

            [layout]
            partition_size_ms = 86400000
            chunk_interval_ms = 3600000
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(config.layout.chunk_interval_ms, 3_600_000);
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let layout = PartitionLayout {
            partition_size_ms: 1000,
            chunk_interval_ms: 0,
        };
        assert!(layout.validate().is_err());

        let layout = PartitionLayout {
            partition_size_ms: 1000,
            chunk_interval_ms: 2000,
        };
        assert!(layout.validate().is_err());
    }
}
