//! Storage configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for sessions, scripts, prices and stats
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum wait between session flush passes, in milliseconds
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// First retry delay after a failed flush, in milliseconds
    #[serde(default = "default_retry_initial")]
    pub retry_initial_ms: u64,

    /// Upper bound for the doubling retry delay, in milliseconds
    #[serde(default = "default_retry_max")]
    pub retry_max_ms: u64,
}

impl StorageConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("storage.data_dir"));
        }
        if self.flush_interval_ms == 0 {
            return Err(ValidationError::InvalidTimeout("storage.flush_interval_ms"));
        }
        if self.retry_initial_ms == 0 || self.retry_initial_ms > self.retry_max_ms {
            return Err(ValidationError::InvalidTimeout("storage.retry_initial_ms"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval_ms: default_flush_interval(),
            retry_initial_ms: default_retry_initial(),
            retry_max_ms: default_retry_max(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_flush_interval() -> u64 {
    1_000
}

fn default_retry_initial() -> u64 {
    500
}

fn default_retry_max() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn retry_initial_cannot_exceed_max() {
        let config = StorageConfig {
            retry_initial_ms: 60_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
