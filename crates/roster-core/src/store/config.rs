//! Store configuration.

use std::path::PathBuf;

use super::DEFAULT_COMMIT_LIMIT;
use crate::error::{Error, Result};

/// Configuration for [`SledDocumentStore`](super::SledDocumentStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the store directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush only on commit.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Open even when the directory does not exist yet.
    pub create_if_missing: bool,

    /// Maximum writes per atomic commit.
    pub commit_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            cache_capacity: 256 * 1024 * 1024, // 256MB
            flush_every_ms: Some(1000),
            compression: true,
            temporary: false,
            create_if_missing: false,
            commit_limit: DEFAULT_COMMIT_LIMIT,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary in-memory configuration for testing.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Default::default()
        }
    }

    /// Allow opening a store that does not exist yet.
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the per-commit write ceiling.
    pub fn with_commit_limit(mut self, limit: usize) -> Self {
        self.commit_limit = limit;
        self
    }

    /// Check that the store location is configured before anything opens it.
    pub fn validate(&self) -> Result<()> {
        if self.temporary {
            return Ok(());
        }
        if self.path.as_os_str().is_empty() {
            return Err(Error::missing("store data path"));
        }
        if !self.create_if_missing && !self.path.exists() {
            return Err(Error::missing(format!(
                "store data path {} does not exist",
                self.path.display()
            )));
        }
        if self.commit_limit == 0 {
            return Err(Error::InvalidConfiguration(
                "commit limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_is_configuration_missing() {
        let err = StoreConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_absent_directory_requires_create_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");

        assert!(matches!(
            StoreConfig::new(&path).validate(),
            Err(Error::ConfigurationMissing { .. })
        ));
        assert!(StoreConfig::new(&path)
            .with_create_if_missing(true)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_temporary_always_valid() {
        assert!(StoreConfig::temporary().validate().is_ok());
    }
}
