//! Persistence trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PersistenceError, Result};

/// Marker written and read back by the self-test
pub const PERSISTENCE_TEST_DATA: &str = "Dummy data to verify persistence";

/// File name of the isolated self-test location, next to the cache file
pub const PERSISTENCE_TEST_FILE: &str = "test.cache";

/// Self-test file name used when the cache file itself is named `test.cache`
pub const PERSISTENCE_ALTERNATE_TEST_FILE: &str = "test.cache.validation";

/// Trait for token cache persistence backends
#[async_trait]
pub trait CachePersistence: Send + Sync {
    /// Persist `contents`, replacing any previous value
    async fn save(&self, contents: &str) -> Result<()>;

    /// Load the most recently saved value, `None` if nothing is stored
    async fn load(&self) -> Result<Option<String>>;

    /// Delete the stored value, returning whether one existed
    async fn delete(&self) -> Result<bool>;

    /// Whether the cache location was modified after `last_sync`
    async fn reload_necessary(&self, last_sync: DateTime<Utc>) -> Result<bool>;

    /// Build a throwaway backend of the same kind at an isolated location
    async fn create_for_persistence_validation(&self) -> Result<Box<dyn CachePersistence>>;

    /// The cache location this backend is bound to
    fn storage_identity(&self) -> &Path;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;

    /// Write, read back and delete a marker on an isolated location
    async fn verify_persistence(&self) -> Result<bool> {
        let validator = self.create_for_persistence_validation().await?;

        round_trip(validator.as_ref()).await.map_err(|e| {
            PersistenceError::Verification(format!(
                "Verifying persistence failed with the error: {}",
                e
            ))
        })?;

        debug!("{} verified", self.backend_name());
        Ok(true)
    }
}

async fn round_trip(validator: &dyn CachePersistence) -> Result<()> {
    validator.save(PERSISTENCE_TEST_DATA).await?;

    let retrieved = validator.load().await?;
    match retrieved.as_deref() {
        None | Some("") => {
            return Err(PersistenceError::Verification(
                "Persistence check failed. Data was written but it could not be read. \
                 Possible cause: on Linux, LibSecret is installed but D-Bus isn't running \
                 because it cannot be started over SSH."
                    .to_string(),
            ));
        }
        Some(data) if data != PERSISTENCE_TEST_DATA => {
            return Err(PersistenceError::Verification(format!(
                "Persistence check failed. Data written {} is different from data read {}",
                PERSISTENCE_TEST_DATA, data
            )));
        }
        Some(_) => {}
    }

    validator.delete().await?;
    Ok(())
}

/// Location of the self-test file for a cache at `cache_path`
///
/// Never equal to `cache_path`.
pub(crate) fn validation_path(cache_path: &Path) -> PathBuf {
    let name = if cache_path.file_name() == Some(OsStr::new(PERSISTENCE_TEST_FILE)) {
        PERSISTENCE_ALTERNATE_TEST_FILE
    } else {
        PERSISTENCE_TEST_FILE
    };

    match cache_path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}
