//! Plain file persistence
//!
//! Stores the cache contents unprotected at the configured path. Used as the
//! Linux fallback and as the file half of the other backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use zeroize::Zeroizing;

use super::traits::{validation_path, CachePersistence};
use crate::config::LoggerOptions;
use crate::error::{PersistenceError, Result};

/// Plain file persistence backend
#[derive(Debug, Clone)]
pub struct FilePersistence {
    /// Path of the cache file
    file_path: PathBuf,
    /// Logging behaviour
    logger_options: LoggerOptions,
}

impl FilePersistence {
    /// Create a file persistence bound to `file_path`
    ///
    /// The parent directory is created if missing; the file itself is only
    /// created by the first save.
    pub async fn create(file_path: impl Into<PathBuf>, logger_options: LoggerOptions) -> Result<Self> {
        let file_path = file_path.into();

        if let Some(dir) = file_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PersistenceError::BackendWrite(format!("Could not create cache directory: {}", e))
            })?;
        }

        debug!(
            "File persistence initialized at: {}",
            logger_options.scrub_path(&file_path)
        );

        Ok(Self {
            file_path,
            logger_options,
        })
    }

    /// Get the path to the cache file
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Get the logger options
    pub fn logger_options(&self) -> &LoggerOptions {
        &self.logger_options
    }

    /// Directory holding the cache file and its temp files
    fn cache_dir(&self) -> PathBuf {
        match self.file_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Write raw bytes, replacing the file atomically
    ///
    /// Each write goes through its own uniquely named temp file in the cache
    /// directory, so concurrent writers never share a partially written file.
    pub async fn save_bytes(&self, contents: &[u8]) -> Result<()> {
        let dir = self.cache_dir();
        let file_path = self.file_path.clone();
        let contents = Zeroizing::new(contents.to_vec());
        let len = contents.len();

        let write = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            // Dropped (and removed) on any error before persist
            let mut temp = NamedTempFile::new_in(&dir)?;
            temp.write_all(&contents)?;
            temp.flush()?;
            temp.as_file().sync_all()?;
            temp.persist(&file_path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| PersistenceError::BackendWrite(format!("Cache write task failed: {}", e)))?;

        if let Err(e) = write {
            return Err(PersistenceError::BackendWrite(format!(
                "Could not write cache file: {}",
                e
            )));
        }

        debug!(
            "Saved {} bytes to {}",
            len,
            self.logger_options.scrub_path(&self.file_path)
        );
        Ok(())
    }

    /// Read raw bytes, `None` if the file does not exist
    pub async fn load_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.file_path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No existing cache file found");
                Ok(None)
            }
            Err(e) => Err(PersistenceError::BackendRead(format!(
                "Could not read cache file: {}",
                e
            ))),
        }
    }

    /// Last modification time, `None` if the file does not exist
    pub async fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        match tokio::fs::metadata(&self.file_path).await {
            Ok(metadata) => {
                let modified = metadata.modified().map_err(|e| {
                    PersistenceError::BackendRead(format!("Could not read modification time: {}", e))
                })?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::BackendRead(format!(
                "Could not stat cache file: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl CachePersistence for FilePersistence {
    async fn save(&self, contents: &str) -> Result<()> {
        self.save_bytes(contents.as_bytes()).await
    }

    async fn load(&self) -> Result<Option<String>> {
        match self.load_bytes().await? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                PersistenceError::BackendRead(format!("Cache file is not valid UTF-8: {}", e))
            }),
            None => Ok(None),
        }
    }

    async fn delete(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.file_path).await {
            Ok(()) => {
                debug!("Deleted {}", self.logger_options.scrub_path(&self.file_path));
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistenceError::BackendWrite(format!(
                "Could not delete cache file: {}",
                e
            ))),
        }
    }

    async fn reload_necessary(&self, last_sync: DateTime<Utc>) -> Result<bool> {
        // A missing file has never been modified
        Ok(self
            .last_modified()
            .await?
            .is_some_and(|modified| modified > last_sync))
    }

    async fn create_for_persistence_validation(&self) -> Result<Box<dyn CachePersistence>> {
        let validator = Self::create(
            validation_path(&self.file_path),
            self.logger_options.clone(),
        )
        .await?;
        Ok(Box::new(validator))
    }

    fn storage_identity(&self) -> &Path {
        &self.file_path
    }

    fn backend_name(&self) -> &'static str {
        "File Persistence"
    }
}
