//! Data-protection file persistence (Windows)
//!
//! Encrypts the cache contents with the OS data protection API before writing
//! them to a file, and decrypts on load.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

use super::file::FilePersistence;
use super::traits::{validation_path, CachePersistence};
use crate::config::{DataProtectionScope, LoggerOptions};
use crate::error::{PersistenceError, Result};
use crate::native::DataProtector;

/// Encrypted file persistence backend
#[derive(Clone)]
pub struct DataProtectionPersistence {
    /// Underlying file holding the protected bytes
    file: FilePersistence,
    /// Protection scope
    scope: DataProtectionScope,
    /// Additional entropy mixed into the protection key
    optional_entropy: Option<Zeroizing<Vec<u8>>>,
    /// Native protector
    protector: Arc<dyn DataProtector>,
}

impl DataProtectionPersistence {
    /// Create a data-protection persistence bound to `file_path`
    pub async fn create(
        file_path: impl Into<PathBuf>,
        scope: DataProtectionScope,
        optional_entropy: Option<Vec<u8>>,
        protector: Arc<dyn DataProtector>,
        logger_options: LoggerOptions,
    ) -> Result<Self> {
        let file = FilePersistence::create(file_path, logger_options).await?;

        Ok(Self {
            file,
            scope,
            optional_entropy: optional_entropy.map(Zeroizing::new),
            protector,
        })
    }

    /// Get the protection scope
    pub fn scope(&self) -> DataProtectionScope {
        self.scope
    }

    fn entropy(&self) -> Option<&[u8]> {
        self.optional_entropy.as_deref().map(Vec::as_slice)
    }
}

impl fmt::Debug for DataProtectionPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataProtectionPersistence")
            .field("file", &self.file)
            .field("scope", &self.scope)
            .field("optional_entropy", &self.optional_entropy.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[async_trait]
impl CachePersistence for DataProtectionPersistence {
    async fn save(&self, contents: &str) -> Result<()> {
        let plaintext = Zeroizing::new(contents.as_bytes().to_vec());
        let protected = self
            .protector
            .protect(&plaintext, self.entropy(), self.scope)
            .map_err(|e| PersistenceError::BackendWrite(e.message().to_string()))?;

        self.file.save_bytes(&protected).await
    }

    async fn load(&self) -> Result<Option<String>> {
        let protected = match self.file.load_bytes().await? {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                debug!("No protected cache contents found");
                return Ok(None);
            }
        };

        let plaintext = Zeroizing::new(
            self.protector
                .unprotect(&protected, self.entropy(), self.scope)
                .map_err(|e| PersistenceError::BackendRead(e.message().to_string()))?,
        );

        std::str::from_utf8(&plaintext)
            .map(|s| Some(s.to_string()))
            .map_err(|e| {
                PersistenceError::BackendRead(format!("Decrypted cache is not valid UTF-8: {}", e))
            })
    }

    async fn delete(&self) -> Result<bool> {
        self.file.delete().await
    }

    async fn reload_necessary(&self, last_sync: DateTime<Utc>) -> Result<bool> {
        self.file.reload_necessary(last_sync).await
    }

    async fn create_for_persistence_validation(&self) -> Result<Box<dyn CachePersistence>> {
        let validator = Self::create(
            validation_path(self.file.file_path()),
            self.scope,
            None,
            self.protector.clone(),
            self.file.logger_options().clone(),
        )
        .await?;
        Ok(Box::new(validator))
    }

    fn storage_identity(&self) -> &Path {
        self.file.file_path()
    }

    fn backend_name(&self) -> &'static str {
        "Data Protection File Persistence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingProtector, XorProtector};
    use chrono::Duration;
    use tempfile::TempDir;

    async fn test_persistence(
        protector: Arc<dyn DataProtector>,
        entropy: Option<Vec<u8>>,
    ) -> (DataProtectionPersistence, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let persistence = DataProtectionPersistence::create(
            temp_dir.path().join("cache.bin"),
            DataProtectionScope::CurrentUser,
            entropy,
            protector,
            LoggerOptions::default(),
        )
        .await
        .unwrap();
        (persistence, temp_dir)
    }

    #[tokio::test]
    async fn test_save_encrypts_and_load_decrypts() {
        let (persistence, temp_dir) = test_persistence(Arc::new(XorProtector), None).await;

        persistence.save("secret token cache").await.unwrap();

        let on_disk = std::fs::read(temp_dir.path().join("cache.bin")).unwrap();
        assert_ne!(on_disk, b"secret token cache");

        assert_eq!(
            persistence.load().await.unwrap(),
            Some("secret token cache".to_string())
        );
    }

    #[tokio::test]
    async fn test_load_missing_or_empty_file() {
        let (persistence, temp_dir) = test_persistence(Arc::new(XorProtector), None).await;

        assert_eq!(persistence.load().await.unwrap(), None);

        std::fs::write(temp_dir.path().join("cache.bin"), b"").unwrap();
        assert_eq!(persistence.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupted_payload_is_read_error() {
        let (persistence, temp_dir) = test_persistence(Arc::new(XorProtector), None).await;

        std::fs::write(temp_dir.path().join("cache.bin"), b"not protected").unwrap();

        let result = persistence.load().await;
        assert!(matches!(result, Err(PersistenceError::BackendRead(_))));
    }

    #[tokio::test]
    async fn test_entropy_must_match() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.bin");

        let writer = DataProtectionPersistence::create(
            &path,
            DataProtectionScope::CurrentUser,
            Some(b"entropy".to_vec()),
            Arc::new(XorProtector),
            LoggerOptions::default(),
        )
        .await
        .unwrap();
        writer.save("value").await.unwrap();
        assert_eq!(writer.load().await.unwrap(), Some("value".to_string()));

        let reader = DataProtectionPersistence::create(
            &path,
            DataProtectionScope::CurrentUser,
            None,
            Arc::new(XorProtector),
            LoggerOptions::default(),
        )
        .await
        .unwrap();
        assert!(matches!(
            reader.load().await,
            Err(PersistenceError::BackendRead(_))
        ));
    }

    #[tokio::test]
    async fn test_scope_must_match() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.bin");

        let user = DataProtectionPersistence::create(
            &path,
            DataProtectionScope::CurrentUser,
            None,
            Arc::new(XorProtector),
            LoggerOptions::default(),
        )
        .await
        .unwrap();
        user.save("value").await.unwrap();

        let machine = DataProtectionPersistence::create(
            &path,
            DataProtectionScope::LocalMachine,
            None,
            Arc::new(XorProtector),
            LoggerOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(machine.scope(), DataProtectionScope::LocalMachine);
        assert!(machine.load().await.is_err());
    }

    #[tokio::test]
    async fn test_protect_failure_is_write_error() {
        let (persistence, temp_dir) = test_persistence(Arc::new(FailingProtector), None).await;

        let result = persistence.save("value").await;
        assert!(matches!(result, Err(PersistenceError::BackendWrite(_))));
        assert!(!temp_dir.path().join("cache.bin").exists());
    }

    #[tokio::test]
    async fn test_delete_and_reload() {
        let (persistence, _temp) = test_persistence(Arc::new(XorProtector), None).await;
        let before_save = Utc::now() - Duration::seconds(5);

        persistence.save("value").await.unwrap();
        assert!(persistence.reload_necessary(before_save).await.unwrap());
        assert!(!persistence.reload_necessary(Utc::now()).await.unwrap());

        assert!(persistence.delete().await.unwrap());
        assert!(!persistence.delete().await.unwrap());
        assert_eq!(persistence.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_verify_persistence() {
        let (persistence, _temp) = test_persistence(Arc::new(XorProtector), None).await;
        assert!(persistence.verify_persistence().await.unwrap());

        let (failing, _temp) = test_persistence(Arc::new(FailingProtector), None).await;
        let result = failing.verify_persistence().await;
        assert!(matches!(result, Err(PersistenceError::Verification(_))));
    }

    #[tokio::test]
    async fn test_debug_redacts_entropy() {
        let (persistence, _temp) =
            test_persistence(Arc::new(XorProtector), Some(b"entropy".to_vec())).await;
        let debug = format!("{:?}", persistence);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("101, 110, 116"));
    }
}
