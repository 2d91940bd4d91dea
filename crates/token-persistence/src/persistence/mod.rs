//! Persistence backends for the token cache
//!
//! This module provides three backends behind one trait:
//! 1. Plain file (Linux fallback)
//! 2. Data-protection encrypted file (Windows)
//! 3. OS keyring with a mirror file (macOS, Linux)

mod data_protection;
mod file;
mod keyring;
mod traits;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::Result;

pub use self::keyring::{KeyringPersistence, VALIDATION_ACCOUNT_NAME, VALIDATION_SERVICE_NAME};
pub use data_protection::DataProtectionPersistence;
pub use file::FilePersistence;
pub use traits::{
    CachePersistence, PERSISTENCE_ALTERNATE_TEST_FILE, PERSISTENCE_TEST_DATA, PERSISTENCE_TEST_FILE,
};

/// A verified persistence backend returned by the creator
#[derive(Debug, Clone)]
pub enum Persistence {
    /// Unprotected file
    File(FilePersistence),
    /// OS data-protection encrypted file
    DataProtection(DataProtectionPersistence),
    /// OS keyring with mirror file
    Keyring(KeyringPersistence),
}

impl Persistence {
    fn backend(&self) -> &dyn CachePersistence {
        match self {
            Self::File(p) => p,
            Self::DataProtection(p) => p,
            Self::Keyring(p) => p,
        }
    }

    /// Whether the stored secret is protected by the OS
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::File(_))
    }
}

impl From<FilePersistence> for Persistence {
    fn from(p: FilePersistence) -> Self {
        Self::File(p)
    }
}

impl From<DataProtectionPersistence> for Persistence {
    fn from(p: DataProtectionPersistence) -> Self {
        Self::DataProtection(p)
    }
}

impl From<KeyringPersistence> for Persistence {
    fn from(p: KeyringPersistence) -> Self {
        Self::Keyring(p)
    }
}

#[async_trait]
impl CachePersistence for Persistence {
    async fn save(&self, contents: &str) -> Result<()> {
        self.backend().save(contents).await
    }

    async fn load(&self) -> Result<Option<String>> {
        self.backend().load().await
    }

    async fn delete(&self) -> Result<bool> {
        self.backend().delete().await
    }

    async fn reload_necessary(&self, last_sync: DateTime<Utc>) -> Result<bool> {
        self.backend().reload_necessary(last_sync).await
    }

    async fn create_for_persistence_validation(&self) -> Result<Box<dyn CachePersistence>> {
        self.backend().create_for_persistence_validation().await
    }

    async fn verify_persistence(&self) -> Result<bool> {
        self.backend().verify_persistence().await
    }

    fn storage_identity(&self) -> &Path {
        self.backend().storage_identity()
    }

    fn backend_name(&self) -> &'static str {
        self.backend().backend_name()
    }
}
