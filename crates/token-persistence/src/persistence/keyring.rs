//! Keyring persistence (macOS Keychain, Linux Secret Service)
//!
//! The secret lives in the OS credential vault under a (service, account)
//! pair. A plain mirror file at the cache path receives the same contents so
//! callers can use file timestamps for staleness checks. The vault is
//! authoritative: the mirror is written only after a successful vault write
//! and is never read back for content.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::file::FilePersistence;
use super::traits::{validation_path, CachePersistence};
use crate::config::LoggerOptions;
use crate::error::Result;
use crate::native::CredentialVault;

/// Service name reserved for the self-test entry
pub const VALIDATION_SERVICE_NAME: &str = "persistenceValidationServiceName";

/// Account name reserved for the self-test entry
pub const VALIDATION_ACCOUNT_NAME: &str = "persistenceValidationAccountName";

/// OS keyring persistence backend
#[derive(Clone)]
pub struct KeyringPersistence {
    /// Mirror file for staleness checks
    mirror: FilePersistence,
    /// Keyring service name
    service_name: String,
    /// Keyring account name
    account_name: String,
    /// Credential vault
    vault: Arc<dyn CredentialVault>,
}

impl KeyringPersistence {
    /// Create a keyring persistence mirrored at `file_path`
    pub async fn create(
        file_path: impl Into<PathBuf>,
        service_name: impl Into<String>,
        account_name: impl Into<String>,
        vault: Arc<dyn CredentialVault>,
        logger_options: LoggerOptions,
    ) -> Result<Self> {
        let mirror = FilePersistence::create(file_path, logger_options).await?;

        Ok(Self {
            mirror,
            service_name: service_name.into(),
            account_name: account_name.into(),
            vault,
        })
    }

    /// Get the keyring service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Get the keyring account name
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    fn logger_options(&self) -> &LoggerOptions {
        self.mirror.logger_options()
    }
}

impl fmt::Debug for KeyringPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyringPersistence")
            .field("mirror", &self.mirror)
            .field("service_name", &self.service_name)
            .field("account_name", &self.account_name)
            .finish()
    }
}

#[async_trait]
impl CachePersistence for KeyringPersistence {
    async fn save(&self, contents: &str) -> Result<()> {
        // Vault first: a failed vault write leaves the mirror untouched
        self.vault
            .set_password(&self.service_name, &self.account_name, contents)
            .await?;

        debug!(
            "Stored secret in keyring for {}/{}",
            self.logger_options().scrub(&self.service_name),
            self.logger_options().scrub(&self.account_name)
        );

        self.mirror.save(contents).await
    }

    async fn load(&self) -> Result<Option<String>> {
        let password = self
            .vault
            .get_password(&self.service_name, &self.account_name)
            .await?;

        if password.is_none() {
            debug!(
                "No keyring entry for {}/{}",
                self.logger_options().scrub(&self.service_name),
                self.logger_options().scrub(&self.account_name)
            );
        }
        Ok(password)
    }

    async fn delete(&self) -> Result<bool> {
        if let Err(e) = self.mirror.delete().await {
            warn!("Could not delete keyring mirror file: {}", e);
            return Err(e);
        }

        self.vault
            .delete_password(&self.service_name, &self.account_name)
            .await
    }

    async fn reload_necessary(&self, last_sync: DateTime<Utc>) -> Result<bool> {
        self.mirror.reload_necessary(last_sync).await
    }

    async fn create_for_persistence_validation(&self) -> Result<Box<dyn CachePersistence>> {
        let validator = Self::create(
            validation_path(self.mirror.file_path()),
            VALIDATION_SERVICE_NAME,
            VALIDATION_ACCOUNT_NAME,
            self.vault.clone(),
            self.logger_options().clone(),
        )
        .await?;
        Ok(Box::new(validator))
    }

    fn storage_identity(&self) -> &Path {
        self.mirror.file_path()
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        return "System Keyring";
    }
}
