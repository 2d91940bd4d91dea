//! Persistence selection, verification and fallback
//!
//! The creator picks the backend for the detected platform, checks that the
//! configuration carries every field that backend needs, and runs the
//! backend's self-test before handing it out. Only on Linux, and only when
//! the configuration opts in, does a failed self-test fall back to an
//! unprotected file.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{DataProtectionScope, PersistenceConfiguration};
use crate::error::{PersistenceError, Result};
use crate::native::{CredentialVault, DataProtector, KeyringVault, NativeDataProtector};
use crate::persistence::{
    CachePersistence, DataProtectionPersistence, FilePersistence, KeyringPersistence, Persistence,
};
use crate::platform::Platform;

/// Create a verified persistence for the running platform
pub async fn create_persistence(config: &PersistenceConfiguration) -> Result<Persistence> {
    PersistenceCreator::new().create(config).await
}

/// Builds and verifies persistence backends
#[derive(Clone)]
pub struct PersistenceCreator {
    /// Platform to select a backend for
    platform: Platform,
    /// Vault used by keyring persistence
    vault: Arc<dyn CredentialVault>,
    /// Protector used by data-protection persistence
    protector: Arc<dyn DataProtector>,
}

impl PersistenceCreator {
    /// Create a creator for the running platform with native capabilities
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
            vault: Arc::new(KeyringVault::new()),
            protector: Arc::new(NativeDataProtector::new()),
        }
    }

    /// Select backends as if running on `platform`
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Use a different credential vault
    pub fn with_vault(mut self, vault: Arc<dyn CredentialVault>) -> Self {
        self.vault = vault;
        self
    }

    /// Use a different data protector
    pub fn with_data_protector(mut self, protector: Arc<dyn DataProtector>) -> Self {
        self.protector = protector;
        self
    }

    /// The platform backends are selected for
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Create, verify and (on Linux, if allowed) fall back
    pub async fn create(&self, config: &PersistenceConfiguration) -> Result<Persistence> {
        debug!("Selecting persistence backend for {}", self.platform);

        let persistence = self.configure(config).await?;

        debug!("Verifying {}", persistence.backend_name());
        let error = match persistence.verify_persistence().await {
            Ok(true) => {
                info!("Using {}", persistence.backend_name());
                return Ok(persistence);
            }
            Ok(false) => PersistenceError::Verification(format!(
                "{} could not be verified",
                persistence.backend_name()
            )),
            Err(e) => e,
        };

        if !(self.platform.allows_plaintext_fallback() && config.use_plaintext_file_on_linux) {
            warn!("{} failed verification: {}", persistence.backend_name(), error);
            return Err(error);
        }

        warn!(
            "{} failed verification, falling back to a plaintext file: {}",
            persistence.backend_name(),
            error
        );
        self.fallback(config).await
    }

    /// Validate the configuration and construct the platform's backend
    async fn configure(&self, config: &PersistenceConfiguration) -> Result<Persistence> {
        match self.platform {
            Platform::Windows => {
                let (cache_path, scope) = require_data_protection(config)?;
                let persistence = DataProtectionPersistence::create(
                    cache_path,
                    scope,
                    None,
                    self.protector.clone(),
                    config.logger_options.clone(),
                )
                .await?;
                Ok(persistence.into())
            }
            Platform::MacOs | Platform::Linux => {
                let (cache_path, service, account) = require_keyring(config)?;
                let persistence = KeyringPersistence::create(
                    cache_path,
                    service,
                    account,
                    self.vault.clone(),
                    config.logger_options.clone(),
                )
                .await?;
                Ok(persistence.into())
            }
            Platform::Unsupported => Err(PersistenceError::UnsupportedPlatform(
                "The current environment is not supported".to_string(),
            )),
        }
    }

    /// Construct and verify the plaintext file fallback
    async fn fallback(&self, config: &PersistenceConfiguration) -> Result<Persistence> {
        let cache_path = config.cache_path().ok_or_else(|| {
            PersistenceError::Configuration(
                "Cache path not provided for the File persistence".to_string(),
            )
        })?;

        let persistence: Persistence =
            FilePersistence::create(cache_path, config.logger_options.clone())
                .await?
                .into();

        match persistence.verify_persistence().await {
            Ok(true) => {
                warn!("Using unprotected {}", persistence.backend_name());
                Ok(persistence)
            }
            Ok(false) => {
                warn!("{} could not be verified", persistence.backend_name());
                Err(PersistenceError::Verification(
                    "Persistence could not be verified".to_string(),
                ))
            }
            Err(e) => {
                warn!("{} failed verification: {}", persistence.backend_name(), e);
                Err(PersistenceError::Verification(
                    "Persistence could not be verified".to_string(),
                ))
            }
        }
    }
}

impl Default for PersistenceCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PersistenceCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceCreator")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

fn require_data_protection(
    config: &PersistenceConfiguration,
) -> Result<(&Path, DataProtectionScope)> {
    match (config.cache_path(), config.data_protection_scope) {
        (Some(path), Some(scope)) => Ok((path, scope)),
        _ => Err(PersistenceError::Configuration(
            "Cache path and/or data protection scope not provided for the DataProtection persistence"
                .to_string(),
        )),
    }
}

fn require_keyring(config: &PersistenceConfiguration) -> Result<(&Path, &str, &str)> {
    match (config.cache_path(), config.service_name(), config.account_name()) {
        (Some(path), Some(service), Some(account)) => Ok((path, service, account)),
        _ => Err(PersistenceError::Configuration(
            "Cache path, service name and/or account name not provided".to_string(),
        )),
    }
}
