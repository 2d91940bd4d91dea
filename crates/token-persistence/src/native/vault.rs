//! OS credential vault
//!
//! Uses the system keychain through the `keyring` crate:
//! - macOS: Keychain
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//! - Windows: Credential Manager (not selected by default)

use async_trait::async_trait;
use keyring::Entry;

use crate::error::{PersistenceError, Result};

/// Password storage keyed by a (service, account) pair
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Store `value`, replacing any existing password
    async fn set_password(&self, service: &str, account: &str, value: &str) -> Result<()>;

    /// Read the password, `None` if no entry exists
    async fn get_password(&self, service: &str, account: &str) -> Result<Option<String>>;

    /// Remove the entry, returning whether one existed
    async fn delete_password(&self, service: &str, account: &str) -> Result<bool>;
}

/// Vault backed by the operating system keychain
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringVault;

impl KeyringVault {
    /// Create a new keychain vault
    pub fn new() -> Self {
        Self
    }

    fn entry(service: &str, account: &str) -> std::result::Result<Entry, keyring::Error> {
        Entry::new(service, account)
    }
}

#[async_trait]
impl CredentialVault for KeyringVault {
    async fn set_password(&self, service: &str, account: &str, value: &str) -> Result<()> {
        Self::entry(service, account)
            .and_then(|entry| entry.set_password(value))
            .map_err(|e| PersistenceError::BackendWrite(e.to_string()))
    }

    async fn get_password(&self, service: &str, account: &str) -> Result<Option<String>> {
        let entry = Self::entry(service, account)
            .map_err(|e| PersistenceError::BackendRead(e.to_string()))?;

        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(PersistenceError::BackendRead(e.to_string())),
        }
    }

    async fn delete_password(&self, service: &str, account: &str) -> Result<bool> {
        let entry = Self::entry(service, account)
            .map_err(|e| PersistenceError::BackendWrite(e.to_string()))?;

        match entry.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(PersistenceError::BackendWrite(e.to_string())),
        }
    }
}
