//! Fakes for the native capabilities

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::DataProtectionScope;
use crate::error::{PersistenceError, Result};
use crate::native::{CredentialVault, DataProtector};

/// How a [`MemoryVault`] behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VaultMode {
    Healthy,
    /// Every call fails like an unreachable secret service
    Failing,
    /// Writes succeed but nothing can be read back
    Forgetful,
}

/// In-memory credential vault
#[derive(Debug)]
pub struct MemoryVault {
    entries: Mutex<HashMap<(String, String), String>>,
    written: Mutex<HashSet<(String, String)>>,
    calls: AtomicUsize,
    mode: VaultMode,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::with_mode(VaultMode::Healthy)
    }

    pub fn failing() -> Self {
        Self::with_mode(VaultMode::Failing)
    }

    pub fn forgetful() -> Self {
        Self::with_mode(VaultMode::Forgetful)
    }

    fn with_mode(mode: VaultMode) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            written: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
            mode,
        }
    }

    fn key(service: &str, account: &str) -> (String, String) {
        (service.to_string(), account.to_string())
    }

    /// Number of vault calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current value of an entry, bypassing the call counter
    pub fn stored(&self, service: &str, account: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&Self::key(service, account))
            .cloned()
    }

    /// Whether an entry was ever written
    pub fn was_written(&self, service: &str, account: &str) -> bool {
        self.written
            .lock()
            .unwrap()
            .contains(&Self::key(service, account))
    }

    /// Seed an entry directly
    pub fn insert(&self, service: &str, account: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(Self::key(service, account), value.to_string());
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn set_password(&self, service: &str, account: &str, value: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.mode == VaultMode::Failing {
            return Err(PersistenceError::BackendWrite(
                "Secret service is not available".to_string(),
            ));
        }

        self.written.lock().unwrap().insert(Self::key(service, account));
        if self.mode == VaultMode::Healthy {
            self.insert(service, account, value);
        }
        Ok(())
    }

    async fn get_password(&self, service: &str, account: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.mode == VaultMode::Failing {
            return Err(PersistenceError::BackendRead(
                "Secret service is not available".to_string(),
            ));
        }
        Ok(self.stored(service, account))
    }

    async fn delete_password(&self, service: &str, account: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.mode == VaultMode::Failing {
            return Err(PersistenceError::BackendWrite(
                "Secret service is not available".to_string(),
            ));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .remove(&Self::key(service, account))
            .is_some())
    }
}

const XOR_MAGIC: &[u8] = b"XOR1";

/// Reversible protector that tags output with scope and entropy
#[derive(Debug, Default, Clone, Copy)]
pub struct XorProtector;

impl XorProtector {
    fn header(entropy: Option<&[u8]>, scope: DataProtectionScope) -> Vec<u8> {
        let entropy = entropy.unwrap_or_default();
        let checksum = entropy.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        let scope = match scope {
            DataProtectionScope::CurrentUser => 1u8,
            DataProtectionScope::LocalMachine => 2u8,
        };

        let mut header = XOR_MAGIC.to_vec();
        header.extend_from_slice(&[scope, entropy.len() as u8, checksum]);
        header
    }
}

impl DataProtector for XorProtector {
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        let mut out = Self::header(entropy, scope);
        out.extend(data.iter().map(|b| b ^ 0x5a));
        Ok(out)
    }

    fn unprotect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        let header = Self::header(entropy, scope);
        match data.strip_prefix(header.as_slice()) {
            Some(body) => Ok(body.iter().map(|b| b ^ 0x5a).collect()),
            None => Err(PersistenceError::BackendRead(
                "The data is invalid".to_string(),
            )),
        }
    }
}

/// Protector whose every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingProtector;

impl DataProtector for FailingProtector {
    fn protect(
        &self,
        _data: &[u8],
        _entropy: Option<&[u8]>,
        _scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        Err(PersistenceError::BackendWrite(
            "Key not valid for use in specified state".to_string(),
        ))
    }

    fn unprotect(
        &self,
        _data: &[u8],
        _entropy: Option<&[u8]>,
        _scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        Err(PersistenceError::BackendRead(
            "Key not valid for use in specified state".to_string(),
        ))
    }
}
