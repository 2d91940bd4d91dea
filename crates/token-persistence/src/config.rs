//! Persistence configuration
//!
//! Describes where the token cache lives and which native protection to use.
//! Which fields are required depends on the backend the creator selects for
//! the running platform; nothing here fills in a missing field silently.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PersistenceError, Result};

/// Placeholder written to logs instead of paths and account identifiers
const REDACTED: &str = "<redacted>";

/// Protection scope for the OS data-protection backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataProtectionScope {
    /// Only the current user can decrypt
    CurrentUser,
    /// Any user on the current machine can decrypt
    LocalMachine,
}

/// Logging behaviour of the backends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerOptions {
    /// Include cache paths, service and account names in log events
    pub pii_logging_enabled: bool,
}

impl LoggerOptions {
    /// Render a value for a log event, honouring the PII setting
    pub(crate) fn scrub(&self, value: impl Display) -> String {
        if self.pii_logging_enabled {
            value.to_string()
        } else {
            REDACTED.to_string()
        }
    }

    /// Render a path for a log event, honouring the PII setting
    pub(crate) fn scrub_path(&self, path: &Path) -> String {
        self.scrub(path.display())
    }
}

/// Configuration consumed by [`crate::PersistenceCreator`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceConfiguration {
    /// Location of the cache file (or the mirror file for keyring storage)
    pub cache_path: Option<PathBuf>,
    /// Scope for the data-protection backend (Windows)
    pub data_protection_scope: Option<DataProtectionScope>,
    /// Keyring service name (macOS, Linux)
    pub service_name: Option<String>,
    /// Keyring account name (macOS, Linux)
    pub account_name: Option<String>,
    /// Fall back to an unprotected file when the Linux secret service fails verification
    pub use_plaintext_file_on_linux: bool,
    /// Logging behaviour
    pub logger_options: LoggerOptions,
}

impl PersistenceConfiguration {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PersistenceError::Configuration(format!(
                "Could not read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_json(&contents)?;
        debug!("Loaded persistence configuration from {:?}", path);
        Ok(config)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PersistenceError::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Set the cache location
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Set the data protection scope
    pub fn with_data_protection_scope(mut self, scope: DataProtectionScope) -> Self {
        self.data_protection_scope = Some(scope);
        self
    }

    /// Set the keyring service name
    pub fn with_service_name(mut self, service: impl Into<String>) -> Self {
        self.service_name = Some(service.into());
        self
    }

    /// Set the keyring account name
    pub fn with_account_name(mut self, account: impl Into<String>) -> Self {
        self.account_name = Some(account.into());
        self
    }

    /// Allow the plaintext file fallback on Linux
    pub fn with_plaintext_fallback(mut self, allow: bool) -> Self {
        self.use_plaintext_file_on_linux = allow;
        self
    }

    /// Set the logger options
    pub fn with_logger_options(mut self, options: LoggerOptions) -> Self {
        self.logger_options = options;
        self
    }

    /// The cache path, treating an empty path as absent
    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// The service name, treating an empty string as absent
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref().filter(|s| !s.is_empty())
    }

    /// The account name, treating an empty string as absent
    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref().filter(|s| !s.is_empty())
    }

    /// Default cache location in the user's data directory
    ///
    /// Never applied implicitly; callers opt in by setting it as the cache path.
    pub fn default_cache_path() -> Result<PathBuf> {
        ProjectDirs::from("com", "token-persistence", "token-persistence")
            .map(|dirs| dirs.data_dir().join("token-cache.json"))
            .ok_or_else(|| {
                PersistenceError::Configuration("Could not determine data directory".to_string())
            })
    }
}
