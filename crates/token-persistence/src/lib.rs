//! # token-persistence
//!
//! Secure persistence for a token cache, using the best protection the
//! operating system offers:
//! - Windows: file encrypted with DPAPI
//! - macOS: Keychain
//! - Linux: Secret Service, with an opt-in plaintext file fallback
//!
//! Every backend is verified with an isolated write/read round trip before
//! [`create_persistence`] hands it out.

pub mod config;
mod creator;
pub mod error;
pub mod native;
pub mod persistence;
mod platform;

#[cfg(test)]
mod testing;

pub use config::{DataProtectionScope, LoggerOptions, PersistenceConfiguration};
pub use creator::{create_persistence, PersistenceCreator};
pub use error::{PersistenceError, Result};
pub use native::{CredentialVault, DataProtector, KeyringVault, NativeDataProtector};
pub use persistence::{
    CachePersistence, DataProtectionPersistence, FilePersistence, KeyringPersistence, Persistence,
};
pub use platform::Platform;
