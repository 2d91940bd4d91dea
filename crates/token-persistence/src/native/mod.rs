//! Native platform capabilities used by the persistence backends
//!
//! Each capability is a trait so the creator can be driven by fakes in tests:
//! 1. Credential vault (OS keychain / secret service)
//! 2. Data protection (DPAPI)

mod data_protection;
mod vault;

pub use data_protection::{DataProtector, NativeDataProtector};
pub use vault::{CredentialVault, KeyringVault};
