//! Error types for token-persistence

use thiserror::Error;

/// Result type alias for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Persistence error types
///
/// Every failure path of the creator and the backends ends in one of these
/// kinds. Native diagnostics are carried verbatim in the message.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A field required by the selected backend is missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No backend exists for the detected platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A native storage call failed while writing or deleting
    #[error("Backend write failed: {0}")]
    BackendWrite(String),

    /// A native storage call failed while reading
    #[error("Backend read failed: {0}")]
    BackendRead(String),

    /// The backend self-test did not succeed
    #[error("{0}")]
    Verification(String),
}

impl PersistenceError {
    /// The message without the error-kind prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(m)
            | Self::UnsupportedPlatform(m)
            | Self::BackendWrite(m)
            | Self::BackendRead(m)
            | Self::Verification(m) => m,
        }
    }

    /// Whether this error makes the creator consider a fallback backend
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}
