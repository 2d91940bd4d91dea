//! Platform detection

use std::fmt;

/// Operating system families with a defined persistence backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// DPAPI-encrypted file
    Windows,
    /// Keychain
    MacOs,
    /// Secret Service, with optional plaintext fallback
    Linux,
    /// Anything else
    Unsupported,
}

impl Platform {
    /// Classify the running process
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Classify an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Unsupported,
        }
    }

    /// Whether a failed keyring verification may fall back to a plaintext file
    pub fn allows_plaintext_fallback(self) -> bool {
        self == Self::Linux
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Windows => "Windows",
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
            Self::Unsupported => "unsupported platform",
        };
        f.write_str(name)
    }
}
