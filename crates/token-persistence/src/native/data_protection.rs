//! OS data protection
//!
//! On Windows this is DPAPI (`CryptProtectData` / `CryptUnprotectData`).
//! Other targets have no equivalent service, so the native protector fails
//! every call there and verification of the data-protection backend fails.

use crate::config::DataProtectionScope;
use crate::error::{PersistenceError, Result};

/// Encrypts and decrypts byte buffers with an OS-managed key
pub trait DataProtector: Send + Sync {
    /// Encrypt `data` under `scope`, mixing in `entropy` when given
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>>;

    /// Decrypt a buffer produced by [`DataProtector::protect`]
    fn unprotect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>>;
}

/// Protector backed by the platform's data protection API
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDataProtector;

impl NativeDataProtector {
    /// Create a new native protector
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "windows")]
impl DataProtector for NativeDataProtector {
    fn protect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        dpapi::protect(data, entropy, scope).map_err(PersistenceError::BackendWrite)
    }

    fn unprotect(
        &self,
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        dpapi::unprotect(data, entropy, scope).map_err(PersistenceError::BackendRead)
    }
}

#[cfg(not(target_os = "windows"))]
impl DataProtector for NativeDataProtector {
    fn protect(
        &self,
        _data: &[u8],
        _entropy: Option<&[u8]>,
        _scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        Err(PersistenceError::BackendWrite(
            "Data protection is only available on Windows".to_string(),
        ))
    }

    fn unprotect(
        &self,
        _data: &[u8],
        _entropy: Option<&[u8]>,
        _scope: DataProtectionScope,
    ) -> Result<Vec<u8>> {
        Err(PersistenceError::BackendRead(
            "Data protection is only available on Windows".to_string(),
        ))
    }
}

#[cfg(target_os = "windows")]
mod dpapi {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{LocalFree, HLOCAL};
    use windows::Win32::Security::Cryptography::{
        CryptProtectData, CryptUnprotectData, CRYPTPROTECT_LOCAL_MACHINE,
        CRYPTPROTECT_UI_FORBIDDEN, CRYPT_INTEGER_BLOB,
    };

    use crate::config::DataProtectionScope;

    fn flags(scope: DataProtectionScope) -> u32 {
        match scope {
            DataProtectionScope::CurrentUser => CRYPTPROTECT_UI_FORBIDDEN,
            DataProtectionScope::LocalMachine => {
                CRYPTPROTECT_UI_FORBIDDEN | CRYPTPROTECT_LOCAL_MACHINE
            }
        }
    }

    fn blob(data: &[u8]) -> CRYPT_INTEGER_BLOB {
        CRYPT_INTEGER_BLOB {
            cbData: data.len() as u32,
            pbData: data.as_ptr() as *mut u8,
        }
    }

    /// Copy a DPAPI-allocated output blob and release it
    ///
    /// # Safety
    /// `out` must have been filled by a successful DPAPI call.
    unsafe fn take(out: CRYPT_INTEGER_BLOB) -> Vec<u8> {
        let bytes = std::slice::from_raw_parts(out.pbData, out.cbData as usize).to_vec();
        let _ = LocalFree(HLOCAL(out.pbData as *mut core::ffi::c_void));
        bytes
    }

    pub(super) fn protect(
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>, String> {
        let input = blob(data);
        let entropy = entropy.map(blob);
        let mut output = CRYPT_INTEGER_BLOB::default();

        unsafe {
            CryptProtectData(
                &input,
                PCWSTR::null(),
                entropy.as_ref().map(|e| e as *const CRYPT_INTEGER_BLOB),
                None,
                None,
                flags(scope),
                &mut output,
            )
            .map_err(|e| format!("CryptProtectData failed: {}", e))?;

            Ok(take(output))
        }
    }

    pub(super) fn unprotect(
        data: &[u8],
        entropy: Option<&[u8]>,
        scope: DataProtectionScope,
    ) -> Result<Vec<u8>, String> {
        let input = blob(data);
        let entropy = entropy.map(blob);
        let mut output = CRYPT_INTEGER_BLOB::default();

        unsafe {
            CryptUnprotectData(
                &input,
                None,
                entropy.as_ref().map(|e| e as *const CRYPT_INTEGER_BLOB),
                None,
                None,
                flags(scope),
                &mut output,
            )
            .map_err(|e| format!("CryptUnprotectData failed: {}", e))?;

            Ok(take(output))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_native_protector_unavailable() {
        let protector = NativeDataProtector::new();

        let result = protector.protect(b"data", None, DataProtectionScope::CurrentUser);
        assert!(matches!(result, Err(PersistenceError::BackendWrite(_))));

        let result = protector.unprotect(b"data", None, DataProtectionScope::CurrentUser);
        assert!(matches!(result, Err(PersistenceError::BackendRead(_))));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_dpapi_roundtrip() {
        let protector = NativeDataProtector::new();
        let entropy = b"entropy".as_slice();

        let protected = protector
            .protect(b"token cache", Some(entropy), DataProtectionScope::CurrentUser)
            .unwrap();
        assert_ne!(protected, b"token cache");

        let plain = protector
            .unprotect(&protected, Some(entropy), DataProtectionScope::CurrentUser)
            .unwrap();
        assert_eq!(plain, b"token cache");

        let wrong = protector.unprotect(&protected, None, DataProtectionScope::CurrentUser);
        assert!(matches!(wrong, Err(PersistenceError::BackendRead(_))));
    }
}
