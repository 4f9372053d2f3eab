use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use zeroize::ZeroizeOnDrop;

use crate::cipher::CipherError;

/// Key length produced by [`SymmetricKeyPair::generate`] (AES-256).
pub const KEY_LEN: usize = 32;
/// AES block size; every initialization vector must be exactly this long.
pub const IV_LEN: usize = 16;

const SUPPORTED_KEY_LENS: [usize; 3] = [16, 24, 32];

/// AES key plus initialization vector, used for both directions.
/// Immutable once built; bytes are wiped on drop and never printed.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SymmetricKeyPair {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl SymmetricKeyPair {
    /// Build from raw halves, rejecting lengths AES cannot use.
    pub fn new(key: impl Into<Vec<u8>>, iv: impl Into<Vec<u8>>) -> Result<Self, CipherError> {
        let key = key.into();
        let iv = iv.into();
        check_key_len(key.len())?;
        check_iv_len(iv.len())?;
        Ok(Self { key, iv })
    }

    /// Fresh 256-bit key and 128-bit IV from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = vec![0u8; KEY_LEN];
        let mut iv = vec![0u8; IV_LEN];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Decode both halves from standard base64.
    pub fn from_base64(key: &str, iv: &str) -> Result<Self, CipherError> {
        let key = STANDARD
            .decode(key.trim())
            .map_err(|e| CipherError::validation(format!("key is not base64: {e}")))?;
        let iv = STANDARD
            .decode(iv.trim())
            .map_err(|e| CipherError::validation(format!("iv is not base64: {e}")))?;
        Self::new(key, iv)
    }

    /// Standard base64 of `(key, iv)`.
    pub fn to_base64(&self) -> (String, String) {
        (STANDARD.encode(&self.key), STANDARD.encode(&self.iv))
    }
}

impl fmt::Debug for SymmetricKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKeyPair")
            .field("key_bits", &(self.key.len() * 8))
            .field("iv", &"<redacted>")
            .finish()
    }
}

pub(crate) fn check_key_len(len: usize) -> Result<(), CipherError> {
    if SUPPORTED_KEY_LENS.contains(&len) {
        Ok(())
    } else {
        Err(CipherError::validation(format!(
            "key must be 16, 24 or 32 bytes, got {len}"
        )))
    }
}

pub(crate) fn check_iv_len(len: usize) -> Result<(), CipherError> {
    if len == IV_LEN {
        Ok(())
    } else {
        Err(CipherError::validation(format!(
            "iv must be {IV_LEN} bytes, got {len}"
        )))
    }
}
