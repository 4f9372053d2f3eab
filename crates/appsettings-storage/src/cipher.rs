//! AES-CBC (PKCS#7) encryption of UTF-8 text, base64 or URL-safe on the wire.

use std::{fmt::Display, str::FromStr};

use aes::{
    cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
    Aes128, Aes192, Aes256,
};
use appsettings_core::SettingsError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::key_pair::{check_iv_len, check_key_len, SymmetricKeyPair};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Missing input or key material that could not be resolved.
    #[error("invalid cipher input: {reason}")]
    Validation { reason: String },
    /// Ciphertext was malformed or produced with another key.
    #[error("decrypt failed: {reason}")]
    Decrypt { reason: String },
    /// Clear text did not parse as the requested type.
    #[error("conversion failed: {reason}")]
    Conversion { reason: String },
}

impl CipherError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    fn decrypt(reason: impl Display) -> Self {
        Self::Decrypt {
            reason: reason.to_string(),
        }
    }
}

impl From<CipherError> for SettingsError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::Validation { reason } => SettingsError::Validation { reason },
            CipherError::Decrypt { reason } | CipherError::Conversion { reason } => {
                SettingsError::Conversion { reason }
            }
        }
    }
}

/// Symmetric text cipher.
///
/// An optional default key pair stands in for the ambient identity: any half
/// (key or IV) not passed explicitly to a `*_with` call is taken from it.
#[derive(Debug, Clone, Default)]
pub struct AesCipher {
    default_key_pair: Option<SymmetricKeyPair>,
}

impl AesCipher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_key_pair(key_pair: SymmetricKeyPair) -> Self {
        Self {
            default_key_pair: Some(key_pair),
        }
    }

    /// Random AES-256 key and IV.
    pub fn generate_key_pair() -> SymmetricKeyPair {
        SymmetricKeyPair::generate()
    }

    pub fn encrypt(
        &self,
        clear_text: &str,
        key_pair: &SymmetricKeyPair,
    ) -> Result<String, CipherError> {
        self.encrypt_with(clear_text, Some(key_pair.key()), Some(key_pair.iv()))
    }

    /// Encrypt and base64-encode, resolving missing halves from the default key pair.
    pub fn encrypt_with(
        &self,
        clear_text: &str,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
    ) -> Result<String, CipherError> {
        require_input(clear_text, "clear text")?;
        let (key, iv) = self.resolve(key, iv)?;
        let cipher_bytes = encrypt_bytes(key, iv, clear_text.as_bytes())?;
        Ok(STANDARD.encode(cipher_bytes))
    }

    pub fn url_encrypt(
        &self,
        clear_text: &str,
        key_pair: &SymmetricKeyPair,
    ) -> Result<String, CipherError> {
        self.url_encrypt_with(clear_text, Some(key_pair.key()), Some(key_pair.iv()))
    }

    /// Same as [`AesCipher::encrypt_with`], percent-encoded for use in URLs.
    pub fn url_encrypt_with(
        &self,
        clear_text: &str,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
    ) -> Result<String, CipherError> {
        let encoded = self.encrypt_with(clear_text, key, iv)?;
        Ok(urlencoding::encode(&encoded).into_owned())
    }

    pub fn decrypt(
        &self,
        cipher_text: &str,
        key_pair: &SymmetricKeyPair,
    ) -> Result<String, CipherError> {
        self.decrypt_with(cipher_text, Some(key_pair.key()), Some(key_pair.iv()))
    }

    pub fn decrypt_with(
        &self,
        cipher_text: &str,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
    ) -> Result<String, CipherError> {
        require_input(cipher_text, "cipher text")?;
        let (key, iv) = self.resolve(key, iv)?;
        let cipher_bytes = STANDARD
            .decode(cipher_text)
            .map_err(|e| CipherError::decrypt(format!("cipher text is not base64: {e}")))?;
        decrypt_bytes(key, iv, &cipher_bytes)
    }

    pub fn url_decrypt(
        &self,
        cipher_text: &str,
        key_pair: &SymmetricKeyPair,
    ) -> Result<String, CipherError> {
        self.url_decrypt_with(cipher_text, Some(key_pair.key()), Some(key_pair.iv()))
    }

    pub fn url_decrypt_with(
        &self,
        cipher_text: &str,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
    ) -> Result<String, CipherError> {
        require_input(cipher_text, "cipher text")?;
        let decoded = urlencoding::decode(cipher_text)
            .map_err(|e| CipherError::decrypt(format!("cipher text is not percent-encoded: {e}")))?;
        self.decrypt_with(&decoded, key, iv)
    }

    /// Decrypt and parse, reporting every failure.
    pub fn try_decrypt_as<T>(
        &self,
        cipher_text: &str,
        key_pair: &SymmetricKeyPair,
    ) -> Result<T, CipherError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let clear_text = self.decrypt(cipher_text, key_pair)?;
        parse_clear_text(&clear_text)
    }

    /// Decrypt and parse, substituting `T::default()` when the ciphertext does not
    /// decrypt or the clear text does not parse. Missing input or key material is
    /// still an error.
    pub fn decrypt_as<T>(
        &self,
        cipher_text: &str,
        key_pair: &SymmetricKeyPair,
    ) -> Result<T, CipherError>
    where
        T: FromStr + Default,
        T::Err: Display,
    {
        swallow_to_default(self.try_decrypt_as(cipher_text, key_pair))
    }

    /// URL-safe counterpart of [`AesCipher::decrypt_as`].
    pub fn url_decrypt_as<T>(
        &self,
        cipher_text: &str,
        key_pair: &SymmetricKeyPair,
    ) -> Result<T, CipherError>
    where
        T: FromStr + Default,
        T::Err: Display,
    {
        let parsed = self
            .url_decrypt(cipher_text, key_pair)
            .and_then(|clear_text| parse_clear_text(&clear_text));
        swallow_to_default(parsed)
    }

    fn resolve<'a>(
        &'a self,
        key: Option<&'a [u8]>,
        iv: Option<&'a [u8]>,
    ) -> Result<(&'a [u8], &'a [u8]), CipherError> {
        let fallback = self.default_key_pair.as_ref();
        let key = key
            .or_else(|| fallback.map(SymmetricKeyPair::key))
            .ok_or_else(|| CipherError::validation("no key supplied and no default key pair"))?;
        let iv = iv
            .or_else(|| fallback.map(SymmetricKeyPair::iv))
            .ok_or_else(|| CipherError::validation("no iv supplied and no default key pair"))?;
        check_key_len(key.len())?;
        check_iv_len(iv.len())?;
        Ok((key, iv))
    }
}

fn require_input(input: &str, what: &str) -> Result<(), CipherError> {
    if input.is_empty() {
        return Err(CipherError::validation(format!("{what} must not be empty")));
    }
    Ok(())
}

fn parse_clear_text<T>(clear_text: &str) -> Result<T, CipherError>
where
    T: FromStr,
    T::Err: Display,
{
    clear_text.parse::<T>().map_err(|e| CipherError::Conversion {
        reason: e.to_string(),
    })
}

fn swallow_to_default<T: Default>(result: Result<T, CipherError>) -> Result<T, CipherError> {
    match result {
        Ok(value) => Ok(value),
        Err(err @ CipherError::Validation { .. }) => Err(err),
        Err(_) => Ok(T::default()),
    }
}

fn encrypt_bytes(key: &[u8], iv: &[u8], clear: &[u8]) -> Result<Vec<u8>, CipherError> {
    let invalid = |e: aes::cipher::InvalidLength| CipherError::validation(e.to_string());
    let out = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(clear),
        24 => Aes192CbcEnc::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(clear),
        32 => Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<Pkcs7>(clear),
        other => {
            return Err(CipherError::validation(format!(
                "unsupported key length {other}"
            )))
        }
    };
    Ok(out)
}

fn decrypt_bytes(key: &[u8], iv: &[u8], cipher_bytes: &[u8]) -> Result<String, CipherError> {
    let invalid = |e: aes::cipher::InvalidLength| CipherError::validation(e.to_string());
    let clear = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<Pkcs7>(cipher_bytes),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<Pkcs7>(cipher_bytes),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<Pkcs7>(cipher_bytes),
        other => {
            return Err(CipherError::validation(format!(
                "unsupported key length {other}"
            )))
        }
    }
    .map_err(|e| CipherError::decrypt(format!("bad padding: {e}")))?;

    String::from_utf8(clear).map_err(|e| CipherError::decrypt(format!("clear text is not UTF-8: {e}")))
}
