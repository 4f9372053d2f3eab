use std::sync::{Arc, Mutex};

use appsettings_core::SettingsError;
use thiserror::Error;

use crate::key_pair::SymmetricKeyPair;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

impl From<KeyError> for SettingsError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Decode(_) => SettingsError::validation(err.to_string()),
            KeyError::Keyring(_) | KeyError::Generation(_) => SettingsError::storage(err.to_string()),
        }
    }
}

/// Supplies the key pair for encrypted settings (OS keychain in production; memory in tests).
pub trait KeyPairProvider: Send + Sync {
    fn get_or_create(&self) -> Result<SymmetricKeyPair, KeyError>;
}

/// OS keyring-backed provider. The pair is stored as `base64(key):base64(iv)`.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

impl KeyPairProvider for KeyringProvider {
    fn get_or_create(&self) -> Result<SymmetricKeyPair, KeyError> {
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;

        if let Ok(secret) = entry.get_password() {
            return decode_key_pair(&secret);
        }

        let pair = SymmetricKeyPair::generate();
        entry
            .set_password(&encode_key_pair(&pair))
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(pair)
    }
}

/// In-memory key pair provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyPairProvider {
    inner: Arc<Mutex<Option<SymmetricKeyPair>>>,
}

impl InMemoryKeyPairProvider {
    /// Start with a known pair instead of generating one lazily.
    pub fn with_pair(pair: SymmetricKeyPair) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(pair))),
        }
    }
}

impl KeyPairProvider for InMemoryKeyPairProvider {
    fn get_or_create(&self) -> Result<SymmetricKeyPair, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let pair = SymmetricKeyPair::generate();
        *guard = Some(pair.clone());
        Ok(pair)
    }
}

fn encode_key_pair(pair: &SymmetricKeyPair) -> String {
    let (key, iv) = pair.to_base64();
    format!("{key}:{iv}")
}

fn decode_key_pair(secret: &str) -> Result<SymmetricKeyPair, KeyError> {
    let (key, iv) = secret
        .split_once(':')
        .ok_or_else(|| KeyError::Decode("expected `key:iv`".to_string()))?;
    SymmetricKeyPair::from_base64(key, iv).map_err(|e| KeyError::Decode(e.to_string()))
}
