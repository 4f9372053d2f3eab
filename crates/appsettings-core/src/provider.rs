use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    codec::Codec,
    error::{validate_key, SettingsError},
};

/// Text-level contract every settings backend implements.
///
/// `read` returns the text a [`Codec`] understands: the stored structured text for
/// plain entries, or the decrypted clear text for encrypted ones.
pub trait SettingsProvider: Send + Sync {
    /// Look up a key; `Ok(None)` when it was never set.
    fn read(&self, key: &str, encrypted: bool) -> Result<Option<String>, SettingsError>;

    /// Insert or overwrite a key, encrypting `text` first when requested.
    fn write(&self, key: &str, text: &str, encrypted: bool) -> Result<(), SettingsError>;

    /// Drop every entry and the persisted state behind them.
    fn clear(&self) -> Result<(), SettingsError>;
}

/// Typed accessors layered over any [`SettingsProvider`], trait objects included.
pub trait SettingsProviderExt: SettingsProvider {
    fn get<T: Codec>(&self, key: &str, encrypted: bool) -> Result<Option<T>, SettingsError> {
        let Some(text) = self.read(key, encrypted)? else {
            return Ok(None);
        };
        let value = if encrypted {
            T::from_clear_text(&text)?
        } else {
            T::decode(&text)?
        };
        Ok(Some(value))
    }

    fn set<T: Codec>(&self, key: &str, value: &T, encrypted: bool) -> Result<(), SettingsError> {
        validate_key(key)?;
        let text = if encrypted {
            value.to_clear_text()?
        } else {
            value.encode()?
        };
        self.write(key, &text, encrypted)
    }
}

impl<P: SettingsProvider + ?Sized> SettingsProviderExt for P {}

/// In-memory provider for tests and smoke runs.
/// Encrypted entries are only masked, never encrypted; not for real secrets.
#[derive(Debug, Default, Clone)]
pub struct InMemorySettingsProvider {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemorySettingsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SettingsProvider for InMemorySettingsProvider {
    fn read(&self, key: &str, encrypted: bool) -> Result<Option<String>, SettingsError> {
        validate_key(key)?;
        let map = self.inner.lock().map_err(|err| SettingsError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;

        let Some(stored) = map.get(key) else {
            return Ok(None);
        };
        let bytes = if encrypted {
            mask(stored)
        } else {
            stored.clone()
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|err| SettingsError::Conversion {
                reason: format!("stored bytes are not UTF-8: {err}"),
            })
    }

    fn write(&self, key: &str, text: &str, encrypted: bool) -> Result<(), SettingsError> {
        validate_key(key)?;
        let mut map = self.inner.lock().map_err(|err| SettingsError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;

        let stored = if encrypted {
            mask(text.as_bytes())
        } else {
            text.as_bytes().to_vec()
        };
        map.insert(key.to_string(), stored);
        Ok(())
    }

    fn clear(&self) -> Result<(), SettingsError> {
        let mut map = self.inner.lock().map_err(|err| SettingsError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.clear();
        Ok(())
    }
}

const MASK_BYTE: u8 = 0xA5;

// XOR is its own inverse.
fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}
