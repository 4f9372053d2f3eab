use std::{
    fs::{self, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use appsettings_core::{validate_key, SettingsError, SettingsProvider};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::{
    cipher::AesCipher,
    collection::SettingsCollection,
    config::{StoreConfig, DEFAULT_CACHE_TTL_SECS},
    key_pair::SymmetricKeyPair,
    key_provider::KeyPairProvider,
};

/// Protobuf file-backed settings store with a TTL-bounded in-memory copy.
///
/// Every write rewrites the whole file, so all operations run under one lock:
/// validate, load, mutate and persist happen as a single critical section.
/// One process per file; nothing guards against other processes.
pub struct SettingsFileStore {
    path: PathBuf,
    key_pair: Option<SymmetricKeyPair>,
    cipher: AesCipher,
    ttl: Duration,
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: Option<LoadedCollection>,
}

#[derive(Debug)]
struct LoadedCollection {
    collection: SettingsCollection,
    loaded_at: Instant,
}

impl CacheState {
    /// Cached collection while younger than `ttl`, otherwise a fresh read of `path`.
    fn load(&mut self, path: &Path, ttl: Duration) -> Result<&mut SettingsCollection, SettingsError> {
        let loaded = match self.loaded.take() {
            Some(loaded) if loaded.loaded_at.elapsed() < ttl => loaded,
            _ => {
                let collection = read_collection(path)?;
                debug!(?path, entries = collection.items.len(), "settings reloaded");
                LoadedCollection {
                    collection,
                    loaded_at: Instant::now(),
                }
            }
        };
        Ok(&mut self.loaded.insert(loaded).collection)
    }
}

impl SettingsFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key_pair: None,
            cipher: AesCipher::new(),
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn with_key_pair(mut self, key_pair: SymmetricKeyPair) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    /// Take the key pair from `provider`, creating and storing one on first use.
    pub fn with_key_provider(self, provider: &dyn KeyPairProvider) -> Result<Self, SettingsError> {
        let pair = provider.get_or_create()?;
        Ok(self.with_key_pair(pair))
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Build a store from loaded configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self, SettingsError> {
        let mut store = Self::new(config.location.clone()).with_cache_ttl(config.cache_ttl());
        if let Some(pair) = config.resolve_key_pair()? {
            store = store.with_key_pair(pair);
        }
        debug!(path = ?store.path, encrypted = store.key_pair.is_some(), "settings store configured");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    /// Forget the cached collection; the next access reads the file again.
    pub fn invalidate(&self) -> Result<(), SettingsError> {
        self.lock()?.loaded = None;
        Ok(())
    }

    /// Stored keys in insertion order.
    pub fn keys(&self) -> Result<Vec<String>, SettingsError> {
        let mut state = self.lock()?;
        let collection = state.load(&self.path, self.ttl)?;
        Ok(collection.keys().map(str::to_owned).collect())
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, SettingsError> {
        validate_key(key)?;
        let mut state = self.lock()?;
        let collection = state.load(&self.path, self.ttl)?;
        Ok(collection.find(key).is_some())
    }

    /// Whether the persisted collection has been written by this store at least once.
    pub fn is_initialized(&self) -> Result<bool, SettingsError> {
        let mut state = self.lock()?;
        Ok(state.load(&self.path, self.ttl)?.initialized)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>, SettingsError> {
        self.state.lock().map_err(|err| SettingsError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }

    fn validate(&self, key: &str, encrypted: bool) -> Result<(), SettingsError> {
        validate_key(key)?;
        if encrypted {
            self.key_pair()?;
        }
        Ok(())
    }

    fn key_pair(&self) -> Result<&SymmetricKeyPair, SettingsError> {
        self.key_pair
            .as_ref()
            .ok_or_else(|| SettingsError::validation(appsettings_core::error::NO_KEY_PAIR))
    }
}

impl SettingsProvider for SettingsFileStore {
    #[instrument(skip_all, fields(key = %key, encrypted = encrypted))]
    fn read(&self, key: &str, encrypted: bool) -> Result<Option<String>, SettingsError> {
        self.validate(key, encrypted)?;

        let stored = {
            let mut state = self.lock()?;
            let collection = state.load(&self.path, self.ttl)?;
            match collection.find(key) {
                Some(entry) => entry.value.clone(),
                None => return Ok(None),
            }
        };

        if !encrypted {
            return Ok(Some(stored));
        }
        let clear_text = self.cipher.decrypt(&stored, self.key_pair()?)?;
        Ok(Some(clear_text))
    }

    #[instrument(skip_all, fields(key = %key, encrypted = encrypted))]
    fn write(&self, key: &str, text: &str, encrypted: bool) -> Result<(), SettingsError> {
        self.validate(key, encrypted)?;

        let value = if encrypted {
            self.cipher.encrypt(text, self.key_pair()?)?
        } else {
            text.to_owned()
        };

        let mut state = self.lock()?;
        let collection = state.load(&self.path, self.ttl)?;
        let inserted = collection.upsert(key, value);
        collection.initialized = true;

        if let Err(err) = write_collection(&self.path, collection) {
            // Memory must not run ahead of the file.
            state.loaded = None;
            return Err(err);
        }
        debug!(inserted, "settings persisted");
        Ok(())
    }

    #[instrument(skip_all)]
    fn clear(&self) -> Result<(), SettingsError> {
        let mut state = self.lock()?;
        state.loaded = None;
        match fs::remove_file(&self.path) {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(storage_err(err)),
        }
        debug!(path = ?self.path, "settings cleared");
        Ok(())
    }
}

/// Open (creating if absent) and decode the whole file.
fn read_collection(path: &Path) -> Result<SettingsCollection, SettingsError> {
    fs::create_dir_all(parent_dir(path)).map_err(storage_err)?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(storage_err)?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(storage_err)?;
    SettingsCollection::from_bytes(&buf).map_err(|e| SettingsError::Storage {
        reason: format!("corrupt settings file {}: {e}", path.display()),
    })
}

/// Replace the file with the encoded collection in one rename.
fn write_collection(path: &Path, collection: &SettingsCollection) -> Result<(), SettingsError> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    tmp.write_all(&collection.to_bytes()).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn storage_err<E: ToString>(err: E) -> SettingsError {
    SettingsError::Storage {
        reason: err.to_string(),
    }
}
