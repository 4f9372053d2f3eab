use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use appsettings_core::SettingsError;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key_pair::SymmetricKeyPair;

/// Default location of the settings blob, relative to the working directory.
pub const DEFAULT_LOCATION: &str = "./settings.bin";
/// Default maximum age of the cached collection.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

pub const ENV_LOCATION: &str = "APPSETTINGS_LOCATION";
pub const ENV_CACHE_TTL_SECS: &str = "APPSETTINGS_CACHE_TTL_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config dir available")]
    NoConfigDir,
}

/// Store configuration, loaded from `~/.config/appsettings/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the persisted settings blob.
    pub location: PathBuf,
    /// Seconds a loaded collection is trusted before the file is read again.
    pub cache_ttl_secs: u64,
    /// Key pair for encrypted entries; only needed when encryption is used.
    pub key_pair: Option<KeyPairConfig>,
}

/// Base64-encoded key pair halves.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyPairConfig {
    pub key: String,
    pub iv: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from(DEFAULT_LOCATION),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            key_pair: None,
        }
    }
}

impl StoreConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Decode the configured key pair, if any.
    pub fn resolve_key_pair(&self) -> Result<Option<SymmetricKeyPair>, SettingsError> {
        self.key_pair
            .as_ref()
            .map(|cfg| SymmetricKeyPair::from_base64(&cfg.key, &cfg.iv))
            .transpose()
            .map_err(SettingsError::from)
    }

    /// Apply `APPSETTINGS_*` environment variables on top of the loaded values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup; unparseable values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(location) = lookup(ENV_LOCATION).filter(|v| !v.trim().is_empty()) {
            self.location = PathBuf::from(location);
        }
        if let Some(ttl) = lookup(ENV_CACHE_TTL_SECS).and_then(|v| v.trim().parse().ok()) {
            self.cache_ttl_secs = ttl;
        }
        self
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<StoreConfig, ConfigError> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<StoreConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(StoreConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(StoreConfig::default());
    }
    let cfg: StoreConfig = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf, ConfigError> {
    let base = config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("appsettings").join("config.toml"))
}

/// Write `config` to `path` unless a file is already there.
pub fn write_if_missing(config: &StoreConfig, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
