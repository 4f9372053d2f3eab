//! Typed settings facade.
//!
//! [`AppSettings`] wraps an optional [`SettingsProvider`]. Without one every read
//! yields nothing and every write reports `false`, so callers cannot tell "never
//! set" from "no backend". Each operation has an `_async` mirror that runs the
//! same synchronous call on the blocking pool.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{instrument, warn};

pub use appsettings_core::{
    Codec, ConversionError, InMemorySettingsProvider, Json, SettingsError, SettingsProvider,
    SettingsProviderExt,
};
pub use tokio_util::sync::CancellationToken;

/// Provider handle shared between the facade and its worker tasks.
pub type SharedProvider = Arc<dyn SettingsProvider>;

#[derive(Default)]
pub struct AppSettings {
    provider: RwLock<Option<SharedProvider>>,
}

impl AppSettings {
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider: RwLock::new(Some(provider)),
        }
    }

    /// Facade with no backend; reads are empty and writes return `false`.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Rebind (or unbind) the backing provider.
    pub fn reset_provider(&self, provider: Option<SharedProvider>) {
        *self
            .provider
            .write()
            .unwrap_or_else(PoisonError::into_inner) = provider;
    }

    pub fn has_provider(&self) -> bool {
        self.provider().is_some()
    }

    fn provider(&self) -> Option<SharedProvider> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Value for `key`, `Ok(None)` when unset or when no provider is bound.
    #[instrument(skip(self))]
    pub fn get<T: Codec>(&self, key: &str, encrypted: bool) -> Result<Option<T>, SettingsError> {
        read_value(self.provider().as_deref(), key, encrypted)
    }

    /// Like [`AppSettings::get`], with `default` standing in for an absent value.
    pub fn get_or<T: Codec>(
        &self,
        key: &str,
        default: T,
        encrypted: bool,
    ) -> Result<T, SettingsError> {
        Ok(self.get(key, encrypted)?.unwrap_or(default))
    }

    /// Never fails: any error, including validation and storage failures, yields `default`.
    pub fn get_lenient<T: Codec>(&self, key: &str, default: T, encrypted: bool) -> T {
        lenient(key, self.get(key, encrypted), default)
    }

    /// Lenient accessor for serde objects and enums stored as JSON.
    pub fn get_object<T>(&self, key: &str, default: T, encrypted: bool) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        self.get_lenient(key, Json(default), encrypted).into_inner()
    }

    /// Store `value`; `Ok(false)` when no provider is bound.
    #[instrument(skip(self, value))]
    pub fn set<T: Codec>(&self, key: &str, value: &T, encrypted: bool) -> Result<bool, SettingsError> {
        write_value(self.provider().as_deref(), key, value, encrypted)
    }

    /// Drop every stored setting; `Ok(false)` when no provider is bound.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<bool, SettingsError> {
        clear_all(self.provider().as_deref())
    }

    pub async fn get_async<T>(
        &self,
        key: &str,
        encrypted: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, SettingsError>
    where
        T: Codec + Send + 'static,
    {
        let key = key.to_owned();
        self.offload(cancel, move |provider| {
            read_value(provider.as_deref(), &key, encrypted)
        })
        .await
    }

    pub async fn get_or_async<T>(
        &self,
        key: &str,
        default: T,
        encrypted: bool,
        cancel: &CancellationToken,
    ) -> Result<T, SettingsError>
    where
        T: Codec + Send + 'static,
    {
        Ok(self
            .get_async(key, encrypted, cancel)
            .await?
            .unwrap_or(default))
    }

    /// Async [`AppSettings::get_lenient`]; cancellation also yields `default`.
    pub async fn get_lenient_async<T>(
        &self,
        key: &str,
        default: T,
        encrypted: bool,
        cancel: &CancellationToken,
    ) -> T
    where
        T: Codec + Send + 'static,
    {
        let result = self.get_async(key, encrypted, cancel).await;
        lenient(key, result, default)
    }

    pub async fn get_object_async<T>(
        &self,
        key: &str,
        default: T,
        encrypted: bool,
        cancel: &CancellationToken,
    ) -> T
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.get_lenient_async(key, Json(default), encrypted, cancel)
            .await
            .into_inner()
    }

    pub async fn set_async<T>(
        &self,
        key: &str,
        value: T,
        encrypted: bool,
        cancel: &CancellationToken,
    ) -> Result<bool, SettingsError>
    where
        T: Codec + Send + 'static,
    {
        let key = key.to_owned();
        self.offload(cancel, move |provider| {
            write_value(provider.as_deref(), &key, &value, encrypted)
        })
        .await
    }

    pub async fn clear_async(&self, cancel: &CancellationToken) -> Result<bool, SettingsError> {
        self.offload(cancel, |provider| clear_all(provider.as_deref()))
            .await
    }

    /// Run `work` on the blocking pool. The token is honored until the worker
    /// picks the job up; a started operation always runs to completion.
    async fn offload<R, F>(&self, cancel: &CancellationToken, work: F) -> Result<R, SettingsError>
    where
        R: Send + 'static,
        F: FnOnce(Option<SharedProvider>) -> Result<R, SettingsError> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(SettingsError::Cancelled);
        }
        let provider = self.provider();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            if cancel.is_cancelled() {
                return Err(SettingsError::Cancelled);
            }
            work(provider)
        })
        .await
        .map_err(|err| SettingsError::storage(format!("settings worker failed: {err}")))?
    }
}

fn read_value<T: Codec>(
    provider: Option<&dyn SettingsProvider>,
    key: &str,
    encrypted: bool,
) -> Result<Option<T>, SettingsError> {
    match provider {
        Some(provider) => provider.get(key, encrypted),
        None => Ok(None),
    }
}

fn write_value<T: Codec>(
    provider: Option<&dyn SettingsProvider>,
    key: &str,
    value: &T,
    encrypted: bool,
) -> Result<bool, SettingsError> {
    match provider {
        Some(provider) => provider.set(key, value, encrypted).map(|()| true),
        None => Ok(false),
    }
}

fn clear_all(provider: Option<&dyn SettingsProvider>) -> Result<bool, SettingsError> {
    match provider {
        Some(provider) => provider.clear().map(|()| true),
        None => Ok(false),
    }
}

fn lenient<T>(key: &str, result: Result<Option<T>, SettingsError>, default: T) -> T {
    match result {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(err) => {
            warn!(key, error = %err, "setting unreadable, falling back to default");
            default
        }
    }
}
