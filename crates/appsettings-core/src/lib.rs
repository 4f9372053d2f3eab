//! Core abstractions for typed settings: error taxonomy, value codecs and the provider contract.
//! Kept free of storage and crypto dependencies so hosts can supply their own backends.

pub mod codec;
pub mod error;
pub mod provider;

pub use codec::{Codec, ConversionError, Json};
pub use error::{validate_key, SettingsError};
pub use provider::{InMemorySettingsProvider, SettingsProvider, SettingsProviderExt};
