//! Concrete settings storage: a protobuf file with a TTL cache and AES-CBC encrypted entries.
//! Key pairs come from configuration, the OS keyring, or test doubles.

pub mod cipher;
pub mod collection;
pub mod config;
pub mod file_store;
pub mod key_pair;
pub mod key_provider;

pub use cipher::{AesCipher, CipherError};
pub use config::StoreConfig;
pub use file_store::SettingsFileStore;
pub use key_pair::SymmetricKeyPair;
pub use key_provider::{InMemoryKeyPairProvider, KeyPairProvider, KeyringProvider};
