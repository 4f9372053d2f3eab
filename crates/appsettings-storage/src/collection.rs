//! Protobuf layout of the persisted settings blob.

use prost::Message;

/// One key/value pair; `value` is structured text or base64 ciphertext.
#[derive(Clone, PartialEq, Message)]
pub struct SettingEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Everything persisted in the settings file.
#[derive(Clone, PartialEq, Message)]
pub struct SettingsCollection {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<SettingEntry>,
    #[prost(bool, tag = "100")]
    pub initialized: bool,
}

impl SettingsCollection {
    /// Parse a persisted blob; zero bytes is an empty collection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn find(&self, key: &str) -> Option<&SettingEntry> {
        self.items.iter().find(|entry| entry.key == key)
    }

    /// Overwrite the value for `key`, appending a new entry if it is absent.
    /// Returns `true` when a new entry was inserted.
    pub fn upsert(&mut self, key: &str, value: String) -> bool {
        if let Some(entry) = self.items.iter_mut().find(|entry| entry.key == key) {
            entry.value = value;
            return false;
        }
        self.items.push(SettingEntry {
            key: key.to_string(),
            value,
        });
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|entry| entry.key.as_str())
    }
}
