use thiserror::Error;

use crate::codec::ConversionError;

/// Message used when a read or write is attempted with an empty key.
pub const EMPTY_KEY: &str = "settings key must not be null or empty";

/// Message used when encryption is requested but no key pair is configured.
pub const NO_KEY_PAIR: &str = "no encryption key pair has been set";

/// Errors produced by settings providers and the facade over them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// Caller supplied input that can never succeed (empty key, missing key pair).
    #[error("validation failed: {reason}")]
    Validation { reason: String },
    /// Stored or decrypted text could not be turned into the requested type.
    #[error("conversion failed: {reason}")]
    Conversion { reason: String },
    /// Underlying persistence failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
    /// An asynchronous operation was cancelled before it started.
    #[error("operation cancelled before it started")]
    Cancelled,
}

impl SettingsError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }
}

impl From<ConversionError> for SettingsError {
    fn from(err: ConversionError) -> Self {
        Self::Conversion {
            reason: err.to_string(),
        }
    }
}

/// Reject null/empty keys; every provider calls this before touching storage.
pub fn validate_key(key: &str) -> Result<(), SettingsError> {
    if key.is_empty() {
        return Err(SettingsError::validation(EMPTY_KEY));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        let err = validate_key("").expect_err("empty key should fail");
        assert_eq!(err, SettingsError::validation(EMPTY_KEY));
        assert!(validate_key("theme").is_ok());
    }

    #[test]
    fn conversion_error_maps_to_conversion_variant() {
        let err: SettingsError = ConversionError::new("i32", "not a number").into();
        assert!(matches!(err, SettingsError::Conversion { .. }));
        assert!(err.to_string().contains("i32"));
    }
}
