//! Text encodings for setting values.
//!
//! Plain entries persist the structured (JSON) form returned by [`Codec::encode`].
//! Encrypted entries hand [`Codec::to_clear_text`] to the cipher instead, which for
//! string-backed types is the bare text rather than a quoted JSON string.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// A stored value could not be converted to (or from) the requested type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot convert to {target}: {reason}")]
pub struct ConversionError {
    target: &'static str,
    reason: String,
}

impl ConversionError {
    pub fn new(target: &'static str, reason: impl ToString) -> Self {
        Self {
            target,
            reason: reason.to_string(),
        }
    }

    /// Name of the type the conversion was aiming for.
    pub fn target(&self) -> &'static str {
        self.target
    }
}

/// Encode/decode capability implemented once per supported value type.
pub trait Codec: Sized {
    /// Structured text persisted for plain entries.
    fn encode(&self) -> Result<String, ConversionError>;

    /// Inverse of [`Codec::encode`].
    fn decode(stored: &str) -> Result<Self, ConversionError>;

    /// Text handed to the cipher when the entry is written encrypted.
    fn to_clear_text(&self) -> Result<String, ConversionError> {
        self.encode()
    }

    /// Inverse of [`Codec::to_clear_text`], applied to decrypted text.
    fn from_clear_text(text: &str) -> Result<Self, ConversionError> {
        Self::decode(text)
    }
}

macro_rules! json_codec {
    ($($ty:ty),* $(,)?) => {$(
        impl Codec for $ty {
            fn encode(&self) -> Result<String, ConversionError> {
                serde_json::to_string(self).map_err(|e| ConversionError::new(stringify!($ty), e))
            }

            fn decode(stored: &str) -> Result<Self, ConversionError> {
                serde_json::from_str(stored.trim())
                    .map_err(|e| ConversionError::new(stringify!($ty), e))
            }
        }
    )*};
}

json_codec!(bool, i16, i32, i64);

// JSON has no literal for non-finite numbers, so they travel as strings.
macro_rules! float_codec {
    ($($ty:ident),* $(,)?) => {$(
        impl Codec for $ty {
            fn encode(&self) -> Result<String, ConversionError> {
                if self.is_nan() {
                    return Ok("\"NaN\"".to_string());
                }
                if self.is_infinite() {
                    let text = if self.is_sign_positive() { "\"Infinity\"" } else { "\"-Infinity\"" };
                    return Ok(text.to_string());
                }
                serde_json::to_string(self).map_err(|e| ConversionError::new(stringify!($ty), e))
            }

            fn decode(stored: &str) -> Result<Self, ConversionError> {
                let stored = stored.trim();
                if let Ok(value) = serde_json::from_str::<$ty>(stored) {
                    return Ok(value);
                }
                let text: String = serde_json::from_str(stored)
                    .map_err(|e| ConversionError::new(stringify!($ty), e))?;
                match text.as_str() {
                    "NaN" => Ok($ty::NAN),
                    "Infinity" => Ok($ty::INFINITY),
                    "-Infinity" => Ok($ty::NEG_INFINITY),
                    other => other
                        .parse::<$ty>()
                        .map_err(|e| ConversionError::new(stringify!($ty), e)),
                }
            }
        }
    )*};
}

float_codec!(f32, f64);

impl Codec for String {
    fn encode(&self) -> Result<String, ConversionError> {
        serde_json::to_string(self).map_err(|e| ConversionError::new("String", e))
    }

    fn decode(stored: &str) -> Result<Self, ConversionError> {
        serde_json::from_str(stored).map_err(|e| ConversionError::new("String", e))
    }

    fn to_clear_text(&self) -> Result<String, ConversionError> {
        Ok(self.clone())
    }

    fn from_clear_text(text: &str) -> Result<Self, ConversionError> {
        Ok(text.to_owned())
    }
}

impl Codec for Decimal {
    fn encode(&self) -> Result<String, ConversionError> {
        Ok(self.to_string())
    }

    fn decode(stored: &str) -> Result<Self, ConversionError> {
        let stored = stored.trim();
        let text = if stored.starts_with('"') {
            serde_json::from_str::<String>(stored).map_err(|e| ConversionError::new("Decimal", e))?
        } else {
            stored.to_owned()
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| ConversionError::new("Decimal", e))
    }
}

// String-backed types persist as a JSON string of their text form and are
// encrypted as the bare text.
fn encode_text(target: &'static str, text: &str) -> Result<String, ConversionError> {
    serde_json::to_string(text).map_err(|e| ConversionError::new(target, e))
}

fn decode_text(target: &'static str, stored: &str) -> Result<String, ConversionError> {
    serde_json::from_str(stored).map_err(|e| ConversionError::new(target, e))
}

impl Codec for u8 {
    fn encode(&self) -> Result<String, ConversionError> {
        encode_text("u8", &self.to_clear_text()?)
    }

    fn decode(stored: &str) -> Result<Self, ConversionError> {
        Self::from_clear_text(&decode_text("u8", stored)?)
    }

    fn to_clear_text(&self) -> Result<String, ConversionError> {
        Ok(STANDARD.encode([*self]))
    }

    fn from_clear_text(text: &str) -> Result<Self, ConversionError> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| ConversionError::new("u8", e))?;
        bytes
            .first()
            .copied()
            .ok_or_else(|| ConversionError::new("u8", "no byte in payload"))
    }
}

impl Codec for Vec<u8> {
    fn encode(&self) -> Result<String, ConversionError> {
        encode_text("Vec<u8>", &self.to_clear_text()?)
    }

    fn decode(stored: &str) -> Result<Self, ConversionError> {
        Self::from_clear_text(&decode_text("Vec<u8>", stored)?)
    }

    fn to_clear_text(&self) -> Result<String, ConversionError> {
        Ok(STANDARD.encode(self))
    }

    fn from_clear_text(text: &str) -> Result<Self, ConversionError> {
        STANDARD
            .decode(text)
            .map_err(|e| ConversionError::new("Vec<u8>", e))
    }
}

impl Codec for DateTime<Utc> {
    fn encode(&self) -> Result<String, ConversionError> {
        encode_text("DateTime<Utc>", &self.to_clear_text()?)
    }

    fn decode(stored: &str) -> Result<Self, ConversionError> {
        Self::from_clear_text(&decode_text("DateTime<Utc>", stored)?)
    }

    fn to_clear_text(&self) -> Result<String, ConversionError> {
        Ok(self.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    fn from_clear_text(text: &str) -> Result<Self, ConversionError> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ConversionError::new("DateTime<Utc>", e))
    }
}

/// Wrapper storing any serde type (objects, enums) as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize + DeserializeOwned> Codec for Json<T> {
    fn encode(&self) -> Result<String, ConversionError> {
        serde_json::to_string(&self.0)
            .map_err(|e| ConversionError::new(std::any::type_name::<T>(), e))
    }

    fn decode(stored: &str) -> Result<Self, ConversionError> {
        serde_json::from_str(stored)
            .map(Json)
            .map_err(|e| ConversionError::new(std::any::type_name::<T>(), e))
    }
}
