//! Value codecs
//!
//! A codec turns a typed value into the single-line string stored after the
//! `=` of a settings line, and back. Callers pick the codec per value type;
//! [`JsonCodec`] is what [`SettingsStore::get`](crate::SettingsStore::get) and
//! [`SettingsStore::set`](crate::SettingsStore::set) use.

use crate::error::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Display;
use std::str::FromStr;

/// Encodes and decodes values of type `T` for storage
pub trait ValueCodec<T>: Send + Sync {
    /// Encode a value to its stored string form
    fn encode(&self, value: &T) -> Result<String>;

    /// Decode a stored string back into a value
    fn decode(&self, raw: &str) -> Result<T>;
}

// =============================================================================
// JSON Codec
// =============================================================================

/// Compact JSON codec for any serde type (default)
///
/// Compact `serde_json` output never contains a raw line break, so every value
/// fits on one settings line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> ValueCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(Error::from)
    }

    fn decode(&self, raw: &str) -> Result<T> {
        serde_json::from_str(raw).map_err(|e| Error::Parse(e.to_string()))
    }
}

// =============================================================================
// Parse Codec
// =============================================================================

/// Plain-text codec using `Display` / `FromStr`
///
/// Useful for values that should stay human-editable in the file, such as
/// numbers, paths or enum names with a custom `FromStr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseCodec;

impl<T> ValueCodec<T> for ParseCodec
where
    T: Display + FromStr,
    T::Err: Display,
{
    fn encode(&self, value: &T) -> Result<String> {
        Ok(value.to_string())
    }

    fn decode(&self, raw: &str) -> Result<T> {
        raw.parse::<T>().map_err(|e| Error::Parse(e.to_string()))
    }
}
