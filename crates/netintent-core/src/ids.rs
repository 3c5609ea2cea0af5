//! Core identifier types for netintent.
//!
//! This module provides strongly-typed identifiers for intents, intent keys,
//! and the applications that own them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 16-byte intent identifier based on UUID v4.
///
/// Every `Intent` instance receives a fresh id, so a resubmitted intent with
/// the same key still carries a distinct identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntentId(uuid::Uuid);

impl IntentId {
    /// Create a new `IntentId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random `IntentId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for IntentId {
    type Err = IdError;

    /// Parse an `IntentId` from a UUID string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntentId({})", self.0)
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for IntentId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IntentId> for String {
    fn from(id: IntentId) -> Self {
        id.0.to_string()
    }
}

/// Identifies the application that owns an intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId {
    id: u16,
    name: String,
}

impl ApplicationId {
    /// Create an application identifier.
    #[must_use]
    pub fn new(id: u16, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Numeric application id, used as the index prefix in storage.
    #[must_use]
    pub const fn id(&self) -> u16 {
        self.id
    }

    /// Application name, e.g. `org.example.fwd`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.name)
    }
}

/// A 32-byte application-scoped intent key, derived via blake3.
///
/// The key is what the store indexes on: successive versions of "the same"
/// intent (resubmits, withdraws, purges) share a key even though each
/// `Intent` value has its own `IntentId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key([u8; 32]);

impl Key {
    /// Create a new `Key` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the key for `name` within the scope of `app_id`.
    ///
    /// The same name under two different applications yields two keys.
    #[must_use]
    pub fn of(name: &str, app_id: &ApplicationId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&app_id.id().to_le_bytes());
        hasher.update(app_id.name().as_bytes());
        hasher.update(name.as_bytes());

        Self(*hasher.finalize().as_bytes())
    }

    /// Parse a `Key` from a hex-encoded string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not exactly 64 characters.
    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        let bytes = hex::decode(s).map_err(|_| IdError::InvalidHex)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| IdError::InvalidLength {
            expected: 32,
            got: s.len() / 2,
        })?;
        Ok(Self(arr))
    }

    /// Return the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Return the hex-encoded string representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.to_hex())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for Key {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_hex()
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input string contains invalid hexadecimal characters.
    #[error("invalid hex encoding")]
    InvalidHex,

    /// The input has an incorrect length.
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// The expected number of bytes.
        expected: usize,
        /// The actual number of bytes.
        got: usize,
    },

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> ApplicationId {
        ApplicationId::new(7, "org.example.fwd")
    }

    #[test]
    fn key_is_deterministic() {
        let k1 = Key::of("h1-h2", &app());
        let k2 = Key::of("h1-h2", &app());
        assert_eq!(k1, k2);

        let k3 = Key::of("h2-h3", &app());
        assert_ne!(k1, k3);
    }

    #[test]
    fn key_is_app_scoped() {
        let other = ApplicationId::new(8, "org.example.other");
        assert_ne!(Key::of("h1-h2", &app()), Key::of("h1-h2", &other));
    }

    #[test]
    fn key_hex_roundtrip() {
        let key = Key::of("h1-h2", &app());
        let parsed = Key::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn key_invalid_hex() {
        assert!(matches!(Key::from_hex("zz-not-hex"), Err(IdError::InvalidHex)));
        assert!(matches!(
            Key::from_hex("deadbeef"),
            Err(IdError::InvalidLength { .. })
        ));
    }

    #[test]
    fn intent_id_unique() {
        assert_ne!(IntentId::generate(), IntentId::generate());
    }

    #[test]
    fn intent_id_parse() {
        let id = IntentId::generate();
        let parsed = IntentId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(matches!(
            IntentId::from_str("not-a-uuid"),
            Err(IdError::InvalidUuid)
        ));
    }

    #[test]
    fn key_serde_json() {
        let key = Key::of("h1-h2", &app());
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.to_hex()));
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn application_id_display() {
        assert_eq!(app().to_string(), "7:org.example.fwd");
    }
}
