//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions to encode and decode keys for the intent
//! record and its indexes. All index keys support efficient prefix scans.

use netintent_core::{ApplicationId, Key};

/// Encode a primary record key (just the intent key bytes).
#[must_use]
pub fn intent_key(key: &Key) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// Encode a state index key: `state || key`.
///
/// This allows efficient prefix scans for all intents in a given state.
#[must_use]
pub fn state_intent_key(state: u8, key: &Key) -> Vec<u8> {
    let mut buf = Vec::with_capacity(33);
    buf.push(state);
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// Encode a state prefix for scanning all intents by state.
#[must_use]
pub fn state_prefix(state: u8) -> Vec<u8> {
    vec![state]
}

/// Extract the intent key from a state index key.
///
/// # Panics
///
/// Panics if the index key is not at least 33 bytes.
#[must_use]
pub fn extract_key_from_state_key(index_key: &[u8]) -> Key {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&index_key[1..33]);
    Key::from_bytes(bytes)
}

/// Encode an application index key: `app_id (big endian) || key`.
///
/// This allows efficient prefix scans for all intents owned by an application.
#[must_use]
pub fn app_intent_key(app_id: &ApplicationId, key: &Key) -> Vec<u8> {
    let mut buf = Vec::with_capacity(34);
    buf.extend_from_slice(&app_id.id().to_be_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// Encode an application prefix for scanning all intents by application.
#[must_use]
pub fn app_prefix(app_id: &ApplicationId) -> Vec<u8> {
    app_id.id().to_be_bytes().to_vec()
}

/// Extract the intent key from an application index key.
///
/// # Panics
///
/// Panics if the index key is not at least 34 bytes.
#[must_use]
pub fn extract_key_from_app_key(index_key: &[u8]) -> Key {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&index_key[2..34]);
    Key::from_bytes(bytes)
}
