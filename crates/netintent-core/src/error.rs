//! Common error types for netintent.
//!
//! This module provides shared error types that are used across multiple crates.

use crate::ids::Key;
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the netintent system.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No intent is recorded under the specified key.
    #[error("intent not found: {0}")]
    IntentNotFound(Key),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
