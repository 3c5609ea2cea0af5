//! Intent record storage for netintent.
//!
//! This crate provides persistent storage for intent processing records. The
//! reconciliation core never touches the store directly: its caller reads one
//! stored snapshot per request and writes one terminal record back.
//!
//! # Architecture
//!
//! The `RocksDB` implementation uses the following column families:
//!
//! - `intents`: Primary [`IntentData`] records, keyed by intent key
//! - `intents_by_state`: Index for listing intents by lifecycle state
//! - `intents_by_app`: Index for listing intents by owning application
//!
//! Writes go through [`IntentData::is_update_acceptable`], so a stale
//! terminal record can never overwrite a newer one.
//!
//! # Example
//!
//! ```no_run
//! use netintent_store::{IntentState, RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/netintent-db").unwrap();
//!
//! let failed = store.list_intent_data_by_state(IntentState::Failed).unwrap();
//! println!("{} failed intents", failed.len());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use rocks::RocksStore;
pub use types::{IntentData, IntentState, Request, Version};

use netintent_core::{ApplicationId, Key};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    /// Write a record if it is newer than what is stored.
    ///
    /// Returns `false` (and leaves the stored record untouched) when
    /// [`IntentData::is_update_acceptable`] rejects the write. This also
    /// maintains the state and application indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn write_intent_data(&self, data: &IntentData) -> Result<bool>;

    /// Get the record stored under a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_intent_data(&self, key: &Key) -> Result<Option<IntentData>>;

    /// Delete the record stored under a key.
    ///
    /// This also removes the record from all indexes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored under the key.
    fn delete_intent_data(&self, key: &Key) -> Result<()>;

    /// List every stored record.
    ///
    /// Use with caution in production; prefer filtered queries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_intent_data(&self) -> Result<Vec<IntentData>>;

    /// List all records in a given state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_intent_data_by_state(&self, state: IntentState) -> Result<Vec<IntentData>>;

    /// List all records owned by an application.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_intent_data_by_app(&self, app_id: &ApplicationId) -> Result<Vec<IntentData>>;

    /// Count stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_intent_data(&self) -> Result<u64>;
}
