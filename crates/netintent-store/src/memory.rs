//! In-memory storage implementation.
//!
//! Keeps records in a lock-protected map. Used by tests and by embedders that
//! do not need durability.

use std::collections::HashMap;

use netintent_core::{ApplicationId, Key};
use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::types::{IntentData, IntentState};
use crate::Store;

/// A `Store` backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Key, IntentData>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn filtered(&self, keep: impl Fn(&IntentData) -> bool) -> Vec<IntentData> {
        self.records
            .read()
            .values()
            .filter(|data| keep(data))
            .cloned()
            .collect()
    }
}

impl Store for MemoryStore {
    fn write_intent_data(&self, data: &IntentData) -> Result<bool> {
        let mut records = self.records.write();
        let key = data.key();
        if !IntentData::is_update_acceptable(records.get(&key), data) {
            tracing::debug!(key = %key, version = %data.version, "Rejected stale intent write");
            return Ok(false);
        }
        records.insert(key, data.clone());
        Ok(true)
    }

    fn get_intent_data(&self, key: &Key) -> Result<Option<IntentData>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn delete_intent_data(&self, key: &Key) -> Result<()> {
        self.records
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound(*key))
    }

    fn list_intent_data(&self) -> Result<Vec<IntentData>> {
        Ok(self.filtered(|_| true))
    }

    fn list_intent_data_by_state(&self, state: IntentState) -> Result<Vec<IntentData>> {
        Ok(self.filtered(|data| data.state == state))
    }

    fn list_intent_data_by_app(&self, app_id: &ApplicationId) -> Result<Vec<IntentData>> {
        Ok(self.filtered(|data| data.intent.app_id() == app_id))
    }

    fn count_intent_data(&self) -> Result<u64> {
        Ok(self.records.read().len() as u64)
    }
}
