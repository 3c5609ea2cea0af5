//! Durable intent records in `RocksDB`.
//!
//! Records are CBOR-encoded in the `intents` column family. The state and
//! application indexes are updated in the same write batch as the record.

use std::path::Path;
use std::sync::Arc;

use netintent_core::{ApplicationId, Key};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{IntentData, IntentState};
use crate::Store;

/// A `Store` persisting intent records in `RocksDB`.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Resolve every key found under `prefix` in an index column family.
    fn scan_index(
        &self,
        index: &str,
        prefix: &[u8],
        extract: fn(&[u8]) -> Key,
    ) -> Result<Vec<IntentData>> {
        let cf_index = self.cf(index)?;

        let mut records = Vec::new();
        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(prefix, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (index_key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !index_key.starts_with(prefix) {
                break;
            }

            if let Some(data) = self.get_intent_data(&extract(&index_key))? {
                records.push(data);
            }
        }

        Ok(records)
    }
}

impl Store for RocksStore {
    fn write_intent_data(&self, data: &IntentData) -> Result<bool> {
        let cf_intents = self.cf(cf::INTENTS)?;
        let cf_by_state = self.cf(cf::INTENTS_BY_STATE)?;
        let cf_by_app = self.cf(cf::INTENTS_BY_APP)?;

        let key = data.key();
        let current = self.get_intent_data(&key)?;
        if !IntentData::is_update_acceptable(current.as_ref(), data) {
            tracing::debug!(
                key = %key,
                version = %data.version,
                state = %data.state,
                "Rejected stale intent write"
            );
            return Ok(false);
        }

        let record_key = keys::intent_key(&key);
        let state_key = keys::state_intent_key(data.state.as_u8(), &key);
        let app_key = keys::app_intent_key(data.intent.app_id(), &key);
        let value = Self::serialize(data)?;

        let mut batch = WriteBatch::default();

        // Update main record
        batch.put_cf(&cf_intents, &record_key, &value);

        // Update state index if state changed
        if let Some(old) = &current {
            if old.state != data.state {
                let old_state_key = keys::state_intent_key(old.state.as_u8(), &key);
                batch.delete_cf(&cf_by_state, &old_state_key);
            }
        }
        batch.put_cf(&cf_by_state, &state_key, []);

        // Update app index (idempotent)
        batch.put_cf(&cf_by_app, &app_key, []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn get_intent_data(&self, key: &Key) -> Result<Option<IntentData>> {
        let cf = self.cf(cf::INTENTS)?;

        self.db
            .get_cf(&cf, keys::intent_key(key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete_intent_data(&self, key: &Key) -> Result<()> {
        let cf_intents = self.cf(cf::INTENTS)?;
        let cf_by_state = self.cf(cf::INTENTS_BY_STATE)?;
        let cf_by_app = self.cf(cf::INTENTS_BY_APP)?;

        // Get the record to find state and owner
        let data = self
            .get_intent_data(key)?
            .ok_or(StoreError::NotFound(*key))?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_intents, keys::intent_key(key));
        batch.delete_cf(&cf_by_state, keys::state_intent_key(data.state.as_u8(), key));
        batch.delete_cf(&cf_by_app, keys::app_intent_key(data.intent.app_id(), key));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_intent_data(&self) -> Result<Vec<IntentData>> {
        let cf = self.cf(cf::INTENTS)?;

        let mut records = Vec::new();
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);

        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            records.push(Self::deserialize(&value)?);
        }

        Ok(records)
    }

    fn list_intent_data_by_state(&self, state: IntentState) -> Result<Vec<IntentData>> {
        self.scan_index(
            cf::INTENTS_BY_STATE,
            &keys::state_prefix(state.as_u8()),
            keys::extract_key_from_state_key,
        )
    }

    fn list_intent_data_by_app(&self, app_id: &ApplicationId) -> Result<Vec<IntentData>> {
        self.scan_index(
            cf::INTENTS_BY_APP,
            &keys::app_prefix(app_id),
            keys::extract_key_from_app_key,
        )
    }

    fn count_intent_data(&self) -> Result<u64> {
        let cf = self.cf(cf::INTENTS)?;

        let mut count = 0u64;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(|e| StoreError::Database(e.to_string()))?;
            count += 1;
        }

        Ok(count)
    }
}
