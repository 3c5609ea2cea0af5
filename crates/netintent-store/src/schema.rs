//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary intent records, keyed by intent key.
    pub const INTENTS: &str = "intents";

    /// Index: intents by state, keyed by `state || key`.
    pub const INTENTS_BY_STATE: &str = "intents_by_state";

    /// Index: intents by application, keyed by `app_id || key`.
    pub const INTENTS_BY_APP: &str = "intents_by_app";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::INTENTS, cf::INTENTS_BY_STATE, cf::INTENTS_BY_APP]
}
