//! Durable key-value storage consumed by the audit and backup components.

mod error;
mod memory;
mod schema;
mod sqlite;

use async_trait::async_trait;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use sqlite::{default_store_path, SqliteStore};

/// Key holding the persisted audit log.
pub const AUDIT_LOGS_KEY: &str = "audit_logs";

/// Key holding the bounded list of high and critical entries.
pub const CRITICAL_EVENTS_KEY: &str = "critical_events";

/// Key holding the backup index.
pub const BACKUP_INDEX_KEY: &str = "backup_data";

/// Prefix for backup payload keys.
pub const BACKUP_PAYLOAD_PREFIX: &str = "backup_";

/// Returns the store key holding the payload of a backup.
#[must_use]
pub fn backup_payload_key(id: &str) -> String {
    format!("{BACKUP_PAYLOAD_PREFIX}{id}")
}

/// String key-value store with durable semantics.
///
/// A `set` that returns `Ok` must be visible to every later `get`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
