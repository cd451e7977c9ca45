//! SQLite-backed key-value store with async operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::schema::SCHEMA;
use super::{KeyValueStore, StoreError};

/// Returns the default path for the vault database.
///
/// This is `~/.local/share/audit-vault/vault.db` on Unix systems.
#[must_use]
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("audit-vault")
        .join("vault.db")
}

/// Durable key-value store on a single `SQLite` table.
///
/// Uses `spawn_blocking` for every database call.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open a store at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    StoreError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&path_clone).map_err(|source| StoreError::Open {
                path: path_clone,
                source,
            })?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        tracing::debug!(path = %path.display(), "Opened SQLite store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, StoreError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Count stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_keys(&self) -> Result<u64, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
            let conn = conn.blocking_lock();
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
            Ok(count.unsigned_abs())
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<String>, StoreError> {
            let conn = conn.blocking_lock();
            let value = conn
                .query_row(
                    "SELECT value FROM kv WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = conn.blocking_lock();
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert!(store.path().is_none());
        assert_eq!(store.count_keys().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.set("currentUser", r#"{"id":1}"#).await.unwrap();
        store.set("currentUser", r#"{"id":2}"#).await.unwrap();

        assert_eq!(
            store.get("currentUser").await.unwrap().as_deref(),
            Some(r#"{"id":2}"#)
        );
        assert_eq!(store.count_keys().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.set("k", "v").await.unwrap();
        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
    }

    #[test]
    fn test_default_store_path() {
        let path = default_store_path();
        assert!(path.ends_with("audit-vault/vault.db"));
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("deep").join("vault.db");

        let store = SqliteStore::open(&db_path).await.unwrap();
        assert_eq!(store.path(), Some(db_path.as_path()));
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("vault.db");

        {
            let store = SqliteStore::open(&db_path).await.unwrap();
            store.set("audit_logs", "[]").await.unwrap();
        }

        let store = SqliteStore::open(&db_path).await.unwrap();
        assert_eq!(store.get("audit_logs").await.unwrap().as_deref(), Some("[]"));
    }
}
