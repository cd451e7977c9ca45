//! Audit recorder over the key-value store.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::AuditError;
use super::types::{AuditEntry, AuditFilter, AuditInput};
use crate::clock::Clock;
use crate::config::AuditConfig;
use crate::store::{KeyValueStore, AUDIT_LOGS_KEY, CRITICAL_EVENTS_KEY};

/// Append-only activity log persisted as one JSON array, most recent first.
///
/// Writes are serialized so concurrent `record` calls never lose entries.
pub struct AuditRecorder {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    critical_capacity: usize,
    write_lock: Mutex<()>,
}

impl AuditRecorder {
    /// Create a recorder over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &AuditConfig) -> Self {
        Self {
            store,
            clock,
            capacity: config.capacity.max(1),
            critical_capacity: config.critical_capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Clock used to stamp entries.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Maximum number of entries kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an entry and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted log cannot be read, decoded or written.
    pub async fn record(&self, input: AuditInput) -> Result<AuditEntry, AuditError> {
        let entry = input.into_entry(Uuid::new_v4(), self.clock.now());

        let _guard = self.write_lock.lock().await;

        let mut log = self.load(AUDIT_LOGS_KEY).await?;
        log.insert(0, entry.clone());
        log.truncate(self.capacity);
        self.persist(AUDIT_LOGS_KEY, &log).await?;

        if entry.severity.is_elevated() {
            let mut critical = self.load(CRITICAL_EVENTS_KEY).await?;
            critical.insert(0, entry.clone());
            critical.truncate(self.critical_capacity);
            self.persist(CRITICAL_EVENTS_KEY, &critical).await?;

            tracing::warn!(
                action = %entry.action,
                severity = entry.severity.as_str(),
                actor = %entry.actor_id,
                success = entry.success,
                "Elevated audit event"
            );
        } else {
            tracing::debug!(
                action = %entry.action,
                severity = entry.severity.as_str(),
                "Audit event recorded"
            );
        }

        Ok(entry)
    }

    /// Entries matching `filter`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted log cannot be read or decoded.
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let log = self.load(AUDIT_LOGS_KEY).await?;
        if filter.is_empty() {
            return Ok(log);
        }
        Ok(log.into_iter().filter(|e| filter.matches(e)).collect())
    }

    /// Every entry, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted log cannot be read or decoded.
    pub async fn all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        self.load(AUDIT_LOGS_KEY).await
    }

    /// Recent high and critical entries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the side list cannot be read or decoded.
    pub async fn critical_events(&self) -> Result<Vec<AuditEntry>, AuditError> {
        self.load(CRITICAL_EVENTS_KEY).await
    }

    /// Number of entries in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted log cannot be read or decoded.
    pub async fn len(&self) -> Result<usize, AuditError> {
        Ok(self.load(AUDIT_LOGS_KEY).await?.len())
    }

    /// Whether the log is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted log cannot be read or decoded.
    pub async fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len().await? == 0)
    }

    /// Delete entries older than `days` days and return how many were removed.
    ///
    /// The critical side list is pruned with the same cutoff.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted log cannot be read, decoded or written.
    pub async fn cleanup_older_than(&self, days: u32) -> Result<usize, AuditError> {
        let cutoff = self.clock.now() - Duration::days(i64::from(days));

        let _guard = self.write_lock.lock().await;

        let mut log = self.load(AUDIT_LOGS_KEY).await?;
        let before = log.len();
        log.retain(|e| e.timestamp >= cutoff);
        let removed = before - log.len();

        if removed > 0 {
            self.persist(AUDIT_LOGS_KEY, &log).await?;

            let mut critical = self.load(CRITICAL_EVENTS_KEY).await?;
            let critical_before = critical.len();
            critical.retain(|e| e.timestamp >= cutoff);
            if critical.len() != critical_before {
                self.persist(CRITICAL_EVENTS_KEY, &critical).await?;
            }
        }

        tracing::info!(removed, days, "Purged old audit entries");
        Ok(removed)
    }

    async fn load(&self, key: &str) -> Result<Vec<AuditEntry>, AuditError> {
        match self.store.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| AuditError::Corrupt {
                key: key.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, key: &str, entries: &[AuditEntry]) -> Result<(), AuditError> {
        let raw = serde_json::to_string(entries)?;
        self.store.set(key, &raw).await?;
        Ok(())
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("capacity", &self.capacity)
            .field("critical_capacity", &self.critical_capacity)
            .finish_non_exhaustive()
    }
}
