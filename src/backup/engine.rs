//! Backup creation, restore and retention.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::Duration;
use serde_json::value::RawValue;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::checksum::checksum;
use super::codec;
use super::error::BackupError;
use super::types::{
    BackupSnapshot, BackupType, RestoreReport, SnapshotMetadata, FORMAT_VERSION, METADATA_KEY,
};
use crate::audit::{AuditInput, AuditRecorder, Severity};
use crate::clock::Clock;
use crate::config::BackupConfig;
use crate::store::{backup_payload_key, KeyValueStore, BACKUP_INDEX_KEY};

const AUDIT_RESOURCE: &str = "backup";

/// Creates, restores and expires snapshots of the tracked store keys.
///
/// Index updates are serialized; a snapshot id can only be restored by one caller at a time.
pub struct BackupEngine {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    recorder: Arc<AuditRecorder>,
    config: BackupConfig,
    index_lock: Mutex<()>,
    restoring: StdMutex<HashSet<String>>,
}

/// Marks a snapshot id as being restored until dropped.
struct RestoreGuard<'a> {
    restoring: &'a StdMutex<HashSet<String>>,
    id: String,
}

impl<'a> RestoreGuard<'a> {
    fn acquire(restoring: &'a StdMutex<HashSet<String>>, id: &str) -> Result<Self, BackupError> {
        let mut active = restoring.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(id.to_string()) {
            return Err(BackupError::RestoreInProgress(id.to_string()));
        }
        Ok(Self {
            restoring,
            id: id.to_string(),
        })
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.restoring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl BackupEngine {
    /// Create an engine over `store`, auditing through `recorder`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        recorder: Arc<AuditRecorder>,
        config: BackupConfig,
    ) -> Self {
        Self {
            store,
            clock,
            recorder,
            config,
            index_lock: Mutex::new(()),
            restoring: StdMutex::new(HashSet::new()),
        }
    }

    /// Keys captured in every snapshot.
    #[must_use]
    pub fn tracked_keys(&self) -> &[String] {
        &self.config.tracked_keys
    }

    /// Capture the tracked keys into a new snapshot.
    ///
    /// Tracked keys that are absent are left out. Keys whose value is not valid
    /// JSON are skipped, logged and audited. Captured values keep their original
    /// text.
    ///
    /// Once the index is saved the snapshot exists; later audit or eviction
    /// failures are logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the index is corrupt.
    pub async fn create_backup(
        &self,
        backup_type: BackupType,
        description: &str,
    ) -> Result<BackupSnapshot, BackupError> {
        let now = self.clock.now();
        let id = Uuid::new_v4().to_string();

        let mut payload: BTreeMap<String, Box<RawValue>> = BTreeMap::new();
        let mut skipped: Vec<(String, String)> = Vec::new();
        for key in &self.config.tracked_keys {
            let Some(raw) = self.store.get(key).await? else {
                tracing::debug!(key = %key, "Tracked key absent, not captured");
                continue;
            };
            match RawValue::from_string(raw) {
                Ok(value) => {
                    payload.insert(key.clone(), value);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping unparseable key");
                    skipped.push((key.clone(), e.to_string()));
                }
            }
        }

        let source_keys: Vec<String> = payload.keys().cloned().collect();
        let record_count = payload.len();
        payload.insert(
            METADATA_KEY.to_string(),
            serde_json::value::to_raw_value(&serde_json::json!({
                "capturedAt": now,
                "type": backup_type,
                "description": description,
                "formatVersion": FORMAT_VERSION,
                "environment": {
                    "version": env!("CARGO_PKG_VERSION"),
                    "os": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                },
            }))?,
        );

        let serialized = serde_json::to_string(&payload)?;
        let digest = checksum(serialized.as_bytes());
        let (blob, compressed) = if self.config.compress {
            let blob = codec::compress(serialized.as_bytes()).map_err(BackupError::Compress)?;
            (blob, true)
        } else {
            (serialized.clone(), false)
        };

        let snapshot = BackupSnapshot {
            id: id.clone(),
            timestamp: now,
            backup_type,
            size_bytes: serialized.len() as u64,
            compressed_size: blob.len() as u64,
            checksum: digest,
            compressed,
            encrypted: false,
            retention_until: now + Duration::days(i64::from(self.config.retention_days)),
            metadata: SnapshotMetadata {
                format_version: FORMAT_VERSION,
                description: description.to_string(),
                source_keys,
                record_count,
                skipped_keys: skipped.iter().map(|(key, _)| key.clone()).collect(),
            },
        };

        {
            let _guard = self.index_lock.lock().await;

            let mut index = self.load_index().await?;

            // Payload first: the index must never point at a missing blob.
            let payload_key = backup_payload_key(&id);
            self.store.set(&payload_key, &blob).await?;

            index.insert(0, snapshot.clone());
            let evicted = if index.len() > self.config.max_backups {
                index.split_off(self.config.max_backups)
            } else {
                Vec::new()
            };
            if let Err(e) = self.save_index(&index).await {
                if let Err(cleanup) = self.store.remove(&payload_key).await {
                    tracing::warn!(backup_id = %id, error = %cleanup, "Failed to discard orphaned payload");
                }
                return Err(e);
            }

            for old in &evicted {
                match self.store.remove(&backup_payload_key(&old.id)).await {
                    Ok(()) => {
                        tracing::info!(backup_id = %old.id, "Evicted backup beyond index capacity");
                    }
                    Err(e) => {
                        tracing::warn!(backup_id = %old.id, error = %e, "Failed to remove evicted payload");
                    }
                }
            }
        }

        for (key, reason) in skipped {
            self.audit(
                AuditInput::system("backup_key_skipped", AUDIT_RESOURCE)
                    .resource_id(&id)
                    .severity(Severity::Medium)
                    .failed(format!("failed to parse {key}: {reason}"))
                    .build(),
            )
            .await;
        }

        self.audit(
            AuditInput::system("backup_created", AUDIT_RESOURCE)
                .resource_id(&id)
                .severity(Severity::Medium)
                .build(),
        )
        .await;

        tracing::info!(
            backup_id = %id,
            backup_type = backup_type.as_str(),
            keys = record_count,
            size_bytes = snapshot.size_bytes,
            compressed_size = snapshot.compressed_size,
            "Backup created"
        );

        Ok(snapshot)
    }

    /// Restore the tracked keys captured in snapshot `id`.
    ///
    /// The checksum is verified and every value is decoded before the first
    /// write. Keys are written in sorted order; if a write fails, keys already
    /// written are rolled back. Every failure is audited as critical.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`], [`BackupError::Expired`],
    /// [`BackupError::Integrity`], [`BackupError::RestoreInProgress`], or a
    /// decoding or storage error.
    pub async fn restore_backup(&self, id: &str) -> Result<RestoreReport, BackupError> {
        match self.try_restore(id).await {
            Ok(report) => {
                self.audit(
                    AuditInput::system("backup_restored", AUDIT_RESOURCE)
                        .resource_id(id)
                        .severity(Severity::High)
                        .build(),
                )
                .await;
                tracing::info!(
                    backup_id = %id,
                    keys = report.restored_keys.len(),
                    "Backup restored"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(backup_id = %id, error = %e, "Backup restore failed");
                self.audit(
                    AuditInput::system("backup_restore_failed", AUDIT_RESOURCE)
                        .resource_id(id)
                        .severity(Severity::Critical)
                        .failed(e.audit_message())
                        .build(),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn try_restore(&self, id: &str) -> Result<RestoreReport, BackupError> {
        let _guard = RestoreGuard::acquire(&self.restoring, id)?;

        let snapshot = self
            .find(id)
            .await?
            .ok_or_else(|| BackupError::NotFound(id.to_string()))?;
        if snapshot.is_expired(self.clock.now()) {
            return Err(BackupError::Expired {
                id: id.to_string(),
                retention_until: snapshot.retention_until,
            });
        }

        let blob = self
            .store
            .get(&backup_payload_key(id))
            .await?
            .ok_or_else(|| BackupError::NotFound(id.to_string()))?;
        let bytes = Self::decode_blob(&snapshot, blob)?;

        let actual = checksum(&bytes);
        if actual != snapshot.checksum {
            return Err(BackupError::Integrity {
                id: id.to_string(),
                expected: snapshot.checksum,
                actual,
            });
        }

        let payload: BTreeMap<String, Box<RawValue>> = serde_json::from_slice(&bytes)?;
        let writes: Vec<(String, String)> = payload
            .into_iter()
            .filter(|(key, _)| key.as_str() != METADATA_KEY)
            .map(|(key, value)| (key, value.get().to_string()))
            .collect();

        let restored_keys = self.apply(writes).await?;

        Ok(RestoreReport {
            backup_id: id.to_string(),
            restored_keys,
        })
    }

    async fn apply(&self, writes: Vec<(String, String)>) -> Result<Vec<String>, BackupError> {
        let mut previous = Vec::with_capacity(writes.len());
        for (key, _) in &writes {
            previous.push((key.clone(), self.store.get(key).await?));
        }

        for (written, (key, value)) in writes.iter().enumerate() {
            tracing::debug!(key = %key, "Restoring key");
            if let Err(e) = self.store.set(key, value).await {
                tracing::warn!(key = %key, error = %e, "Restore write failed, rolling back");
                self.roll_back(&previous[..written]).await;
                return Err(e.into());
            }
        }

        Ok(writes.into_iter().map(|(key, _)| key).collect())
    }

    async fn roll_back(&self, previous: &[(String, Option<String>)]) {
        for (key, value) in previous.iter().rev() {
            let result = match value {
                Some(value) => self.store.set(key, value).await,
                None => self.store.remove(key).await,
            };
            if let Err(e) = result {
                tracing::error!(key = %key, error = %e, "Rollback write failed");
            }
        }
    }

    /// Recompute the checksum of snapshot `id` without restoring it.
    ///
    /// Returns `false` when the payload is corrupt or undecodable.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if the snapshot or its payload is missing,
    /// or a storage error.
    pub async fn verify_backup(&self, id: &str) -> Result<bool, BackupError> {
        let snapshot = self
            .find(id)
            .await?
            .ok_or_else(|| BackupError::NotFound(id.to_string()))?;
        let blob = self
            .store
            .get(&backup_payload_key(id))
            .await?
            .ok_or_else(|| BackupError::NotFound(id.to_string()))?;

        let valid = match Self::decode_blob(&snapshot, blob) {
            Ok(bytes) => checksum(&bytes) == snapshot.checksum,
            Err(e) => {
                tracing::warn!(backup_id = %id, error = %e, "Backup payload undecodable");
                false
            }
        };
        Ok(valid)
    }

    /// Remove expired snapshots and return how many were removed.
    ///
    /// Snapshots being restored are left for the next run.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the index is corrupt.
    pub async fn cleanup_expired_backups(&self) -> Result<usize, BackupError> {
        let now = self.clock.now();
        let removed = {
            let _guard = self.index_lock.lock().await;
            let index = self.load_index().await?;
            let (expired, kept): (Vec<_>, Vec<_>) = index
                .into_iter()
                .partition(|s| s.is_expired(now) && !self.is_restoring(&s.id));

            if expired.is_empty() {
                return Ok(0);
            }

            self.save_index(&kept).await?;
            for snapshot in &expired {
                self.store.remove(&backup_payload_key(&snapshot.id)).await?;
                tracing::debug!(backup_id = %snapshot.id, "Removed expired backup");
            }
            expired.len()
        };

        self.recorder
            .record(
                AuditInput::system("backup_cleanup", AUDIT_RESOURCE)
                    .severity(Severity::Low)
                    .build(),
            )
            .await?;

        tracing::info!(removed, "Expired backups removed");
        Ok(removed)
    }

    /// Delete snapshot `id` and its payload.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] for an unknown id,
    /// [`BackupError::RestoreInProgress`] while it is being restored, or a storage error.
    pub async fn delete_backup(&self, id: &str) -> Result<(), BackupError> {
        {
            let _guard = self.index_lock.lock().await;
            if self.is_restoring(id) {
                return Err(BackupError::RestoreInProgress(id.to_string()));
            }
            let mut index = self.load_index().await?;
            let before = index.len();
            index.retain(|s| s.id != id);
            if index.len() == before {
                return Err(BackupError::NotFound(id.to_string()));
            }
            self.save_index(&index).await?;
            self.store.remove(&backup_payload_key(id)).await?;
        }

        self.recorder
            .record(
                AuditInput::system("backup_deleted", AUDIT_RESOURCE)
                    .resource_id(id)
                    .severity(Severity::Medium)
                    .build(),
            )
            .await?;

        tracing::info!(backup_id = %id, "Backup deleted");
        Ok(())
    }

    /// Unexpired snapshots, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the index is corrupt.
    pub async fn list_backups(&self) -> Result<Vec<BackupSnapshot>, BackupError> {
        let now = self.clock.now();
        let mut index = self.load_index().await?;
        index.retain(|s| !s.is_expired(now));
        index.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(index)
    }

    /// Snapshot metadata by id, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the index is corrupt.
    pub async fn get_backup(&self, id: &str) -> Result<Option<BackupSnapshot>, BackupError> {
        self.find(id).await
    }

    async fn find(&self, id: &str) -> Result<Option<BackupSnapshot>, BackupError> {
        Ok(self.load_index().await?.into_iter().find(|s| s.id == id))
    }

    /// Record an audit entry for a change that has already been committed.
    async fn audit(&self, input: AuditInput) {
        let action = input.action.clone();
        if let Err(e) = self.recorder.record(input).await {
            tracing::error!(action = %action, error = %e, "Failed to write audit entry");
        }
    }

    fn is_restoring(&self, id: &str) -> bool {
        self.restoring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn decode_blob(snapshot: &BackupSnapshot, blob: String) -> Result<Vec<u8>, BackupError> {
        if snapshot.compressed {
            codec::decompress(&blob).map_err(|source| BackupError::Decompress {
                id: snapshot.id.clone(),
                source,
            })
        } else {
            Ok(blob.into_bytes())
        }
    }

    async fn load_index(&self) -> Result<Vec<BackupSnapshot>, BackupError> {
        match self.store.get(BACKUP_INDEX_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(BackupError::CorruptIndex),
            None => Ok(Vec::new()),
        }
    }

    async fn save_index(&self, index: &[BackupSnapshot]) -> Result<(), BackupError> {
        let raw = serde_json::to_string(index)?;
        self.store.set(BACKUP_INDEX_KEY, &raw).await?;
        Ok(())
    }
}

impl std::fmt::Debug for BackupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
