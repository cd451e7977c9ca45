//! Backup snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload key holding capture metadata. Never written back on restore.
pub const METADATA_KEY: &str = "_metadata";

/// Current payload format version.
pub const FORMAT_VERSION: u32 = 1;

/// Kind of snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Full,
    Incremental,
    Differential,
}

impl BackupType {
    /// Returns the string representation used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Differential => "differential",
        }
    }
}

/// Descriptive block stored with every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub description: String,
    /// Keys captured in the payload.
    pub source_keys: Vec<String>,
    pub record_count: usize,
    /// Tracked keys left out because their value did not parse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_keys: Vec<String>,
}

/// Index entry describing one stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    /// Length of the serialized payload.
    pub size_bytes: u64,
    /// Length of the stored blob.
    pub compressed_size: u64,
    pub checksum: String,
    pub compressed: bool,
    pub encrypted: bool,
    pub retention_until: DateTime<Utc>,
    pub metadata: SnapshotMetadata,
}

impl BackupSnapshot {
    /// Whether the snapshot is past its retention window at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.retention_until < now
    }

    /// Stored size relative to the serialized size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compression_ratio(&self) -> f64 {
        if self.size_bytes == 0 {
            return 1.0;
        }
        self.compressed_size as f64 / self.size_bytes as f64
    }
}

/// Outcome of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub backup_id: String,
    /// Keys written, in write order.
    pub restored_keys: Vec<String>,
}
