//! Backup error types.

use chrono::{DateTime, Utc};

use crate::audit::AuditError;
use crate::store::StoreError;

/// Errors that can occur during backup operations.
#[derive(thiserror::Error, Debug)]
pub enum BackupError {
    /// No snapshot metadata or payload for this id.
    #[error("Backup not found: {0}")]
    NotFound(String),

    /// Snapshot is past its retention window.
    #[error("Backup {id} expired at {retention_until}")]
    Expired {
        id: String,
        retention_until: DateTime<Utc>,
    },

    /// Recomputed checksum differs from the stored one.
    #[error("Backup {id} failed verification: checksum mismatch (expected {expected}, got {actual})")]
    Integrity {
        id: String,
        expected: String,
        actual: String,
    },

    /// Another restore of the same snapshot is running.
    #[error("Restore already in progress for backup {0}")]
    RestoreInProgress(String),

    /// Failed to serialize or decode a payload.
    #[error("Backup payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to compress a payload.
    #[error("Backup compression failed: {0}")]
    Compress(#[source] std::io::Error),

    /// Stored payload could not be decompressed.
    #[error("Backup {id} could not be decompressed: {source}")]
    Decompress {
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// Persisted backup index could not be decoded.
    #[error("Backup index is corrupt: {0}")]
    CorruptIndex(#[source] serde_json::Error),

    /// Underlying store failed.
    #[error("Backup storage failed: {0}")]
    Store(#[from] StoreError),

    /// Audit trail could not be written.
    #[error("Backup audit failed: {0}")]
    Audit(#[from] AuditError),
}

impl BackupError {
    /// Short reason stored in the audit entry of a failed operation.
    #[must_use]
    pub fn audit_message(&self) -> String {
        match self {
            Self::Integrity { .. } => "checksum mismatch".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = BackupError::NotFound("abc".to_string());
        assert_eq!(err.to_string(), "Backup not found: abc");
    }

    #[test]
    fn test_integrity_audit_message() {
        let err = BackupError::Integrity {
            id: "abc".to_string(),
            expected: "00000001".to_string(),
            actual: "00000002".to_string(),
        };
        assert!(err.to_string().contains("checksum mismatch"));
        assert_eq!(err.audit_message(), "checksum mismatch");
    }

    #[test]
    fn test_other_audit_message_is_display() {
        let err = BackupError::RestoreInProgress("abc".to_string());
        assert_eq!(err.audit_message(), err.to_string());
    }
}
