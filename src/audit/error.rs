//! Audit error types.

use crate::store::StoreError;

/// Errors that can occur during audit operations.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    /// Underlying store failed.
    #[error("Audit storage failed: {0}")]
    Store(#[from] StoreError),

    /// Failed to serialize entries to JSON.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Persisted log could not be decoded.
    #[error("Persisted audit data under {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_display() {
        let err = AuditError::from(StoreError::TaskCancelled);
        assert_eq!(err.to_string(), "Audit storage failed: Blocking task cancelled");
    }

    #[test]
    fn test_corrupt_display() {
        let source = serde_json::from_str::<Vec<u8>>("not json").unwrap_err();
        let err = AuditError::Corrupt {
            key: "audit_logs".to_string(),
            source,
        };
        assert!(err.to_string().contains("audit_logs"));
        assert!(err.to_string().contains("corrupt"));
    }
}
