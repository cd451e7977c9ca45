//! Integrity-checked snapshots of application state.

mod checksum;
mod codec;
mod engine;
mod error;
mod types;

pub use checksum::checksum;
pub use codec::{compress, decompress};
pub use engine::BackupEngine;
pub use error::BackupError;
pub use types::{
    BackupSnapshot, BackupType, RestoreReport, SnapshotMetadata, FORMAT_VERSION, METADATA_KEY,
};
