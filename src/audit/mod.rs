//! Append-only, capacity-bounded audit trail.

mod error;
mod recorder;
mod types;

pub use error::AuditError;
pub use recorder::AuditRecorder;
pub use types::{
    AuditEntry, AuditFilter, AuditInput, AuditInputBuilder, Category, Changes, EntryMetadata,
    Severity, SYSTEM_ACTOR_EMAIL, SYSTEM_ACTOR_ID,
};
