//! Audit Vault - tamper-evident audit trail, integrity-checked backups and compliance reports.

pub mod audit;
pub mod backup;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod display;
pub mod export;
pub mod scheduler;
pub mod store;
pub mod vault;

pub use vault::AuditVault;
