//! Database schema for the SQLite key-value store.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the key-value database.
pub const SCHEMA: &str = r"
-- Enable WAL mode for better concurrent read/write performance
PRAGMA journal_mode = WAL;

-- Key-value table: one row per application key
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Schema version table for migrations
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT OR IGNORE INTO schema_version (version) VALUES (1);
";
