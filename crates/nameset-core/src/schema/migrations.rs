/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Current known state, one row per archive identity
CREATE TABLE IF NOT EXISTS archive_info (
    id TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    file_hash TEXT,
    current_name TEXT NOT NULL,
    artist_name TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_archive_path ON archive_info(file_path);
CREATE INDEX IF NOT EXISTS idx_archive_hash ON archive_info(file_hash);

-- Append-only provenance log with embedded snapshots
CREATE TABLE IF NOT EXISTS archive_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id TEXT NOT NULL REFERENCES archive_info(id),
    old_name TEXT,
    new_name TEXT NOT NULL,
    reason TEXT,
    metadata TEXT,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_archive_id ON archive_history(archive_id);
CREATE INDEX IF NOT EXISTS idx_history_new_name ON archive_history(new_name);
"#;

/// All migrations, in order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: MIGRATION_001,
}];
