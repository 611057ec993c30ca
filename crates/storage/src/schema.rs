use rusqlite::Connection;

use crate::error::StoreError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS asset_edits (
    asset_id INTEGER NOT NULL,
    field_kind TEXT NOT NULL,
    sub_id TEXT NOT NULL DEFAULT '',
    sub_key TEXT NOT NULL DEFAULT '',
    value TEXT NOT NULL CHECK (value <> ''),
    updated_at INTEGER NOT NULL,
    updated_by TEXT NOT NULL,
    PRIMARY KEY (asset_id, field_kind, sub_id, sub_key)
);

CREATE TABLE IF NOT EXISTS edit_history (
    id BLOB PRIMARY KEY CHECK (length(id) = 16),
    asset_id INTEGER NOT NULL,
    field_kind TEXT NOT NULL,
    sub_id TEXT NOT NULL DEFAULT '',
    sub_key TEXT NOT NULL DEFAULT '',
    action TEXT NOT NULL,
    old_value TEXT NOT NULL,
    new_value TEXT NOT NULL,
    admin_name TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_asset ON edit_history (asset_id, created_at DESC);
";
