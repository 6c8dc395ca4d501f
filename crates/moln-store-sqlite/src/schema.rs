//! SQL schema for the Moln SQLite store.
//!
//! One table per structure. A key "exists" while any table holds a row for
//! it, which mirrors the usual key-value semantics: an emptied hash, set or
//! list disappears on its own.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS hash_fields (
    key    TEXT NOT NULL,
    field  TEXT NOT NULL,
    value  TEXT NOT NULL,
    PRIMARY KEY (key, field)
);

CREATE TABLE IF NOT EXISTS set_members (
    key     TEXT NOT NULL,
    member  TEXT NOT NULL,
    PRIMARY KEY (key, member)
);

-- Prepending takes a position one below the current head, so ascending
-- position order is newest-first.
CREATE TABLE IF NOT EXISTS list_items (
    key       TEXT    NOT NULL,
    position  INTEGER NOT NULL,
    value     TEXT    NOT NULL,
    PRIMARY KEY (key, position)
);

CREATE TABLE IF NOT EXISTS counters (
    key    TEXT PRIMARY KEY,
    value  INTEGER NOT NULL
);

PRAGMA user_version = 1;
";
