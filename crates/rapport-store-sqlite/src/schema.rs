//! SQL schema for the Rapport SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Users and contacts share this table and its id space.
-- Promotion flips is_registered in place; rows are never re-created.
CREATE TABLE IF NOT EXISTS persons (
    person_id          TEXT PRIMARY KEY,
    email              TEXT NOT NULL UNIQUE,
    first_name         TEXT,
    last_name          TEXT,
    is_registered      INTEGER NOT NULL DEFAULT 0,
    password_hash      TEXT,
    fb_id              TEXT UNIQUE,
    phone_number       TEXT,
    picture            TEXT,            -- blob key or external URL
    is_active          INTEGER NOT NULL DEFAULT 1,
    is_admin           INTEGER NOT NULL DEFAULT 0,
    timezone           TEXT NOT NULL DEFAULT '',
    timezone_offset    INTEGER,
    registration_date  TEXT,            -- YYYY-MM-DD
    last_activity_date TEXT,            -- YYYY-MM-DD
    created_at         TEXT NOT NULL    -- RFC 3339 UTC
);

-- Directed subscription edges. The target may be an unregistered contact.
CREATE TABLE IF NOT EXISTS friends (
    friend_id       TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    related_user_id TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    created_at      TEXT NOT NULL,
    UNIQUE (user_id, related_user_id),
    CHECK  (user_id != related_user_id)
);

-- Only the latest row per person can be confirmed; older rows are kept.
CREATE TABLE IF NOT EXISTS phone_confirmations (
    confirmation_id TEXT PRIMARY KEY,
    person_id       TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    phone_number    TEXT NOT NULL,
    code            TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    is_confirmed    INTEGER NOT NULL DEFAULT 0
);

-- One bearer token per person.
CREATE TABLE IF NOT EXISTS tokens (
    person_id  TEXT PRIMARY KEY REFERENCES persons(person_id) ON DELETE CASCADE,
    token      TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS persons_tz_offset_idx      ON persons(timezone_offset);
CREATE INDEX IF NOT EXISTS friends_related_idx        ON friends(related_user_id);
CREATE INDEX IF NOT EXISTS confirmations_person_idx   ON phone_confirmations(person_id);

PRAGMA user_version = 1;
";
