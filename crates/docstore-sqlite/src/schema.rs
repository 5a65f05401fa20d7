//! SQL schema for the document store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Payloads live apart from headers so listings never touch them.
CREATE TABLE IF NOT EXISTS document_bodies (
    body_ref TEXT PRIMARY KEY,
    body     TEXT NOT NULL
);

-- One row per version. The primary key rejects duplicate versions, which is
-- what makes concurrent saves of one document retry instead of colliding.
CREATE TABLE IF NOT EXISTS document_headers (
    document_id     TEXT    NOT NULL,
    version         INTEGER NOT NULL CHECK (version > 0),
    doc_type        TEXT    NOT NULL,
    name            TEXT    NOT NULL DEFAULT '',
    namespace       TEXT    NOT NULL,
    metadata        TEXT    NOT NULL DEFAULT '{}',   -- JSON object
    body_ref        TEXT    NOT NULL REFERENCES document_bodies(body_ref),
    created_at      TEXT    NOT NULL,                -- RFC 3339 UTC, fixed width
    created_by      TEXT    NOT NULL DEFAULT '',
    created_by_type TEXT    NOT NULL DEFAULT '',
    session_id      TEXT    NOT NULL DEFAULT '',
    PRIMARY KEY (document_id, version)
);

CREATE INDEX IF NOT EXISTS headers_namespace_idx ON document_headers(namespace);
CREATE INDEX IF NOT EXISTS headers_type_idx      ON document_headers(doc_type);
CREATE INDEX IF NOT EXISTS headers_session_idx   ON document_headers(session_id);
CREATE INDEX IF NOT EXISTS headers_created_idx   ON document_headers(created_at);

-- Active aliases; at most one row per (tag, document_id).
CREATE TABLE IF NOT EXISTS document_tags (
    tag             TEXT    NOT NULL,
    document_id     TEXT    NOT NULL,
    version         INTEGER NOT NULL,
    updated_at      TEXT    NOT NULL,
    updated_by      TEXT    NOT NULL DEFAULT '',
    updated_by_type TEXT    NOT NULL DEFAULT '',
    session_id      TEXT    NOT NULL DEFAULT '',
    UNIQUE (tag, document_id)
);

CREATE INDEX IF NOT EXISTS tags_document_idx ON document_tags(document_id, version);

-- Tag history is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS tag_events (
    event_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT    NOT NULL,
    version     INTEGER NOT NULL,
    tag         TEXT    NOT NULL,
    operation   TEXT    NOT NULL,   -- 'add' | 'remove'
    actor       TEXT    NOT NULL DEFAULT '',
    actor_type  TEXT    NOT NULL DEFAULT '',
    session_id  TEXT    NOT NULL DEFAULT '',
    occurred_at TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS tag_events_document_idx ON tag_events(document_id, event_id);

PRAGMA user_version = 1;
";
