//! SQL schema for the Caseload SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One therapist per principal.
CREATE TABLE IF NOT EXISTS therapists (
    therapist_id  TEXT PRIMARY KEY,
    principal_id  TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    email         TEXT,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    client_id     TEXT PRIMARY KEY,
    therapist_id  TEXT NOT NULL REFERENCES therapists(therapist_id),
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    email         TEXT,
    phone         TEXT,
    status        TEXT NOT NULL DEFAULT 'new',  -- new | active | on_hold | completed
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS client_profiles (
    profile_id        TEXT PRIMARY KEY,
    client_id         TEXT NOT NULL UNIQUE REFERENCES clients(client_id) ON DELETE CASCADE,
    date_of_birth     TEXT,            -- YYYY-MM-DD
    gender            TEXT,
    address           TEXT,
    emergency_contact TEXT,
    diagnosis         TEXT,
    medications       TEXT NOT NULL DEFAULT '[]',
    notes             TEXT,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id        TEXT PRIMARY KEY,
    client_id         TEXT NOT NULL REFERENCES clients(client_id) ON DELETE CASCADE,
    therapist_id      TEXT NOT NULL REFERENCES therapists(therapist_id),
    session_date      TEXT NOT NULL,
    duration_minutes  INTEGER NOT NULL DEFAULT 0,
    session_type      TEXT NOT NULL,   -- in_person | virtual
    status            TEXT NOT NULL,   -- scheduled | completed | canceled | no_show
    notes             TEXT,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session_notes (
    note_id       TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
    client_id     TEXT NOT NULL REFERENCES clients(client_id) ON DELETE CASCADE,
    therapist_id  TEXT NOT NULL REFERENCES therapists(therapist_id),
    title         TEXT NOT NULL,
    content_json  TEXT NOT NULL,       -- StructuredContent
    therapy_type  TEXT,
    tags          TEXT NOT NULL DEFAULT '[]',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS treatment_goals (
    goal_id      TEXT PRIMARY KEY,
    client_id    TEXT NOT NULL REFERENCES clients(client_id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    description  TEXT,
    target_date  TEXT,
    status       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS progress_metrics (
    metric_id    TEXT PRIMARY KEY,
    client_id    TEXT NOT NULL REFERENCES clients(client_id) ON DELETE CASCADE,
    goal_id      TEXT REFERENCES treatment_goals(goal_id) ON DELETE SET NULL,
    metric_name  TEXT NOT NULL,
    value        REAL NOT NULL,
    notes        TEXT,
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS clients_therapist_idx  ON clients(therapist_id);
CREATE INDEX IF NOT EXISTS sessions_client_idx    ON sessions(client_id);
CREATE INDEX IF NOT EXISTS notes_client_idx       ON session_notes(client_id);
CREATE INDEX IF NOT EXISTS goals_client_idx       ON treatment_goals(client_id);
CREATE INDEX IF NOT EXISTS metrics_client_idx     ON progress_metrics(client_id);

PRAGMA user_version = 1;
";
