//! SQL schema for the Vigil SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS devices (
    device_key    INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_key    INTEGER NOT NULL,
    name          TEXT    NOT NULL,
    description   TEXT,
    serial_number TEXT    NOT NULL UNIQUE,
    os            TEXT    NOT NULL,   -- 'windows' | 'apple' | 'android' | 'linux' | 'other'
    os_version    TEXT,
    model         TEXT,
    enrolled_at   TEXT    NOT NULL,
    last_synced   TEXT
);

CREATE TABLE IF NOT EXISTS device_groups (
    group_key  INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_key INTEGER NOT NULL,
    name       TEXT    NOT NULL,
    created_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_key  INTEGER NOT NULL REFERENCES device_groups(group_key) ON DELETE CASCADE,
    variant    TEXT    NOT NULL,   -- 'device' | 'user'
    member_key INTEGER NOT NULL,
    PRIMARY KEY (group_key, variant, member_key)
);

CREATE TABLE IF NOT EXISTS policies (
    policy_key   INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_key   INTEGER NOT NULL,
    name         TEXT    NOT NULL,
    description  TEXT,
    payload_kind TEXT    NOT NULL,
    payload_json TEXT    NOT NULL,   -- draft content
    created_at   TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS policy_assignments (
    policy_key INTEGER NOT NULL REFERENCES policies(policy_key) ON DELETE CASCADE,
    variant    TEXT    NOT NULL,   -- 'device' | 'group'
    target_key INTEGER NOT NULL,
    PRIMARY KEY (policy_key, variant, target_key)
);

-- Deployments are strictly append-only and outlive their policy, so
-- policy_key is not a foreign key. AUTOINCREMENT keeps keys monotonic; they
-- break ties between equal done_at values.
CREATE TABLE IF NOT EXISTS policy_deployments (
    deployment_key INTEGER PRIMARY KEY AUTOINCREMENT,
    policy_key     INTEGER NOT NULL,
    payload_kind   TEXT    NOT NULL,
    payload_json   TEXT    NOT NULL,
    comment        TEXT,
    done_at        TEXT    NOT NULL   -- fixed-width RFC 3339 UTC
);

-- One row per (deployment, device); upserted.
CREATE TABLE IF NOT EXISTS deployment_statuses (
    deployment_key INTEGER NOT NULL REFERENCES policy_deployments(deployment_key),
    device_key     INTEGER NOT NULL REFERENCES devices(device_key) ON DELETE CASCADE,
    result         TEXT    NOT NULL,   -- 'pending' | 'success' | 'failure' | 'removed'
    updated_at     TEXT    NOT NULL,
    PRIMARY KEY (deployment_key, device_key)
);

CREATE TABLE IF NOT EXISTS device_actions (
    action_key  INTEGER PRIMARY KEY AUTOINCREMENT,
    device_key  INTEGER NOT NULL REFERENCES devices(device_key) ON DELETE CASCADE,
    action      TEXT    NOT NULL,
    created_by  TEXT,
    created_at  TEXT    NOT NULL,
    deployed_at TEXT
);

CREATE INDEX IF NOT EXISTS assignments_target_idx  ON policy_assignments(variant, target_key);
CREATE INDEX IF NOT EXISTS members_member_idx      ON group_members(variant, member_key);
CREATE INDEX IF NOT EXISTS deployments_policy_idx  ON policy_deployments(policy_key, done_at);
CREATE INDEX IF NOT EXISTS statuses_device_idx     ON deployment_statuses(device_key);
CREATE INDEX IF NOT EXISTS actions_device_idx      ON device_actions(device_key);

PRAGMA user_version = 1;
";
