//! Database schema and migrations for sharevault.
//!
//! Migrations are applied in order when the database is first opened or
//! upgraded; the `schema_version` table records which ones ran.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL UNIQUE,
    storage_quota   INTEGER NOT NULL DEFAULT 0,   -- bytes, <= 0 means unlimited
    storage_used    INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: directory tree
    r#"
CREATE TABLE directories (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    path        TEXT NOT NULL,                    -- materialized, '/' + ancestor names
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    parent_id   INTEGER REFERENCES directories(id),
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_directories_owner_parent ON directories(owner_id, parent_id);
CREATE INDEX idx_directories_owner_path ON directories(owner_id, path);
"#,
    // v3: file records
    r#"
CREATE TABLE files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    path        TEXT NOT NULL,
    owner_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    parent_id   INTEGER REFERENCES directories(id),
    size        INTEGER NOT NULL,
    mime_type   TEXT NOT NULL,
    storage_key TEXT NOT NULL UNIQUE,
    bucket      TEXT NOT NULL,
    checksum    TEXT NOT NULL,                    -- sha256, lowercase hex
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_files_owner_parent ON files(owner_id, parent_id);
"#,
    // v4: share capabilities
    r#"
CREATE TABLE shares (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    resource_type   TEXT NOT NULL CHECK (resource_type IN ('file', 'directory')),
    resource_id     INTEGER NOT NULL,
    token           TEXT NOT NULL UNIQUE,
    permission_type TEXT NOT NULL CHECK (permission_type IN ('read', 'read_upload', 'upload_only')),
    password_hash   TEXT,                         -- Argon2id PHC string
    expires_at      TEXT,
    access_count    INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_shares_owner ON shares(owner_id, resource_type);
CREATE INDEX idx_shares_resource ON shares(resource_type, resource_id);
"#,
    // v5: share access log
    r#"
CREATE TABLE share_access_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    share_id    INTEGER NOT NULL REFERENCES shares(id) ON DELETE CASCADE,
    accessed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    ip_address  TEXT,
    user_agent  TEXT,
    action      TEXT NOT NULL CHECK (action IN ('view', 'download', 'upload')),
    file_name   TEXT,
    granted     INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX idx_share_access_logs_share ON share_access_logs(share_id, accessed_at);
"#,
];
