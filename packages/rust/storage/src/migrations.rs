//! SQL migration definitions for the promptlib ledger database.
//!
//! Migrations are applied in order on database open. Each migration is a
//! batch of SQL statements that records its own version.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: inserted_records, enrichment_cache",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Records confirmed inserted into the remote table
CREATE TABLE IF NOT EXISTS inserted_records (
    fingerprint TEXT PRIMARY KEY,
    record_id   TEXT NOT NULL,
    stage       TEXT NOT NULL,
    inserted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_inserted_records_stage ON inserted_records(stage);

-- Raw generator payloads
CREATE TABLE IF NOT EXISTS enrichment_cache (
    prompt_hash TEXT NOT NULL,
    model_id    TEXT NOT NULL,
    payload     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (prompt_hash, model_id)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
