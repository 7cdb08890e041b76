//! SQL DDL for the review schedule and the persisted embedding cache.
//!
//! Defines the `review_groups`, `embedding_cache` and `schema_meta` tables.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- One row per review group, keyed by (topic, group_index)
CREATE TABLE IF NOT EXISTS review_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_index INTEGER NOT NULL CHECK(group_index >= 0),
    topic TEXT NOT NULL,
    last_review_date TEXT,
    next_review_date TEXT,
    reviews_count INTEGER NOT NULL DEFAULT 0 CHECK(reviews_count >= 0)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_review_groups_topic_index
    ON review_groups(topic, group_index);
CREATE INDEX IF NOT EXISTS idx_review_groups_next ON review_groups(next_review_date);

-- Record embeddings, keyed by record content hash
CREATE TABLE IF NOT EXISTS embedding_cache (
    key TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    model_version TEXT NOT NULL,
    vector BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_embedding_cache_topic ON embedding_cache(topic);
CREATE INDEX IF NOT EXISTS idx_embedding_cache_model ON embedding_cache(model_version);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
