//! Schema versioning and the `schema_meta` settings.
//!
//! The schema version lives in `schema_meta`. [`MIGRATIONS`] lists the steps
//! from each older version to the next; a database written by a newer lia is
//! refused rather than guessed at.

use rusqlite::{Connection, OptionalExtension};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

type Migration = fn(&Connection) -> rusqlite::Result<()>;

/// `(target_version, step)` pairs, ascending. Empty while the first schema
/// is current.
const MIGRATIONS: &[(u32, Migration)] = &[];

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Identifier of the model whose vectors `embedding_cache` holds, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Bring the database up to [`CURRENT_SCHEMA_VERSION`], one transaction per step.
pub fn run_migrations(conn: &mut Connection) -> anyhow::Result<()> {
    let version = get_schema_version(conn)?;
    anyhow::ensure!(
        version <= CURRENT_SCHEMA_VERSION,
        "database schema version {version} is newer than this lia (expects {CURRENT_SCHEMA_VERSION})"
    );
    apply(conn, version, MIGRATIONS)
}

fn apply(conn: &mut Connection, from: u32, steps: &[(u32, Migration)]) -> anyhow::Result<()> {
    for &(target, step) in steps.iter().filter(|(target, _)| *target > from) {
        tracing::info!(to = target, "running migration");
        let tx = conn.transaction()?;
        step(&tx)?;
        set_schema_version(&tx, target)?;
        tx.commit()?;
    }
    Ok(())
}
