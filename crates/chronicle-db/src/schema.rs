//! Schema definition and forward-only migrations.
//!
//! Each migration is a batch of DDL applied inside one transaction and
//! recorded in `schema_version`. Opening a store applies every migration
//! newer than the recorded version, so a file written by an older build is
//! upgraded in place. Migrations are never edited once released; changes go
//! in a new entry at the end of [`MIGRATIONS`].

use rusqlite::{Connection, OptionalExtension};

use crate::error::DbError;

/// Ordered list of `(version, ddl)` pairs.
pub const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r"
        CREATE TABLE global_id (
            id    INTEGER PRIMARY KEY CHECK (id = 1),
            value INTEGER NOT NULL
        );
        INSERT INTO global_id (id, value) VALUES (1, 0);

        CREATE TABLE type_registry (
            label  TEXT PRIMARY KEY,
            handle INTEGER NOT NULL UNIQUE
        );

        CREATE TABLE event (
            event_order INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id    INTEGER NOT NULL UNIQUE,
            type        INTEGER NOT NULL,
            time        INTEGER NOT NULL,
            reference   INTEGER NOT NULL
        );
        CREATE INDEX idx_event_type_reference ON event (type, reference, time);

        CREATE TABLE world_time (
            id    INTEGER PRIMARY KEY CHECK (id = 1),
            value INTEGER NOT NULL
        );
        ",
    ),
    (
        2,
        r"
        CREATE TABLE relationship_edge (
            edge_id     INTEGER PRIMARY KEY,
            event_id    INTEGER NOT NULL,
            provider_id INTEGER NOT NULL,
            receiver_id INTEGER NOT NULL,
            verb_type   INTEGER NOT NULL
        );
        CREATE INDEX idx_edge_provider ON relationship_edge (provider_id, verb_type);
        CREATE INDEX idx_edge_receiver ON relationship_edge (receiver_id, verb_type);

        CREATE TABLE entity_tag (
            tag_id    INTEGER PRIMARY KEY,
            event_id  INTEGER NOT NULL,
            entity_id INTEGER NOT NULL,
            tag_type  INTEGER NOT NULL,
            value     INTEGER
        );
        CREATE INDEX idx_tag_entity ON entity_tag (entity_id, tag_type);
        CREATE INDEX idx_tag_type ON entity_tag (tag_type);
        ",
    ),
    (
        3,
        r"
        CREATE TABLE action (
            action_id   INTEGER PRIMARY KEY,
            action_type INTEGER NOT NULL
        );

        CREATE TABLE action_property (
            action_id    INTEGER NOT NULL,
            property_key INTEGER NOT NULL,
            value        INTEGER NOT NULL,
            PRIMARY KEY (action_id, property_key)
        );
        CREATE INDEX idx_action_property_value ON action_property (property_key, value);

        CREATE TABLE entity (
            entity_id INTEGER PRIMARY KEY,
            kind      INTEGER NOT NULL
        );
        ",
    ),
];

/// Highest schema version this build knows how to apply.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |(version, _)| *version)
}

/// Read the recorded schema version, `0` for a fresh database.
pub fn current_version(conn: &Connection) -> Result<i64, DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
    )?;
    let version: Option<i64> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

/// Apply every pending migration.
///
/// Returns the number of migrations applied.
///
/// # Errors
///
/// Returns [`DbError::SchemaTooNew`] if the database is ahead of this build,
/// or [`DbError::Migration`] if a migration batch fails. A failed migration
/// is rolled back and leaves earlier versions in place.
pub fn run_migrations(conn: &mut Connection) -> Result<usize, DbError> {
    let current = current_version(conn)?;
    let supported = latest_version();
    if current > supported {
        return Err(DbError::SchemaTooNew {
            found: current,
            supported,
        });
    }

    let mut applied: usize = 0;
    for (version, ddl) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(ddl)
            .and_then(|()| {
                tx.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    [version],
                )
                .map(|_| ())
            })
            .map_err(|source| DbError::Migration {
                version: *version,
                source,
            })?;
        tx.commit()?;
        applied = applied.saturating_add(1);
        tracing::debug!(version, "Applied schema migration");
    }

    if applied > 0 {
        tracing::info!(applied, version = supported, "Database migrations completed");
    }
    Ok(applied)
}
