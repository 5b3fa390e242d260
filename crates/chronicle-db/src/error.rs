//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`rusqlite`] error with additional context about which operation failed.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration to schema version {version} failed: {source}")]
    Migration {
        /// The schema version that was being applied.
        version: i64,
        /// The underlying `SQLite` error.
        source: rusqlite::Error,
    },

    /// The database was written by a newer schema than this build knows.
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew {
        /// Version recorded in the database.
        found: i64,
        /// Highest version this build can apply.
        supported: i64,
    },

    /// A row that must exist (seeded by a migration) is missing.
    #[error("missing required row: {0}")]
    MissingRow(&'static str),
}
