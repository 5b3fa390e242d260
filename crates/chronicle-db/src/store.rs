//! Connection handle for the single-writer `SQLite` store.
//!
//! The world has exactly one logical writer, so the store owns one
//! [`Connection`] behind a mutex instead of a pool. Every call borrows the
//! connection for the duration of a closure; multi-row mutations go through
//! [`Store::with_tx`] so they commit or roll back as a unit.
//!
//! The lock is never held across a call back into higher layers. Callers
//! pass a closure that only touches the query modules of this crate.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};

use crate::error::DbError;
use crate::schema;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Handle to the backing store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a file-backed store and bring its schema up to date.
    ///
    /// The special path [`IN_MEMORY`] opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the file cannot be opened, or a
    /// migration error if the schema cannot be upgraded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY {
            return Self::in_memory();
        }
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::info!(path = %path.display(), journal_mode = %mode, "Opened SQLite store");
        Self::from_connection(conn)
    }

    /// Open a fresh in-memory store (tests and throwaway worlds).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        tracing::debug!("Opened in-memory SQLite store");
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, DbError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read or single-statement write against the connection.
    ///
    /// # Errors
    ///
    /// Propagates whatever the closure returns.
    pub fn with_conn<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a closure inside one transaction.
    ///
    /// The transaction commits if the closure returns `Ok` and rolls back
    /// (on drop) if it returns `Err`.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or [`DbError::Sqlite`] if the
    /// transaction cannot begin or commit.
    pub fn with_tx<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DbError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

impl core::fmt::Debug for Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_path_selects_memory_store() {
        let store = Store::open(IN_MEMORY).unwrap();
        let version = store.with_conn(schema::current_version).unwrap();
        assert_eq!(version, schema::latest_version());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = Store::in_memory().unwrap();
        let result: Result<(), DbError> = store.with_tx(|tx| {
            tx.execute("UPDATE global_id SET value = 100 WHERE id = 1", [])?;
            Err(DbError::MissingRow("forced"))
        });
        assert!(result.is_err());
        let value: i64 = store
            .with_conn(|c| {
                Ok(c.query_row("SELECT value FROM global_id WHERE id = 1", [], |r| {
                    r.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(value, 0);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.db");
        {
            let store = Store::open(&path).unwrap();
            store
                .with_conn(|c| {
                    c.execute("UPDATE global_id SET value = 41 WHERE id = 1", [])?;
                    Ok(())
                })
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        let value: i64 = store
            .with_conn(|c| {
                Ok(c.query_row("SELECT value FROM global_id WHERE id = 1", [], |r| {
                    r.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(value, 41);
    }
}
