//! The persisted world time cursor.
//!
//! A single row. Absent until the world is first initialised, which is how
//! a fresh database is told apart from one whose clock sits at zero.

use chronicle_types::WorldTime;
use rusqlite::{Connection, OptionalExtension};

use crate::error::DbError;

/// Read the stored world time, `None` if it was never set.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn get(conn: &Connection) -> Result<Option<WorldTime>, DbError> {
    let value: Option<i64> = conn
        .query_row("SELECT value FROM world_time WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value.map(WorldTime))
}

/// Store the world time. Monotonicity is enforced by the caller.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the write fails.
pub fn set(conn: &Connection, time: WorldTime) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO world_time (id, value) VALUES (1, ?1)
         ON CONFLICT (id) DO UPDATE SET value = excluded.value",
        [time.0],
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn unset_then_set() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.with_conn(get).unwrap(), None);
        store.with_conn(|c| set(c, WorldTime(60_000))).unwrap();
        store.with_conn(|c| set(c, WorldTime(90_000))).unwrap();
        assert_eq!(store.with_conn(get).unwrap(), Some(WorldTime(90_000)));
    }
}
