//! SQLite connection ownership

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use super::schema;
use crate::{Error, Result};

/// SQLite-backed storage for the type catalog.
///
/// The connection sits behind a mutex: readers lock it around each query,
/// the synchronizer holds it for the whole write transaction, so nobody
/// observes a half-applied package.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection for one statement batch
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Poisoned("database connection".to_string()))
    }

    /// Run `f` inside one exclusive write transaction. Any error rolls the
    /// transaction back.
    pub fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run a read-only closure under the connection lock
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }
}

/// Initialize the database schema
fn initialize_schema(conn: &Connection) -> Result<()> {
    for stmt in schema::all_schema_statements() {
        conn.execute(stmt, [])?;
    }
    Ok(())
}
