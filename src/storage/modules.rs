//! Module identifier table
//!
//! Module names map to ids that are stable for the lifetime of the
//! database. Lookups are cached per catalog instance; the cache is never
//! invalidated because modules are never deleted.

use std::collections::HashMap;
use std::sync::RwLock;

use rusqlite::{Connection, OptionalExtension, params};

use super::Database;
use crate::ids::ModuleId;
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct ModuleCache {
    ids: RwLock<HashMap<String, ModuleId>>,
    names: RwLock<HashMap<ModuleId, String>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, creating the module on first use
    pub fn module_id(&self, db: &Database, name: &str) -> Result<ModuleId> {
        if let Some(id) = self.read_ids()?.get(name) {
            return Ok(*id);
        }

        let id = db.read(|conn| fetch_or_insert_module(conn, name))?;
        self.remember(name, id)?;
        Ok(id)
    }

    /// Name of an existing module
    pub fn module_name(&self, db: &Database, id: ModuleId) -> Result<String> {
        if let Some(name) = self
            .names
            .read()
            .map_err(|_| Error::Poisoned("module cache".to_string()))?
            .get(&id)
        {
            return Ok(name.clone());
        }

        let name = db
            .read(|conn| fetch_module_name(conn, id))?
            .ok_or(Error::ModuleDoesNotExist(id))?;
        self.remember(&name, id)?;
        Ok(name)
    }

    fn read_ids(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, ModuleId>>> {
        self.ids
            .read()
            .map_err(|_| Error::Poisoned("module cache".to_string()))
    }

    fn remember(&self, name: &str, id: ModuleId) -> Result<()> {
        self.ids
            .write()
            .map_err(|_| Error::Poisoned("module cache".to_string()))?
            .insert(name.to_string(), id);
        self.names
            .write()
            .map_err(|_| Error::Poisoned("module cache".to_string()))?
            .insert(id, name.to_string());
        Ok(())
    }
}

pub fn fetch_or_insert_module(conn: &Connection, name: &str) -> Result<ModuleId> {
    let existing = conn
        .query_row(
            "SELECT module_id FROM modules WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute("INSERT INTO modules (name) VALUES (?1)", params![name])?;
    tracing::debug!("Registered module {}", name);
    Ok(ModuleId(conn.last_insert_rowid()))
}

pub fn fetch_module_name(conn: &Connection, id: ModuleId) -> Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM modules WHERE module_id = ?1",
        [id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn module_exists(conn: &Connection, id: ModuleId) -> Result<bool> {
    if !id.is_valid() {
        return Ok(false);
    }
    Ok(fetch_module_name(conn, id)?.is_some())
}
