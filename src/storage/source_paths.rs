//! Source path identifier table
//!
//! A path `/dir/file.qml` is split into a source context (the directory)
//! and a file name so directory strings are stored once.

use std::collections::HashMap;
use std::sync::RwLock;

use rusqlite::{Connection, OptionalExtension, params};

use super::Database;
use crate::ids::{SourceContextId, SourceId};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct SourcePathCache {
    contexts: RwLock<HashMap<String, SourceContextId>>,
    sources: RwLock<HashMap<(SourceContextId, String), SourceId>>,
}

/// Split `path` into directory and file name
pub fn split_source_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(index) => (&path[..index], &path[index + 1..]),
        None => ("", path),
    }
}

impl SourcePathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_context_id(&self, db: &Database, directory: &str) -> Result<SourceContextId> {
        if let Some(id) = self.poisoned(self.contexts.read())?.get(directory) {
            return Ok(*id);
        }

        let id = db.read(|conn| fetch_or_insert_source_context(conn, directory))?;
        self.poisoned(self.contexts.write())?
            .insert(directory.to_string(), id);
        Ok(id)
    }

    pub fn source_id_in_context(
        &self,
        db: &Database,
        context: SourceContextId,
        file_name: &str,
    ) -> Result<SourceId> {
        let key = (context, file_name.to_string());
        if let Some(id) = self.poisoned(self.sources.read())?.get(&key) {
            return Ok(*id);
        }

        let id = db.read(|conn| fetch_or_insert_source(conn, context, file_name))?;
        self.poisoned(self.sources.write())?.insert(key, id);
        Ok(id)
    }

    /// Id for a full file path, creating directory and file rows as needed
    pub fn source_id(&self, db: &Database, path: &str) -> Result<SourceId> {
        let (directory, file_name) = split_source_path(path);
        let context = self.source_context_id(db, directory)?;
        self.source_id_in_context(db, context, file_name)
    }

    pub fn source_context_path(&self, db: &Database, id: SourceContextId) -> Result<String> {
        db.read(|conn| {
            conn.query_row(
                "SELECT source_context_path FROM source_contexts WHERE source_context_id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::SourceContextIdDoesNotExist(id))
        })
    }

    pub fn source_context_id_of(&self, db: &Database, id: SourceId) -> Result<SourceContextId> {
        db.read(|conn| {
            conn.query_row(
                "SELECT source_context_id FROM sources WHERE source_id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::SourceIdDoesNotExist(id))
        })
    }

    pub fn source_path(&self, db: &Database, id: SourceId) -> Result<String> {
        let (directory, file_name): (String, String) = db.read(|conn| {
            conn.query_row(
                "SELECT c.source_context_path, s.source_name FROM sources s
                 JOIN source_contexts c USING (source_context_id)
                 WHERE s.source_id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(Error::SourceIdDoesNotExist(id))
        })?;

        if directory.is_empty() {
            Ok(file_name)
        } else {
            Ok(format!("{}/{}", directory, file_name))
        }
    }

    fn poisoned<G, E>(&self, guard: std::result::Result<G, E>) -> Result<G> {
        guard.map_err(|_| Error::Poisoned("source path cache".to_string()))
    }
}

fn fetch_or_insert_source_context(conn: &Connection, directory: &str) -> Result<SourceContextId> {
    let existing = conn
        .query_row(
            "SELECT source_context_id FROM source_contexts WHERE source_context_path = ?1",
            [directory],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO source_contexts (source_context_path) VALUES (?1)",
        params![directory],
    )?;
    Ok(SourceContextId(conn.last_insert_rowid()))
}

fn fetch_or_insert_source(
    conn: &Connection,
    context: SourceContextId,
    file_name: &str,
) -> Result<SourceId> {
    if !context.is_valid() {
        return Err(Error::SourceContextIdDoesNotExist(context));
    }

    let existing = conn
        .query_row(
            "SELECT source_id FROM sources WHERE source_context_id = ?1 AND source_name = ?2",
            params![context, file_name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO sources (source_context_id, source_name) VALUES (?1, ?2)",
        params![context, file_name],
    )
    .map_err(|e| match Error::from(e) {
        Error::ConstraintPreventsModification(_) => Error::SourceContextIdDoesNotExist(context),
        other => other,
    })?;
    Ok(SourceId(conn.last_insert_rowid()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_source_path() {
        assert_eq!(split_source_path("/qml/QtQuick/Item.qml"), ("/qml/QtQuick", "Item.qml"));
        assert_eq!(split_source_path("Item.qml"), ("", "Item.qml"));
    }

    #[test]
    fn test_same_directory_shares_context() {
        let db = Database::open_in_memory().unwrap();
        let cache = SourcePathCache::new();

        let item = cache.source_id(&db, "/qml/QtQuick/Item.qml").unwrap();
        let rect = cache.source_id(&db, "/qml/QtQuick/Rectangle.qml").unwrap();

        assert_ne!(item, rect);
        assert_eq!(
            cache.source_context_id_of(&db, item).unwrap(),
            cache.source_context_id_of(&db, rect).unwrap()
        );
        assert_eq!(cache.source_id(&db, "/qml/QtQuick/Item.qml").unwrap(), item);
        assert_eq!(cache.source_path(&db, rect).unwrap(), "/qml/QtQuick/Rectangle.qml");
    }

    #[test]
    fn test_missing_ids_are_errors() {
        let db = Database::open_in_memory().unwrap();
        let cache = SourcePathCache::new();

        assert!(matches!(
            cache.source_path(&db, SourceId(12)),
            Err(Error::SourceIdDoesNotExist(SourceId(12)))
        ));
        assert!(matches!(
            cache.source_context_path(&db, SourceContextId(3)),
            Err(Error::SourceContextIdDoesNotExist(SourceContextId(3)))
        ));
        assert!(matches!(
            cache.source_id_in_context(&db, SourceContextId(3), "Item.qml"),
            Err(Error::SourceContextIdDoesNotExist(SourceContextId(3)))
        ));
    }
}
