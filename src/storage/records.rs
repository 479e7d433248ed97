//! Row readers shared by the synchronizer and the query facade

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::Result;
use crate::ids::{ExportedTypeId, ImportedTypeNameId, ModuleId, PropertyDeclarationId, SourceId, TypeId};
use crate::traits::{PropertyDeclarationTraits, TypeTraits};
use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRow {
    pub type_id: TypeId,
    pub source_id: SourceId,
    pub name: String,
    pub traits: TypeTraits,
    pub prototype_id: Option<TypeId>,
    pub prototype_name_id: Option<ImportedTypeNameId>,
    pub extension_id: Option<TypeId>,
    pub extension_name_id: Option<ImportedTypeNameId>,
    pub default_property_name: Option<String>,
}

const TYPE_COLUMNS: &str = "type_id, source_id, name, traits, prototype_id, prototype_name_id, \
     extension_id, extension_name_id, default_property_name";

fn row_to_type(row: &Row) -> rusqlite::Result<TypeRow> {
    Ok(TypeRow {
        type_id: row.get(0)?,
        source_id: row.get(1)?,
        name: row.get(2)?,
        traits: TypeTraits::from_bits_retain(row.get(3)?),
        prototype_id: row.get(4)?,
        prototype_name_id: row.get(5)?,
        extension_id: row.get(6)?,
        extension_name_id: row.get(7)?,
        default_property_name: row.get(8)?,
    })
}

pub fn fetch_type(conn: &Connection, type_id: TypeId) -> Result<Option<TypeRow>> {
    let sql = format!("SELECT {TYPE_COLUMNS} FROM types WHERE type_id = ?1");
    conn.query_row(&sql, [type_id], row_to_type)
        .optional()
        .map_err(Into::into)
}

pub fn fetch_types(conn: &Connection) -> Result<Vec<TypeRow>> {
    let sql = format!("SELECT {TYPE_COLUMNS} FROM types ORDER BY type_id");
    let mut stmt = conn.prepare(&sql)?;
    let types = stmt
        .query_map([], row_to_type)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(types)
}

pub fn fetch_types_in_source(conn: &Connection, source_id: SourceId) -> Result<Vec<TypeRow>> {
    let sql = format!("SELECT {TYPE_COLUMNS} FROM types WHERE source_id = ?1 ORDER BY type_id");
    let mut stmt = conn.prepare(&sql)?;
    let types = stmt
        .query_map([source_id], row_to_type)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(types)
}

pub fn fetch_type_id(conn: &Connection, source_id: SourceId, name: &str) -> Result<Option<TypeId>> {
    conn.query_row(
        "SELECT type_id FROM types WHERE source_id = ?1 AND name = ?2",
        params![source_id, name],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRow {
    pub id: PropertyDeclarationId,
    pub type_id: TypeId,
    pub name: String,
    pub property_type_id: Option<TypeId>,
    pub property_type_name_id: Option<ImportedTypeNameId>,
    pub traits: PropertyDeclarationTraits,
    pub alias_type_id: Option<TypeId>,
    pub alias_property_name: Option<String>,
    pub alias_property_name_tail: Option<String>,
    pub alias_property_declaration_id: Option<PropertyDeclarationId>,
    pub alias_property_declaration_tail_id: Option<PropertyDeclarationId>,
}

impl PropertyRow {
    pub fn is_alias(&self) -> bool {
        self.alias_property_name.is_some()
    }
}

const PROPERTY_COLUMNS: &str = "property_declaration_id, type_id, name, property_type_id, \
     property_type_name_id, traits, alias_type_id, alias_property_name, alias_property_name_tail, \
     alias_property_declaration_id, alias_property_declaration_tail_id";

fn row_to_property(row: &Row) -> rusqlite::Result<PropertyRow> {
    Ok(PropertyRow {
        id: row.get(0)?,
        type_id: row.get(1)?,
        name: row.get(2)?,
        property_type_id: row.get(3)?,
        property_type_name_id: row.get(4)?,
        traits: PropertyDeclarationTraits::from_bits_retain(row.get(5)?),
        alias_type_id: row.get(6)?,
        alias_property_name: row.get(7)?,
        alias_property_name_tail: row.get(8)?,
        alias_property_declaration_id: row.get(9)?,
        alias_property_declaration_tail_id: row.get(10)?,
    })
}

pub fn fetch_property(conn: &Connection, id: PropertyDeclarationId) -> Result<Option<PropertyRow>> {
    let sql = format!("SELECT {PROPERTY_COLUMNS} FROM property_declarations WHERE property_declaration_id = ?1");
    conn.query_row(&sql, [id], row_to_property)
        .optional()
        .map_err(Into::into)
}

pub fn fetch_local_property(conn: &Connection, type_id: TypeId, name: &str) -> Result<Option<PropertyRow>> {
    let sql = format!("SELECT {PROPERTY_COLUMNS} FROM property_declarations WHERE type_id = ?1 AND name = ?2");
    conn.query_row(&sql, params![type_id, name], row_to_property)
        .optional()
        .map_err(Into::into)
}

pub fn fetch_properties_of(conn: &Connection, type_id: TypeId) -> Result<Vec<PropertyRow>> {
    let sql = format!(
        "SELECT {PROPERTY_COLUMNS} FROM property_declarations WHERE type_id = ?1 ORDER BY property_declaration_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let properties = stmt
        .query_map([type_id], row_to_property)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(properties)
}

/// The type itself followed by its ancestry: the whole prototype chain
/// first, then extension chains. Types reachable along several paths are
/// listed once.
pub fn prototype_and_self_ids(conn: &Connection, type_id: TypeId) -> Result<Vec<TypeId>> {
    let mut stmt = conn.prepare_cached("SELECT prototype_id, extension_id FROM types WHERE type_id = ?1")?;
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![type_id];

    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        let links: Option<(Option<TypeId>, Option<TypeId>)> = stmt
            .query_row([current], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        let Some((prototype, extension)) = links else {
            continue;
        };
        ids.push(current);
        if let Some(extension) = extension {
            stack.push(extension);
        }
        if let Some(prototype) = prototype {
            stack.push(prototype);
        }
    }

    Ok(ids)
}

/// First property named `name` on the type or its ancestry
pub fn find_property_in_chain(conn: &Connection, type_id: TypeId, name: &str) -> Result<Option<PropertyRow>> {
    for id in prototype_and_self_ids(conn, type_id)? {
        if let Some(property) = fetch_local_property(conn, id, name)? {
            return Ok(Some(property));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedTypeRow {
    pub id: ExportedTypeId,
    pub module_id: ModuleId,
    pub name: String,
    pub version: Version,
    pub type_id: TypeId,
}

fn row_to_exported_type(row: &Row) -> rusqlite::Result<ExportedTypeRow> {
    Ok(ExportedTypeRow {
        id: row.get(0)?,
        module_id: row.get(1)?,
        name: row.get(2)?,
        version: Version {
            major: row.get(3)?,
            minor: row.get(4)?,
        },
        type_id: row.get(5)?,
    })
}

const EXPORTED_TYPE_COLUMNS: &str = "exported_type_id, module_id, name, major_version, minor_version, type_id";

pub fn fetch_exported_types_named(conn: &Connection, name: &str) -> Result<Vec<ExportedTypeRow>> {
    let sql = format!("SELECT {EXPORTED_TYPE_COLUMNS} FROM exported_types WHERE name = ?1 ORDER BY exported_type_id");
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map([name], row_to_exported_type)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn fetch_exported_types_of(conn: &Connection, type_id: TypeId) -> Result<Vec<ExportedTypeRow>> {
    let sql = format!(
        "SELECT {EXPORTED_TYPE_COLUMNS} FROM exported_types WHERE type_id = ?1 \
         ORDER BY module_id, name, major_version, minor_version"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map([type_id], row_to_exported_type)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn fetch_exported_types_in_module(conn: &Connection, module_id: ModuleId) -> Result<Vec<ExportedTypeRow>> {
    let sql = format!("SELECT {EXPORTED_TYPE_COLUMNS} FROM exported_types WHERE module_id = ?1 ORDER BY exported_type_id");
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map([module_id], row_to_exported_type)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Pick the best export for a version request
pub fn best_export<'a>(
    candidates: impl IntoIterator<Item = &'a ExportedTypeRow>,
    requested: Version,
) -> Option<&'a ExportedTypeRow> {
    candidates
        .into_iter()
        .filter(|export| export.version.satisfies(requested))
        .max_by(|a, b| a.version.rank(&b.version).then_with(|| b.id.cmp(&a.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn insert_type(conn: &Connection, id: i64, name: &str, prototype: Option<i64>, extension: Option<i64>) {
        conn.execute(
            "INSERT INTO types (type_id, source_id, name, prototype_id, extension_id) VALUES (?1, 1, ?2, ?3, ?4)",
            params![id, name, prototype, extension],
        )
        .unwrap();
    }

    #[test]
    fn test_chain_lists_prototypes_before_extensions() {
        let db = Database::open_in_memory().unwrap();
        db.read(|conn| {
            insert_type(conn, 1, "QObject", None, None);
            insert_type(conn, 2, "QQuickItemExtension", Some(1), None);
            insert_type(conn, 3, "QQuickItem", Some(1), Some(2));
            insert_type(conn, 4, "QQuickRectangle", Some(3), None);

            let chain = prototype_and_self_ids(conn, TypeId(4))?;
            assert_eq!(chain, vec![TypeId(4), TypeId(3), TypeId(1), TypeId(2)]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_chain_of_missing_type_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let chain = db.read(|conn| prototype_and_self_ids(conn, TypeId(9))).unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_best_export_prefers_highest_matching_version() {
        let export = |id: i64, version: Version| ExportedTypeRow {
            id: ExportedTypeId(id),
            module_id: ModuleId(1),
            name: "Item".to_string(),
            version,
            type_id: TypeId(id),
        };
        let rows = vec![
            export(1, Version::new(1, 0)),
            export(2, Version::new(2, 0)),
            export(3, Version::new(2, 11)),
            export(4, Version::none()),
        ];

        assert_eq!(best_export(&rows, Version::major(2)).unwrap().id, ExportedTypeId(3));
        assert_eq!(best_export(&rows, Version::new(2, 5)).unwrap().id, ExportedTypeId(2));
        assert_eq!(best_export(&rows, Version::major(7)).unwrap().id, ExportedTypeId(4));
    }
}
