//! Query engine implementation
//!
//! Read-only lookups over a synchronized catalog:
//! - Versioned type lookup by module and exported name
//! - Prototype chain traversal and `is_based_on`
//! - Property, function, signal and enumeration declarations
//! - Imports, file statuses and project data
//!
//! Misses are `None` or empty results, never errors.

use std::collections::{BTreeSet, HashSet};

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::Result;
use crate::ids::{ModuleId, PropertyDeclarationId, SourceId, TypeId};
use crate::storage::records::{self, PropertyRow, TypeRow};
use crate::synchronization::{
    EnumerationDeclaration, EnumeratorDeclaration, ExportedType, FileStatus, FileType, Import, ModuleExportedImport,
    ProjectData,
};
use crate::traits::{PropertyDeclarationTraits, TypeTraits};
use crate::version::Version;

/// A stored type with its exported names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub source_id: SourceId,
    pub name: String,
    pub traits: TypeTraits,
    pub prototype_id: Option<TypeId>,
    pub extension_id: Option<TypeId>,
    pub default_property_name: Option<String>,
    pub exported_types: Vec<ExportedType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDeclarationInfo {
    pub id: PropertyDeclarationId,
    /// The declaring type
    pub type_id: TypeId,
    pub name: String,
    /// Effective type; for aliases the type of the aliased property
    pub property_type_id: Option<TypeId>,
    pub traits: PropertyDeclarationTraits,
    pub alias_property_name: Option<String>,
    pub alias_property_name_tail: Option<String>,
}

impl From<PropertyRow> for PropertyDeclarationInfo {
    fn from(row: PropertyRow) -> Self {
        Self {
            id: row.id,
            type_id: row.type_id,
            name: row.name,
            property_type_id: row.property_type_id,
            traits: row.traits,
            alias_property_name: row.alias_property_name,
            alias_property_name_tail: row.alias_property_name_tail,
        }
    }
}

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub modules: usize,
    pub sources: usize,
    pub types: usize,
    pub exported_types: usize,
    pub property_declarations: usize,
    pub function_declarations: usize,
    pub signal_declarations: usize,
    pub enumeration_declarations: usize,
    pub imports: usize,
    pub file_statuses: usize,
    pub project_datas: usize,
}

/// Query engine over one locked connection
pub struct QueryEngine<'a> {
    conn: &'a Connection,
}

impl<'a> QueryEngine<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Type exported as `name` by `module_id` that best matches `version`
    pub fn type_id(&self, module_id: ModuleId, name: &str, version: Version) -> Result<Option<TypeId>> {
        if !module_id.is_valid() {
            return Ok(None);
        }
        let candidates: Vec<_> = records::fetch_exported_types_named(self.conn, name)?
            .into_iter()
            .filter(|export| export.module_id == module_id)
            .collect();
        Ok(records::best_export(&candidates, version).map(|export| export.type_id))
    }

    pub fn type_id_by_source_and_name(&self, source_id: SourceId, name: &str) -> Result<Option<TypeId>> {
        records::fetch_type_id(self.conn, source_id, name)
    }

    pub fn fetch_type_by_type_id(&self, type_id: TypeId) -> Result<Option<TypeInfo>> {
        match records::fetch_type(self.conn, type_id)? {
            Some(row) => Ok(Some(self.type_info(row)?)),
            None => Ok(None),
        }
    }

    /// Every stored type ordered by id
    pub fn fetch_types(&self) -> Result<Vec<TypeInfo>> {
        records::fetch_types(self.conn)?
            .into_iter()
            .map(|row| self.type_info(row))
            .collect()
    }

    fn type_info(&self, row: TypeRow) -> Result<TypeInfo> {
        let exported_types = self.exported_types(row.type_id)?;
        Ok(TypeInfo {
            type_id: row.type_id,
            source_id: row.source_id,
            name: row.name,
            traits: row.traits,
            prototype_id: row.prototype_id,
            extension_id: row.extension_id,
            default_property_name: row.default_property_name,
            exported_types,
        })
    }

    pub fn exported_types(&self, type_id: TypeId) -> Result<Vec<ExportedType>> {
        Ok(records::fetch_exported_types_of(self.conn, type_id)?
            .into_iter()
            .map(|export| ExportedType::new(export.module_id, export.name, export.version))
            .collect())
    }

    /// Types with at least one export in `module_id`, sorted by id
    pub fn type_ids_exported_by(&self, module_id: ModuleId) -> Result<Vec<TypeId>> {
        let ids: BTreeSet<TypeId> = records::fetch_exported_types_in_module(self.conn, module_id)?
            .into_iter()
            .map(|export| export.type_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Ancestors of a type: the prototype chain first, then extensions
    pub fn prototype_ids(&self, type_id: TypeId) -> Result<Vec<TypeId>> {
        let mut ids = records::prototype_and_self_ids(self.conn, type_id)?;
        if !ids.is_empty() {
            ids.remove(0);
        }
        Ok(ids)
    }

    pub fn prototype_and_self_ids(&self, type_id: TypeId) -> Result<Vec<TypeId>> {
        records::prototype_and_self_ids(self.conn, type_id)
    }

    /// Whether `type_id` is one of `bases` or has one of them in its
    /// ancestry. No bases means false.
    pub fn is_based_on(&self, type_id: TypeId, bases: &[TypeId]) -> Result<bool> {
        if bases.is_empty() {
            return Ok(false);
        }
        let chain = records::prototype_and_self_ids(self.conn, type_id)?;
        Ok(chain.iter().any(|id| bases.contains(id)))
    }

    /// Properties visible on a type, sorted by id. A name declared along
    /// the chain more than once counts only where it is found first.
    pub fn property_declaration_ids(&self, type_id: TypeId) -> Result<Vec<PropertyDeclarationId>> {
        let mut names = HashSet::new();
        let mut ids = Vec::new();
        for id in records::prototype_and_self_ids(self.conn, type_id)? {
            for property in records::fetch_properties_of(self.conn, id)? {
                if names.insert(property.name) {
                    ids.push(property.id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn local_property_declaration_ids(&self, type_id: TypeId) -> Result<Vec<PropertyDeclarationId>> {
        Ok(records::fetch_properties_of(self.conn, type_id)?
            .into_iter()
            .map(|property| property.id)
            .collect())
    }

    /// Property named `name` on the type or its ancestry
    pub fn property_declaration_id(&self, type_id: TypeId, name: &str) -> Result<Option<PropertyDeclarationId>> {
        Ok(records::find_property_in_chain(self.conn, type_id, name)?.map(|property| property.id))
    }

    pub fn local_property_declaration_id(&self, type_id: TypeId, name: &str) -> Result<Option<PropertyDeclarationId>> {
        Ok(records::fetch_local_property(self.conn, type_id, name)?.map(|property| property.id))
    }

    pub fn property_declaration(&self, id: PropertyDeclarationId) -> Result<Option<PropertyDeclarationInfo>> {
        Ok(records::fetch_property(self.conn, id)?.map(Into::into))
    }

    /// Properties declared on the type itself, ordered by id
    pub fn property_declarations_of(&self, type_id: TypeId) -> Result<Vec<PropertyDeclarationInfo>> {
        Ok(records::fetch_properties_of(self.conn, type_id)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Function names visible on a type, sorted and deduplicated
    pub fn function_declaration_names(&self, type_id: TypeId) -> Result<Vec<String>> {
        self.member_names(type_id, "function_declarations")
    }

    pub fn signal_declaration_names(&self, type_id: TypeId) -> Result<Vec<String>> {
        self.member_names(type_id, "signal_declarations")
    }

    fn member_names(&self, type_id: TypeId, table: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT name FROM {table} WHERE type_id = ?1");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut names = BTreeSet::new();
        for id in records::prototype_and_self_ids(self.conn, type_id)? {
            let rows = stmt
                .query_map([id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            names.extend(rows);
        }
        Ok(names.into_iter().collect())
    }

    /// Enumerations declared on the type itself, ordered by name
    pub fn enumeration_declarations(&self, type_id: TypeId) -> Result<Vec<EnumerationDeclaration>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name, enumerators FROM enumeration_declarations WHERE type_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map([type_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(name, enumerators)| {
                let enumerators: Vec<EnumeratorDeclaration> = serde_json::from_str(&enumerators)?;
                Ok(EnumerationDeclaration::new(name, enumerators))
            })
            .collect()
    }

    /// The default property of a type, inherited when the type names none
    pub fn default_property_declaration_id(&self, type_id: TypeId) -> Result<Option<PropertyDeclarationId>> {
        for id in records::prototype_and_self_ids(self.conn, type_id)? {
            let Some(row) = records::fetch_type(self.conn, id)? else {
                continue;
            };
            if let Some(name) = row.default_property_name {
                return self.property_declaration_id(type_id, &name);
            }
        }
        Ok(None)
    }

    pub fn fetch_imports(&self, source_id: SourceId) -> Result<Vec<Import>> {
        self.fetch_source_imports("imports", source_id)
    }

    pub fn fetch_module_dependencies(&self, source_id: SourceId) -> Result<Vec<Import>> {
        self.fetch_source_imports("module_dependencies", source_id)
    }

    fn fetch_source_imports(&self, table: &str, source_id: SourceId) -> Result<Vec<Import>> {
        let sql = format!(
            "SELECT module_id, major_version, minor_version FROM {table} WHERE source_id = ?1 ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let imports = stmt
            .query_map([source_id], |row| {
                Ok(Import::new(
                    row.get(0)?,
                    Version {
                        major: row.get(1)?,
                        minor: row.get(2)?,
                    },
                    source_id,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(imports)
    }

    pub fn fetch_module_exported_imports(&self, module_id: ModuleId) -> Result<Vec<ModuleExportedImport>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT exported_module_id, major_version, minor_version, is_auto_version
             FROM module_exported_imports WHERE module_id = ?1 ORDER BY module_exported_import_id",
        )?;
        let imports = stmt
            .query_map([module_id], |row| {
                Ok(ModuleExportedImport::new(
                    module_id,
                    row.get(0)?,
                    Version {
                        major: row.get(1)?,
                        minor: row.get(2)?,
                    },
                    row.get(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(imports)
    }

    pub fn fetch_file_status(&self, source_id: SourceId) -> Result<Option<FileStatus>> {
        self.conn
            .query_row(
                "SELECT source_id, size, last_modified FROM file_statuses WHERE source_id = ?1",
                [source_id],
                row_to_file_status,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All file statuses ordered by source id
    pub fn fetch_file_statuses(&self) -> Result<Vec<FileStatus>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT source_id, size, last_modified FROM file_statuses ORDER BY source_id")?;
        let statuses = stmt
            .query_map([], row_to_file_status)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(statuses)
    }

    pub fn fetch_project_datas(&self, project_source_id: SourceId) -> Result<Vec<ProjectData>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT project_source_id, source_id, module_id, file_type FROM project_datas
             WHERE project_source_id = ?1 ORDER BY source_id",
        )?;
        let rows = stmt
            .query_map([project_source_id], row_to_project_data)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// Project data of a file, from whichever project lists it
    pub fn fetch_project_data(&self, source_id: SourceId) -> Result<Option<ProjectData>> {
        let row = self
            .conn
            .query_row(
                "SELECT project_source_id, source_id, module_id, file_type FROM project_datas
                 WHERE source_id = ?1 ORDER BY project_source_id LIMIT 1",
                params![source_id],
                row_to_project_data,
            )
            .optional()?;
        Ok(row.flatten())
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(CatalogStats {
            modules: count("modules")?,
            sources: count("sources")?,
            types: count("types")?,
            exported_types: count("exported_types")?,
            property_declarations: count("property_declarations")?,
            function_declarations: count("function_declarations")?,
            signal_declarations: count("signal_declarations")?,
            enumeration_declarations: count("enumeration_declarations")?,
            imports: count("imports")?,
            file_statuses: count("file_statuses")?,
            project_datas: count("project_datas")?,
        })
    }
}

fn row_to_file_status(row: &Row) -> rusqlite::Result<FileStatus> {
    Ok(FileStatus::new(row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Rows with an unknown file type are skipped
fn row_to_project_data(row: &Row) -> rusqlite::Result<Option<ProjectData>> {
    let file_type: String = row.get(3)?;
    let Some(file_type) = FileType::from_str_name(&file_type) else {
        return Ok(None);
    };
    Ok(Some(ProjectData::new(row.get(0)?, row.get(1)?, row.get(2)?, file_type)))
}
