//! Type name resolution through versioned imports

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use rusqlite::{Connection, OptionalExtension, params};

use super::Synchronizer;
use crate::ids::{ImportedTypeNameId, ModuleId, SourceId, TypeId};
use crate::storage::records::{self, ExportedTypeRow};
use crate::synchronization::{Import, ImportedTypeName};
use crate::version::Version;
use crate::{Error, Result};

/// A module visible from a source, directly or through re-exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct VisibleImport {
    pub module_id: ModuleId,
    pub version: Version,
    pub indirect: bool,
}

/// Resolves names against the imports visible to a source. Visible import
/// lists are cached for the duration of one synchronize call, after the
/// import tables have been replaced.
#[derive(Debug, Default)]
pub(super) struct NameResolver {
    visible: HashMap<SourceId, Vec<VisibleImport>>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn visible_imports(&mut self, conn: &Connection, source_id: SourceId) -> Result<Vec<VisibleImport>> {
        if let Some(imports) = self.visible.get(&source_id) {
            return Ok(imports.clone());
        }

        let mut direct = Vec::new();
        for table in ["imports", "module_dependencies"] {
            let sql = format!(
                "SELECT module_id, major_version, minor_version FROM {table} WHERE source_id = ?1 ORDER BY rowid"
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map([source_id], |row| {
                Ok((
                    row.get::<_, ModuleId>(0)?,
                    Version {
                        major: row.get(1)?,
                        minor: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                direct.push(row?);
            }
        }

        let imports = expand_exported_imports(conn, direct)?;
        self.visible.insert(source_id, imports.clone());
        Ok(imports)
    }

    pub fn resolve(&mut self, conn: &Connection, name: &ImportedTypeName, source_id: SourceId) -> Result<Option<TypeId>> {
        let imports = match name {
            ImportedTypeName::Unqualified { .. } => self.visible_imports(conn, source_id)?,
            ImportedTypeName::Qualified { import, .. } => {
                expand_exported_imports(conn, vec![(import.module_id, import.version)])?
            }
        };

        let candidates = records::fetch_exported_types_named(conn, name.name())?;
        Ok(best_visible_export(&imports, &candidates).map(|export| export.type_id))
    }
}

/// Follow module re-exports breadth first. A module already visible is not
/// added again, so re-export cycles terminate.
pub(super) fn expand_exported_imports(
    conn: &Connection,
    direct: Vec<(ModuleId, Version)>,
) -> Result<Vec<VisibleImport>> {
    let mut seen: HashSet<ModuleId> = direct.iter().map(|(module_id, _)| *module_id).collect();
    let mut visible: Vec<VisibleImport> = direct
        .iter()
        .map(|&(module_id, version)| VisibleImport {
            module_id,
            version,
            indirect: false,
        })
        .collect();
    let mut queue: VecDeque<(ModuleId, Version)> = direct.into_iter().collect();

    let mut stmt = conn.prepare_cached(
        "SELECT exported_module_id, major_version, minor_version, is_auto_version
         FROM module_exported_imports WHERE module_id = ?1 ORDER BY module_exported_import_id",
    )?;
    while let Some((module_id, version)) = queue.pop_front() {
        let rows = stmt
            .query_map([module_id], |row| {
                Ok((
                    row.get::<_, ModuleId>(0)?,
                    Version {
                        major: row.get(1)?,
                        minor: row.get(2)?,
                    },
                    row.get::<_, bool>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (exported_module_id, own_version, is_auto_version) in rows {
            if !seen.insert(exported_module_id) {
                continue;
            }
            let version = if is_auto_version { version } else { own_version };
            visible.push(VisibleImport {
                module_id: exported_module_id,
                version,
                indirect: true,
            });
            queue.push_back((exported_module_id, version));
        }
    }

    Ok(visible)
}

/// Direct imports beat indirect ones, then the higher version wins, then
/// the import listed first.
fn best_visible_export<'a>(imports: &[VisibleImport], candidates: &'a [ExportedTypeRow]) -> Option<&'a ExportedTypeRow> {
    let mut best: Option<(usize, &VisibleImport, &ExportedTypeRow)> = None;

    for (order, import) in imports.iter().enumerate() {
        for export in candidates
            .iter()
            .filter(|export| export.module_id == import.module_id && export.version.satisfies(import.version))
        {
            let better = match best {
                None => true,
                Some((best_order, best_import, best_export)) => {
                    let by_kind = best_import.indirect.cmp(&import.indirect);
                    let by_version = export.version.rank(&best_export.version);
                    let by_order = best_order.cmp(&order);
                    by_kind.then(by_version).then(by_order) == Ordering::Greater
                }
            };
            if better {
                best = Some((order, import, export));
            }
        }
    }

    best.map(|(_, _, export)| export)
}

pub(super) fn fetch_or_insert_imported_type_name(
    conn: &Connection,
    name: &ImportedTypeName,
    source_id: SourceId,
) -> Result<ImportedTypeNameId> {
    let (module_id, version) = match name {
        ImportedTypeName::Unqualified { .. } => (None, Version::none()),
        ImportedTypeName::Qualified { import, .. } => (Some(import.module_id), import.version),
    };

    let existing = conn
        .query_row(
            "SELECT imported_type_name_id FROM imported_type_names
             WHERE source_id = ?1 AND name = ?2 AND module_id IS ?3
               AND major_version IS ?4 AND minor_version IS ?5",
            params![source_id, name.name(), module_id, version.major, version.minor],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO imported_type_names (source_id, name, module_id, major_version, minor_version)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![source_id, name.name(), module_id, version.major, version.minor],
    )?;
    Ok(ImportedTypeNameId(conn.last_insert_rowid()))
}

/// Drop stored names that no prototype, extension or property refers to
/// any more
pub(super) fn delete_unused_imported_type_names(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM imported_type_names
         WHERE imported_type_name_id NOT IN (
                 SELECT prototype_name_id FROM types WHERE prototype_name_id IS NOT NULL
                 UNION SELECT extension_name_id FROM types WHERE extension_name_id IS NOT NULL
                 UNION SELECT property_type_name_id FROM property_declarations
                       WHERE property_type_name_id IS NOT NULL)",
        [],
    )?;
    Ok(deleted)
}

pub(super) fn fetch_imported_type_name(
    conn: &Connection,
    id: ImportedTypeNameId,
) -> Result<(SourceId, ImportedTypeName)> {
    let (source_id, name, module_id, major, minor): (SourceId, String, Option<ModuleId>, Option<u32>, Option<u32>) = conn
        .query_row(
            "SELECT source_id, name, module_id, major_version, minor_version
             FROM imported_type_names WHERE imported_type_name_id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()?
        .ok_or_else(|| Error::InvalidInput(format!("Unknown imported type name {}", id)))?;

    let name = match module_id {
        None => ImportedTypeName::Unqualified { name },
        Some(module_id) => ImportedTypeName::Qualified {
            name,
            import: Import::new(module_id, Version { major, minor }, source_id),
        },
    };
    Ok((source_id, name))
}

impl Synchronizer<'_> {
    /// Resolve a name written in `source_id`, failing when nothing visible
    /// exports it.
    pub(super) fn resolve_type_name(&mut self, name: &ImportedTypeName, source_id: SourceId) -> Result<TypeId> {
        self.resolver
            .resolve(self.conn, name, source_id)?
            .ok_or_else(|| Error::TypeNameDoesNotExist {
                name: name.name().to_string(),
                source_id,
            })
    }

    /// Re-resolve a stored name. When the previous target was deleted in
    /// this call and nothing replaces it, the deletion itself is rejected.
    pub(super) fn resolve_stored_name(&mut self, id: ImportedTypeNameId, target_deleted: bool) -> Result<TypeId> {
        let (source_id, name) = fetch_imported_type_name(self.conn, id)?;
        match self.resolver.resolve(self.conn, &name, source_id)? {
            Some(type_id) => Ok(type_id),
            None if target_deleted => Err(Error::ConstraintPreventsModification(format!(
                "type {} referenced from source {} would be removed",
                name.name(),
                source_id
            ))),
            None => Err(Error::TypeNameDoesNotExist {
                name: name.name().to_string(),
                source_id,
            }),
        }
    }
}
