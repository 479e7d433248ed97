//! Imports, module dependencies and module re-exports
//!
//! All three are replaced per key: imports and module dependencies per
//! source id, re-exports per exporting module id. Imports and module
//! dependencies live in separate tables and are never replaced together.

use std::collections::{BTreeSet, HashSet};

use rusqlite::params;

use super::Synchronizer;
use crate::ids::{ModuleId, SourceId};
use crate::storage::modules::module_exists;
use crate::synchronization::{Import, ModuleExportedImport, SynchronizationPackage};
use crate::version::Version;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
enum ImportTable {
    Imports,
    ModuleDependencies,
}

impl ImportTable {
    fn as_str(&self) -> &'static str {
        match self {
            ImportTable::Imports => "imports",
            ImportTable::ModuleDependencies => "module_dependencies",
        }
    }
}

impl Synchronizer<'_> {
    pub(super) fn synchronize_imports(&mut self, package: &SynchronizationPackage) -> Result<()> {
        self.synchronize_document_imports(ImportTable::Imports, &package.imports, &package.updated_source_ids)?;
        self.synchronize_document_imports(
            ImportTable::ModuleDependencies,
            &package.module_dependencies,
            &package.updated_module_dependency_source_ids,
        )?;
        self.synchronize_module_exported_imports(&package.module_exported_imports, &package.updated_module_ids)
    }

    fn synchronize_document_imports(
        &mut self,
        table: ImportTable,
        imports: &[Import],
        updated_source_ids: &[SourceId],
    ) -> Result<()> {
        for import in imports {
            if !module_exists(self.conn, import.module_id)? {
                return Err(Error::ModuleDoesNotExist(import.module_id));
            }
        }

        let sources: BTreeSet<SourceId> = updated_source_ids
            .iter()
            .copied()
            .chain(imports.iter().map(|import| import.source_id))
            .collect();
        let table_name = table.as_str();

        for source_id in sources {
            let wanted: HashSet<(ModuleId, Version)> = imports
                .iter()
                .filter(|import| import.source_id == source_id)
                .map(|import| (import.module_id, import.version))
                .collect();

            let existing: HashSet<(ModuleId, Version)> = {
                let sql = format!("SELECT module_id, major_version, minor_version FROM {table_name} WHERE source_id = ?1");
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt
                    .query_map([source_id], |row| {
                        Ok((
                            row.get::<_, ModuleId>(0)?,
                            Version {
                                major: row.get(1)?,
                                minor: row.get(2)?,
                            },
                        ))
                    })?
                    .collect::<rusqlite::Result<_>>()?;
                rows
            };

            if wanted == existing {
                continue;
            }

            for (module_id, version) in existing.difference(&wanted) {
                self.conn.execute(
                    &format!(
                        "DELETE FROM {table_name} WHERE source_id = ?1 AND module_id = ?2
                         AND major_version IS ?3 AND minor_version IS ?4"
                    ),
                    params![source_id, module_id, version.major, version.minor],
                )?;
            }

            // Declaration order decides resolution ties between imports.
            let mut inserted = HashSet::new();
            for import in imports.iter().filter(|import| import.source_id == source_id) {
                let key = (import.module_id, import.version);
                if existing.contains(&key) || !inserted.insert(key) {
                    continue;
                }
                self.conn.execute(
                    &format!(
                        "INSERT INTO {table_name} (source_id, module_id, major_version, minor_version)
                         VALUES (?1, ?2, ?3, ?4)"
                    ),
                    params![source_id, import.module_id, import.version.major, import.version.minor],
                )?;
            }

            self.sources_with_changed_imports.insert(source_id);
        }

        Ok(())
    }

    fn synchronize_module_exported_imports(
        &mut self,
        exported_imports: &[ModuleExportedImport],
        updated_module_ids: &[ModuleId],
    ) -> Result<()> {
        for exported_import in exported_imports {
            for module_id in [exported_import.module_id, exported_import.exported_module_id] {
                if !module_exists(self.conn, module_id)? {
                    return Err(Error::ModuleDoesNotExist(module_id));
                }
            }
        }

        let modules: BTreeSet<ModuleId> = updated_module_ids
            .iter()
            .copied()
            .chain(exported_imports.iter().map(|import| import.module_id))
            .collect();

        for module_id in modules {
            let wanted: HashSet<(ModuleId, Version, bool)> = exported_imports
                .iter()
                .filter(|import| import.module_id == module_id)
                .map(|import| (import.exported_module_id, import.version, import.is_auto_version))
                .collect();

            let existing: HashSet<(ModuleId, Version, bool)> = {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT exported_module_id, major_version, minor_version, is_auto_version
                     FROM module_exported_imports WHERE module_id = ?1",
                )?;
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
                    .collect::<rusqlite::Result<_>>()?;
                rows
            };

            if wanted == existing {
                continue;
            }

            self.conn.execute(
                "DELETE FROM module_exported_imports WHERE module_id = ?1",
                [module_id],
            )?;
            let mut inserted = HashSet::new();
            for import in exported_imports.iter().filter(|import| import.module_id == module_id) {
                if !inserted.insert(import.exported_module_id) {
                    continue;
                }
                self.conn.execute(
                    "INSERT INTO module_exported_imports
                     (module_id, exported_module_id, major_version, minor_version, is_auto_version)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        module_id,
                        import.exported_module_id,
                        import.version.major,
                        import.version.minor,
                        import.is_auto_version
                    ],
                )?;
            }

            self.modules_with_changed_exports.insert(module_id);
        }

        Ok(())
    }
}
