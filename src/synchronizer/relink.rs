//! Re-resolve stored references of types outside the package
//!
//! A reference needs another look when an export with its name changed,
//! when the imports of its source changed, or when the type it pointed to
//! was deleted.

use std::collections::BTreeSet;

use rusqlite::params;

use super::{Synchronizer, dependents, mark};
use crate::Result;
use crate::ids::{PropertyDeclarationId, SourceId, TypeId};
use crate::storage::records;

impl Synchronizer<'_> {
    pub(super) fn relink(&mut self) -> Result<()> {
        self.collect_relinkables_by_name()?;
        self.collect_relinkables_by_source()?;

        if self.relinkables.is_empty() {
            return Ok(());
        }

        let relinkables = std::mem::take(&mut self.relinkables);
        tracing::debug!(
            "Relinking {} prototypes, {} extensions, {} properties",
            relinkables.prototypes.len(),
            relinkables.extensions.len(),
            relinkables.properties.len()
        );

        for (type_id, target_deleted) in relinkables.prototypes {
            self.relink_type_link(type_id, TypeLink::Prototype, target_deleted)?;
        }
        for (type_id, target_deleted) in relinkables.extensions {
            self.relink_type_link(type_id, TypeLink::Extension, target_deleted)?;
        }
        for (property_id, target_deleted) in relinkables.properties {
            let Some(row) = records::fetch_property(self.conn, property_id)? else {
                continue;
            };
            if self.resolve_property_type(&row, target_deleted)? {
                self.report.relinked += 1;
            }
        }

        Ok(())
    }

    fn relink_type_link(&mut self, type_id: TypeId, link: TypeLink, target_deleted: bool) -> Result<()> {
        let Some(row) = records::fetch_type(self.conn, type_id)? else {
            return Ok(());
        };
        let (current, name_id) = match link {
            TypeLink::Prototype => (row.prototype_id, row.prototype_name_id),
            TypeLink::Extension => (row.extension_id, row.extension_name_id),
        };
        let Some(name_id) = name_id else {
            return Ok(());
        };

        let resolved = self.resolve_stored_name(name_id, target_deleted)?;
        if current == Some(resolved) {
            return Ok(());
        }

        let sql = match link {
            TypeLink::Prototype => "UPDATE types SET prototype_id = ?1 WHERE type_id = ?2",
            TypeLink::Extension => "UPDATE types SET extension_id = ?1 WHERE type_id = ?2",
        };
        self.conn.execute(sql, params![resolved, type_id])?;
        self.chain_changed.insert(type_id);
        self.report.relinked += 1;
        Ok(())
    }

    /// References written with a name whose exports changed
    fn collect_relinkables_by_name(&mut self) -> Result<()> {
        for name in &self.changed_export_names {
            let mut stmt = self.conn.prepare_cached(
                "SELECT t.type_id,
                        IFNULL(t.prototype_name_id = n.imported_type_name_id, 0),
                        IFNULL(t.extension_name_id = n.imported_type_name_id, 0)
                 FROM types t JOIN imported_type_names n
                   ON n.imported_type_name_id IN (t.prototype_name_id, t.extension_name_id)
                 WHERE n.name = ?1",
            )?;
            let links = stmt
                .query_map([name], |row| {
                    Ok((row.get::<_, TypeId>(0)?, row.get::<_, bool>(1)?, row.get::<_, bool>(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (type_id, is_prototype, is_extension) in links {
                if self.declaration_types.contains(&type_id) {
                    continue;
                }
                if is_prototype {
                    mark(&mut self.relinkables.prototypes, type_id, false);
                }
                if is_extension {
                    mark(&mut self.relinkables.extensions, type_id, false);
                }
            }

            let mut stmt = self.conn.prepare_cached(
                "SELECT p.property_declaration_id, p.type_id
                 FROM property_declarations p JOIN imported_type_names n
                   ON n.imported_type_name_id = p.property_type_name_id
                 WHERE n.name = ?1",
            )?;
            let properties = stmt
                .query_map([name], |row| Ok((row.get::<_, PropertyDeclarationId>(0)?, row.get::<_, TypeId>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (property_id, owner) in properties {
                if !self.declaration_types.contains(&owner) {
                    mark(&mut self.relinkables.properties, property_id, false);
                }
            }
        }
        Ok(())
    }

    /// Every reference in a source whose visible modules changed
    fn collect_relinkables_by_source(&mut self) -> Result<()> {
        let mut sources: BTreeSet<SourceId> = self.sources_with_changed_imports.clone();
        if !self.modules_with_changed_exports.is_empty() {
            let modules = dependents::modules_reexporting_closure(self.conn, &self.modules_with_changed_exports)?;
            sources.extend(dependents::sources_importing(self.conn, &modules)?);
        }

        for source_id in sources {
            for row in records::fetch_types_in_source(self.conn, source_id)? {
                if self.declaration_types.contains(&row.type_id) {
                    continue;
                }
                if row.prototype_name_id.is_some() {
                    mark(&mut self.relinkables.prototypes, row.type_id, false);
                }
                if row.extension_name_id.is_some() {
                    mark(&mut self.relinkables.extensions, row.type_id, false);
                }
                for property in records::fetch_properties_of(self.conn, row.type_id)? {
                    mark(&mut self.relinkables.properties, property.id, false);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum TypeLink {
    Prototype,
    Extension,
}
