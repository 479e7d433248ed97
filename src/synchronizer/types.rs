//! Type rows, exported names and type deletion

use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::{OptionalExtension, params};

use super::{Synchronizer, dependents, mark};
use crate::ids::{ModuleId, SourceId, TypeId};
use crate::storage::modules::module_exists;
use crate::storage::records::{self, ExportedTypeRow, TypeRow};
use crate::synchronization::Type;
use crate::version::Version;
use crate::{Error, Result};

type ExportKey = (ModuleId, String, Version);

impl<'a> Synchronizer<'a> {
    /// Insert new types and update traits of existing ones. Returns each
    /// package type paired with its id.
    pub(super) fn upsert_types<'p>(&mut self, types: &'p [Type]) -> Result<Vec<(TypeId, &'p Type)>> {
        let mut entries = Vec::with_capacity(types.len());

        for ty in types {
            let existing = records::fetch_type_id(self.conn, ty.source_id, &ty.type_name)?;
            let type_id = match existing {
                Some(type_id) if ty.change_level.syncs_declarations() => {
                    self.conn.execute(
                        "UPDATE types SET traits = ?1, default_property_name = ?2 WHERE type_id = ?3",
                        params![ty.traits.bits(), ty.default_property_name, type_id],
                    )?;
                    self.report.updated_types += 1;
                    type_id
                }
                Some(type_id) => {
                    self.conn.execute(
                        "UPDATE types SET traits = ?1 WHERE type_id = ?2",
                        params![ty.traits.bits(), type_id],
                    )?;
                    self.report.updated_types += 1;
                    type_id
                }
                None => {
                    self.conn.execute(
                        "INSERT INTO types (source_id, name, traits, default_property_name) VALUES (?1, ?2, ?3, ?4)",
                        params![ty.source_id, ty.type_name, ty.traits.bits(), ty.default_property_name],
                    )?;
                    self.report.inserted_types += 1;
                    TypeId(self.conn.last_insert_rowid())
                }
            };

            self.package_types.insert(type_id);
            if ty.change_level.syncs_declarations() {
                self.declaration_types.insert(type_id);
            }
            entries.push((type_id, ty));
        }

        Ok(entries)
    }

    /// Stored types of the updated sources that the package no longer names
    pub(super) fn collect_removed_types(&self, updated_source_ids: &[SourceId]) -> Result<Vec<TypeRow>> {
        let mut removed = Vec::new();
        let sources: HashSet<SourceId> = updated_source_ids.iter().copied().collect();
        for source_id in sources {
            for row in records::fetch_types_in_source(self.conn, source_id)? {
                if !self.package_types.contains(&row.type_id) {
                    removed.push(row);
                }
            }
        }
        removed.sort_by_key(|row| row.type_id);
        Ok(removed)
    }

    /// Delete types together with their exports. References from retained
    /// types are cut first and queued for relinking; a reference that
    /// cannot be relinked to another type rejects the whole package.
    pub(super) fn delete_types(&mut self, removed: &[TypeRow]) -> Result<()> {
        let removed_ids: HashSet<TypeId> = removed.iter().map(|row| row.type_id).collect();

        for row in removed {
            tracing::debug!("Removing type {} ({})", row.name, row.type_id);
            for export in records::fetch_exported_types_of(self.conn, row.type_id)? {
                self.changed_export_names.insert(export.name.clone());
            }
            self.conn.execute("DELETE FROM exported_types WHERE type_id = ?1", [row.type_id])?;

            self.detach_type_referrers(row.type_id, &removed_ids)?;
            for property in records::fetch_properties_of(self.conn, row.type_id)? {
                self.detach_alias_dependents(property.id, &removed_ids)?;
            }
        }

        for row in removed {
            self.conn.execute(
                "UPDATE types SET prototype_id = NULL, extension_id = NULL WHERE type_id = ?1",
                [row.type_id],
            )?;
            self.conn.execute(
                "UPDATE property_declarations SET property_type_id = NULL, alias_type_id = NULL,
                 alias_property_declaration_id = NULL, alias_property_declaration_tail_id = NULL
                 WHERE type_id = ?1",
                [row.type_id],
            )?;
        }

        for row in removed {
            self.conn.execute("DELETE FROM types WHERE type_id = ?1", [row.type_id])?;
            self.report.deleted_types += 1;
        }

        Ok(())
    }

    /// Cut prototype, extension and property references to `type_id` held
    /// by types that survive this call.
    fn detach_type_referrers(&mut self, type_id: TypeId, removed: &HashSet<TypeId>) -> Result<()> {
        for referrer in dependents::types_with_prototype(self.conn, type_id)? {
            if removed.contains(&referrer) {
                continue;
            }
            self.conn.execute("UPDATE types SET prototype_id = NULL WHERE type_id = ?1", [referrer])?;
            if !self.declaration_types.contains(&referrer) {
                mark(&mut self.relinkables.prototypes, referrer, true);
            }
        }

        for referrer in dependents::types_with_extension(self.conn, type_id)? {
            if removed.contains(&referrer) {
                continue;
            }
            self.conn.execute("UPDATE types SET extension_id = NULL WHERE type_id = ?1", [referrer])?;
            if !self.declaration_types.contains(&referrer) {
                mark(&mut self.relinkables.extensions, referrer, true);
            }
        }

        for (property_id, owner) in dependents::properties_referencing_type(self.conn, type_id)? {
            if removed.contains(&owner) {
                continue;
            }
            self.conn.execute(
                "UPDATE property_declarations SET
                 property_type_id = CASE WHEN property_type_id = ?2 THEN NULL ELSE property_type_id END,
                 alias_type_id = CASE WHEN alias_type_id = ?2 THEN NULL ELSE alias_type_id END
                 WHERE property_declaration_id = ?1",
                params![property_id, type_id],
            )?;
            if !self.declaration_types.contains(&owner) {
                mark(&mut self.relinkables.properties, property_id, true);
            }
        }

        Ok(())
    }

    pub(super) fn synchronize_exported_types(&mut self, entries: &[(TypeId, &Type)]) -> Result<()> {
        let mut wanted: BTreeMap<ExportKey, TypeId> = BTreeMap::new();
        let mut existing: HashMap<ExportKey, ExportedTypeRow> = HashMap::new();

        for (type_id, ty) in entries.iter().filter(|(_, ty)| ty.change_level.syncs_exported_types()) {
            for export in &ty.exported_types {
                if !module_exists(self.conn, export.module_id)? {
                    return Err(Error::ExportedTypeCannotBeInserted(export.name.clone()));
                }
                let key = (export.module_id, export.name.clone(), export.version);
                if let Some(other) = wanted.insert(key, *type_id) {
                    if other != *type_id {
                        return Err(Error::ExportedTypeCannotBeInserted(export.name.clone()));
                    }
                }
            }
            for row in records::fetch_exported_types_of(self.conn, *type_id)? {
                existing.insert((row.module_id, row.name.clone(), row.version), row);
            }
        }

        for (key, row) in &existing {
            if !wanted.contains_key(key) {
                self.conn.execute("DELETE FROM exported_types WHERE exported_type_id = ?1", [row.id])?;
                self.changed_export_names.insert(row.name.clone());
            }
        }

        for ((module_id, name, version), type_id) in &wanted {
            let key = (*module_id, name.clone(), *version);
            match existing.get(&key) {
                Some(row) if row.type_id == *type_id => {}
                Some(row) => {
                    self.conn.execute(
                        "UPDATE exported_types SET type_id = ?1 WHERE exported_type_id = ?2",
                        params![type_id, row.id],
                    )?;
                    self.changed_export_names.insert(name.clone());
                }
                None => {
                    let owner: Option<TypeId> = self
                        .conn
                        .query_row(
                            "SELECT type_id FROM exported_types WHERE module_id = ?1 AND name = ?2
                             AND major_version IS ?3 AND minor_version IS ?4",
                            params![module_id, name, version.major, version.minor],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if owner.is_some() {
                        return Err(Error::ExportedTypeCannotBeInserted(name.clone()));
                    }
                    self.conn
                        .execute(
                            "INSERT INTO exported_types (module_id, name, major_version, minor_version, type_id)
                             VALUES (?1, ?2, ?3, ?4, ?5)",
                            params![module_id, name, version.major, version.minor, type_id],
                        )
                        .map_err(|_| Error::ExportedTypeCannotBeInserted(name.clone()))?;
                    self.changed_export_names.insert(name.clone());
                }
            }
        }

        Ok(())
    }

    /// Resolve prototypes, extensions and property types declared by the
    /// package.
    pub(super) fn resolve_package_types(&mut self, entries: &[(TypeId, &Type)]) -> Result<()> {
        for (type_id, ty) in entries.iter().filter(|(_, ty)| ty.change_level.syncs_declarations()) {
            let before = records::fetch_type(self.conn, *type_id)?;

            let (prototype_id, prototype_name_id) = match &ty.prototype {
                Some(name) => {
                    let name_id = super::names::fetch_or_insert_imported_type_name(self.conn, name, ty.source_id)?;
                    (Some(self.resolve_type_name(name, ty.source_id)?), Some(name_id))
                }
                None => (None, None),
            };
            let (extension_id, extension_name_id) = match &ty.extension {
                Some(name) => {
                    let name_id = super::names::fetch_or_insert_imported_type_name(self.conn, name, ty.source_id)?;
                    (Some(self.resolve_type_name(name, ty.source_id)?), Some(name_id))
                }
                None => (None, None),
            };

            self.conn.execute(
                "UPDATE types SET prototype_id = ?1, prototype_name_id = ?2, extension_id = ?3, extension_name_id = ?4
                 WHERE type_id = ?5",
                params![prototype_id, prototype_name_id, extension_id, extension_name_id, type_id],
            )?;

            let changed = before
                .map(|row| row.prototype_id != prototype_id || row.extension_id != extension_id)
                .unwrap_or(true);
            if changed {
                self.chain_changed.insert(*type_id);
            }
        }

        for (type_id, _) in entries.iter().filter(|(_, ty)| ty.change_level.syncs_declarations()) {
            for property in records::fetch_properties_of(self.conn, *type_id)? {
                self.resolve_property_type(&property, false)?;
            }
        }

        Ok(())
    }
}
