//! Property, function, signal and enumeration declarations
//!
//! Members are replaced per type. Properties are matched by name so their
//! ids survive a resync; functions and signals by name and signature.

use std::collections::{HashMap, HashSet};

use rusqlite::params;

use super::names::fetch_or_insert_imported_type_name;
use super::{Synchronizer, dependents};
use crate::Result;
use crate::ids::{PropertyDeclarationId, TypeId};
use crate::storage::records::{self, PropertyRow};
use crate::synchronization::{EnumerationDeclaration, FunctionDeclaration, PropertyDeclaration, SignalDeclaration, Type};

impl Synchronizer<'_> {
    pub(super) fn synchronize_declarations(&mut self, entries: &[(TypeId, &Type)]) -> Result<()> {
        for (type_id, ty) in entries.iter().filter(|(_, ty)| ty.change_level.syncs_declarations()) {
            self.synchronize_properties(*type_id, ty)?;
            self.synchronize_functions(*type_id, &ty.function_declarations)?;
            self.synchronize_signals(*type_id, &ty.signal_declarations)?;
            self.synchronize_enumerations(*type_id, &ty.enumeration_declarations)?;
        }
        Ok(())
    }

    fn synchronize_properties(&mut self, type_id: TypeId, ty: &Type) -> Result<()> {
        let mut existing: HashMap<String, PropertyRow> = records::fetch_properties_of(self.conn, type_id)?
            .into_iter()
            .map(|row| (row.name.clone(), row))
            .collect();

        let mut seen = HashSet::new();
        for property in &ty.property_declarations {
            if !seen.insert(property.name.as_str()) {
                continue;
            }
            let name_id = fetch_or_insert_imported_type_name(self.conn, &property.type_name, ty.source_id)?;
            match existing.remove(&property.name) {
                Some(row) => self.update_property(&row, property, name_id)?,
                None => self.insert_property(type_id, property, name_id)?,
            }
        }

        for row in existing.into_values() {
            self.remove_property(&row)?;
        }
        Ok(())
    }

    fn insert_property(
        &mut self,
        type_id: TypeId,
        property: &PropertyDeclaration,
        name_id: crate::ids::ImportedTypeNameId,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO property_declarations
             (type_id, name, property_type_name_id, traits, alias_property_name, alias_property_name_tail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                type_id,
                property.name,
                name_id,
                property.traits.bits(),
                property.alias_property_name,
                property.alias_property_name_tail
            ],
        )?;
        let id = PropertyDeclarationId(self.conn.last_insert_rowid());
        if property.is_alias() {
            self.pending_aliases.insert(id);
        }
        Ok(())
    }

    fn update_property(
        &mut self,
        row: &PropertyRow,
        property: &PropertyDeclaration,
        name_id: crate::ids::ImportedTypeNameId,
    ) -> Result<()> {
        if property.is_alias() {
            // Traits of an alias come from its target.
            self.conn.execute(
                "UPDATE property_declarations SET property_type_name_id = ?1,
                 alias_property_name = ?2, alias_property_name_tail = ?3
                 WHERE property_declaration_id = ?4",
                params![name_id, property.alias_property_name, property.alias_property_name_tail, row.id],
            )?;
            if !row.is_alias() {
                self.changed_properties.insert(row.id);
            }
            self.pending_aliases.insert(row.id);
            return Ok(());
        }

        if row.is_alias() {
            self.conn.execute(
                "UPDATE property_declarations SET property_type_name_id = ?1, traits = ?2,
                 alias_type_id = NULL, alias_property_name = NULL, alias_property_name_tail = NULL,
                 alias_property_declaration_id = NULL, alias_property_declaration_tail_id = NULL
                 WHERE property_declaration_id = ?3",
                params![name_id, property.traits.bits(), row.id],
            )?;
            self.changed_properties.insert(row.id);
            return Ok(());
        }

        self.conn.execute(
            "UPDATE property_declarations SET property_type_name_id = ?1, traits = ?2
             WHERE property_declaration_id = ?3",
            params![name_id, property.traits.bits(), row.id],
        )?;
        if row.traits != property.traits {
            self.changed_properties.insert(row.id);
        }
        Ok(())
    }

    fn remove_property(&mut self, row: &PropertyRow) -> Result<()> {
        self.detach_alias_dependents(row.id, &HashSet::new())?;
        self.conn.execute(
            "DELETE FROM property_declarations WHERE property_declaration_id = ?1",
            [row.id],
        )?;
        self.changed_properties.remove(&row.id);
        self.pending_aliases.remove(&row.id);
        Ok(())
    }

    /// Cut alias links to `property_id` so the property can go away. The
    /// aliases are queued for resolution; those the package does not
    /// redeclare are remembered as orphans.
    pub(super) fn detach_alias_dependents(
        &mut self,
        property_id: PropertyDeclarationId,
        removed_types: &HashSet<TypeId>,
    ) -> Result<()> {
        for (alias_id, owner) in dependents::alias_dependents(self.conn, property_id)? {
            if removed_types.contains(&owner) || alias_id == property_id {
                continue;
            }
            self.conn.execute(
                "UPDATE property_declarations SET
                 alias_property_declaration_id = CASE WHEN alias_property_declaration_id = ?2
                     THEN NULL ELSE alias_property_declaration_id END,
                 alias_property_declaration_tail_id = CASE WHEN alias_property_declaration_tail_id = ?2
                     THEN NULL ELSE alias_property_declaration_tail_id END
                 WHERE property_declaration_id = ?1",
                params![alias_id, property_id],
            )?;
            self.pending_aliases.insert(alias_id);
            if !self.declaration_types.contains(&owner) {
                self.orphaned_aliases.insert(alias_id);
            }
        }
        Ok(())
    }

    fn synchronize_functions(&mut self, type_id: TypeId, functions: &[FunctionDeclaration]) -> Result<()> {
        let existing: HashMap<(String, String), (i64, String)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT function_declaration_id, name, signature, return_type_name
                 FROM function_declarations WHERE type_id = ?1",
            )?;
            let rows = stmt
                .query_map([type_id], |row| {
                    let key = (row.get::<_, String>(1)?, row.get::<_, String>(2)?);
                    Ok((key, (row.get::<_, i64>(0)?, row.get::<_, String>(3)?)))
                })?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let mut wanted = HashMap::new();
        for function in functions {
            let signature = serde_json::to_string(&function.parameters)?;
            wanted
                .entry((function.name.clone(), signature))
                .or_insert_with(|| function.return_type_name.clone());
        }

        for (key, (id, _)) in &existing {
            if !wanted.contains_key(key) {
                self.conn.execute("DELETE FROM function_declarations WHERE function_declaration_id = ?1", [id])?;
            }
        }
        for ((name, signature), return_type_name) in &wanted {
            match existing.get(&(name.clone(), signature.clone())) {
                Some((_, stored)) if stored == return_type_name => {}
                Some((id, _)) => {
                    self.conn.execute(
                        "UPDATE function_declarations SET return_type_name = ?1 WHERE function_declaration_id = ?2",
                        params![return_type_name, id],
                    )?;
                }
                None => {
                    self.conn.execute(
                        "INSERT INTO function_declarations (type_id, name, signature, return_type_name)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![type_id, name, signature, return_type_name],
                    )?;
                }
            }
        }
        Ok(())
    }

    fn synchronize_signals(&mut self, type_id: TypeId, signals: &[SignalDeclaration]) -> Result<()> {
        let existing: HashMap<(String, String), i64> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT signal_declaration_id, name, signature FROM signal_declarations WHERE type_id = ?1",
            )?;
            let rows = stmt
                .query_map([type_id], |row| {
                    let key = (row.get::<_, String>(1)?, row.get::<_, String>(2)?);
                    Ok((key, row.get::<_, i64>(0)?))
                })?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let mut wanted = HashSet::new();
        for signal in signals {
            wanted.insert((signal.name.clone(), serde_json::to_string(&signal.parameters)?));
        }

        for (key, id) in &existing {
            if !wanted.contains(key) {
                self.conn.execute("DELETE FROM signal_declarations WHERE signal_declaration_id = ?1", [id])?;
            }
        }
        for (name, signature) in wanted.iter().filter(|key| !existing.contains_key(*key)) {
            self.conn.execute(
                "INSERT INTO signal_declarations (type_id, name, signature) VALUES (?1, ?2, ?3)",
                params![type_id, name, signature],
            )?;
        }
        Ok(())
    }

    fn synchronize_enumerations(&mut self, type_id: TypeId, enumerations: &[EnumerationDeclaration]) -> Result<()> {
        let existing: HashMap<String, (i64, String)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT enumeration_declaration_id, name, enumerators FROM enumeration_declarations WHERE type_id = ?1",
            )?;
            let rows = stmt
                .query_map([type_id], |row| {
                    Ok((row.get::<_, String>(1)?, (row.get::<_, i64>(0)?, row.get::<_, String>(2)?)))
                })?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let mut wanted = HashMap::new();
        for enumeration in enumerations {
            let enumerators = serde_json::to_string(&enumeration.enumerator_declarations)?;
            wanted.entry(enumeration.name.clone()).or_insert(enumerators);
        }

        for (name, (id, _)) in &existing {
            if !wanted.contains_key(name) {
                self.conn.execute(
                    "DELETE FROM enumeration_declarations WHERE enumeration_declaration_id = ?1",
                    [id],
                )?;
            }
        }
        for (name, enumerators) in &wanted {
            match existing.get(name) {
                Some((_, stored)) if stored == enumerators => {}
                Some((id, _)) => {
                    self.conn.execute(
                        "UPDATE enumeration_declarations SET enumerators = ?1 WHERE enumeration_declaration_id = ?2",
                        params![enumerators, id],
                    )?;
                }
                None => {
                    self.conn.execute(
                        "INSERT INTO enumeration_declarations (type_id, name, enumerators) VALUES (?1, ?2, ?3)",
                        params![type_id, name, enumerators],
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Resolve the stored type name of a property. Aliases get the type
    /// their expression points into and are queued; concrete properties
    /// get their type directly.
    pub(super) fn resolve_property_type(&mut self, row: &PropertyRow, target_deleted: bool) -> Result<bool> {
        let Some(name_id) = row.property_type_name_id else {
            return Ok(false);
        };
        let type_id = self.resolve_stored_name(name_id, target_deleted)?;

        if row.is_alias() {
            let changed = row.alias_type_id != Some(type_id);
            if changed {
                self.conn.execute(
                    "UPDATE property_declarations SET alias_type_id = ?1 WHERE property_declaration_id = ?2",
                    params![type_id, row.id],
                )?;
            }
            self.pending_aliases.insert(row.id);
            return Ok(changed);
        }

        let changed = row.property_type_id != Some(type_id);
        if changed {
            self.conn.execute(
                "UPDATE property_declarations SET property_type_id = ?1 WHERE property_declaration_id = ?2",
                params![type_id, row.id],
            )?;
            self.changed_properties.insert(row.id);
        }
        Ok(changed)
    }
}
