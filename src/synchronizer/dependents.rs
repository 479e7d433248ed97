//! Reverse lookups over the stored reference graph

use std::collections::{BTreeSet, VecDeque};

use rusqlite::Connection;

use crate::Result;
use crate::ids::{ModuleId, PropertyDeclarationId, SourceId, TypeId};

fn collect_ids<T: rusqlite::types::FromSql>(
    conn: &Connection,
    sql: &str,
    param: impl rusqlite::ToSql,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map([param], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(rows)
}

pub(super) fn types_with_prototype(conn: &Connection, type_id: TypeId) -> Result<Vec<TypeId>> {
    collect_ids(conn, "SELECT type_id FROM types WHERE prototype_id = ?1 ORDER BY type_id", type_id)
}

pub(super) fn types_with_extension(conn: &Connection, type_id: TypeId) -> Result<Vec<TypeId>> {
    collect_ids(conn, "SELECT type_id FROM types WHERE extension_id = ?1 ORDER BY type_id", type_id)
}

/// Properties whose own or alias target type is `type_id`, with their owner
pub(super) fn properties_referencing_type(
    conn: &Connection,
    type_id: TypeId,
) -> Result<Vec<(PropertyDeclarationId, TypeId)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT property_declaration_id, type_id FROM property_declarations
         WHERE property_type_id = ?1 OR alias_type_id = ?1 ORDER BY property_declaration_id",
    )?;
    let rows = stmt
        .query_map([type_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Aliases that point at `property_id` directly or through their tail,
/// with their owner
pub(super) fn alias_dependents(
    conn: &Connection,
    property_id: PropertyDeclarationId,
) -> Result<Vec<(PropertyDeclarationId, TypeId)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT property_declaration_id, type_id FROM property_declarations
         WHERE alias_property_declaration_id = ?1 OR alias_property_declaration_tail_id = ?1
         ORDER BY property_declaration_id",
    )?;
    let rows = stmt
        .query_map([property_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The given types and every type that has one of them in its ancestry
pub(super) fn derived_types_closure(conn: &Connection, roots: &BTreeSet<TypeId>) -> Result<BTreeSet<TypeId>> {
    let mut closure = roots.clone();
    let mut queue: VecDeque<TypeId> = roots.iter().copied().collect();

    while let Some(type_id) = queue.pop_front() {
        let derived = types_with_prototype(conn, type_id)?
            .into_iter()
            .chain(types_with_extension(conn, type_id)?);
        for derived in derived {
            if closure.insert(derived) {
                queue.push_back(derived);
            }
        }
    }

    Ok(closure)
}

/// Aliases whose alias expression looks up a property on one of
/// `type_ids`: the stem on the alias type, or the tail on the stem's type
pub(super) fn aliases_into_types(
    conn: &Connection,
    type_ids: &BTreeSet<TypeId>,
) -> Result<Vec<PropertyDeclarationId>> {
    let mut aliases = Vec::new();
    for type_id in type_ids {
        aliases.extend(collect_ids::<PropertyDeclarationId>(
            conn,
            "SELECT property_declaration_id FROM property_declarations
             WHERE alias_type_id = ?1 AND alias_property_name IS NOT NULL",
            *type_id,
        )?);
        aliases.extend(collect_ids::<PropertyDeclarationId>(
            conn,
            "SELECT alias.property_declaration_id
             FROM property_declarations AS alias
             JOIN property_declarations AS stem
               ON stem.property_declaration_id = alias.alias_property_declaration_id
             WHERE stem.property_type_id = ?1 AND alias.alias_property_name_tail IS NOT NULL",
            *type_id,
        )?);
    }
    Ok(aliases)
}

/// The given modules and every module that re-exports one of them,
/// transitively
pub(super) fn modules_reexporting_closure(
    conn: &Connection,
    modules: &BTreeSet<ModuleId>,
) -> Result<BTreeSet<ModuleId>> {
    let mut closure = modules.clone();
    let mut queue: VecDeque<ModuleId> = modules.iter().copied().collect();

    while let Some(module_id) = queue.pop_front() {
        let reexporters: Vec<ModuleId> = collect_ids(
            conn,
            "SELECT module_id FROM module_exported_imports WHERE exported_module_id = ?1",
            module_id,
        )?;
        for reexporter in reexporters {
            if closure.insert(reexporter) {
                queue.push_back(reexporter);
            }
        }
    }

    Ok(closure)
}

/// Sources that import or depend on any of `modules`
pub(super) fn sources_importing(conn: &Connection, modules: &BTreeSet<ModuleId>) -> Result<BTreeSet<SourceId>> {
    let mut sources = BTreeSet::new();
    for module_id in modules {
        for table in ["imports", "module_dependencies"] {
            let sql = format!("SELECT DISTINCT source_id FROM {table} WHERE module_id = ?1");
            sources.extend(collect_ids::<SourceId>(conn, &sql, *module_id)?);
        }
    }
    Ok(sources)
}
