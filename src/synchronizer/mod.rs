//! Type synchronizer
//!
//! Merges a [`SynchronizationPackage`] into the catalog inside one write
//! transaction:
//! 1. validate identifiers
//! 2. replace imports, module dependencies and module re-exports
//! 3. upsert types, drop types that vanished from updated sources
//! 4. replace exported names and member declarations
//! 5. resolve type names of the package, then relink dependents elsewhere
//! 6. check the prototype graph for cycles, resolve aliases, drop unused
//!    imported type names
//! 7. replace file statuses and project data
//!
//! Any error leaves the transaction uncommitted.

mod alias;
mod cycles;
mod declarations;
mod dependents;
mod files;
mod imports;
mod names;
mod relink;
mod types;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use rusqlite::Connection;

use crate::ids::{ModuleId, PropertyDeclarationId, SourceId, TypeId};
use crate::storage::modules::module_exists;
use crate::{Error, Result};
use crate::synchronization::SynchronizationPackage;
use names::NameResolver;

/// What a synchronize call changed
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SynchronizationReport {
    pub inserted_types: usize,
    pub updated_types: usize,
    pub deleted_types: usize,
    pub relinked: usize,
    pub resolved_aliases: usize,
    /// Exported names that were added, removed or moved to another type
    pub changed_export_names: Vec<String>,
}

impl fmt::Display for SynchronizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Synchronization:")?;
        writeln!(f, "  Inserted types: {}", self.inserted_types)?;
        writeln!(f, "  Updated types: {}", self.updated_types)?;
        writeln!(f, "  Deleted types: {}", self.deleted_types)?;
        writeln!(f, "  Relinked references: {}", self.relinked)?;
        writeln!(f, "  Resolved aliases: {}", self.resolved_aliases)
    }
}

/// References that must be re-resolved from their stored names. The flag
/// records whether the previous target was deleted in this call.
#[derive(Debug, Default)]
struct Relinkables {
    prototypes: BTreeMap<TypeId, bool>,
    extensions: BTreeMap<TypeId, bool>,
    properties: BTreeMap<PropertyDeclarationId, bool>,
}

fn mark<K: Ord>(map: &mut BTreeMap<K, bool>, key: K, target_deleted: bool) {
    *map.entry(key).or_insert(false) |= target_deleted;
}

impl Relinkables {
    fn is_empty(&self) -> bool {
        self.prototypes.is_empty() && self.extensions.is_empty() && self.properties.is_empty()
    }
}

pub(crate) struct Synchronizer<'a> {
    conn: &'a Connection,
    resolver: NameResolver,
    report: SynchronizationReport,
    /// Types whose prototype, extension and members this package declares
    declaration_types: HashSet<TypeId>,
    /// Every type named by the package
    package_types: BTreeSet<TypeId>,
    changed_export_names: BTreeSet<String>,
    sources_with_changed_imports: BTreeSet<SourceId>,
    modules_with_changed_exports: BTreeSet<ModuleId>,
    relinkables: Relinkables,
    /// Types whose prototype or extension id changed
    chain_changed: BTreeSet<TypeId>,
    /// Concrete properties whose type or traits changed or that were removed
    changed_properties: BTreeSet<PropertyDeclarationId>,
    pending_aliases: BTreeSet<PropertyDeclarationId>,
    /// Retained aliases whose target property was removed by this call
    orphaned_aliases: HashSet<PropertyDeclarationId>,
}

impl<'a> Synchronizer<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            resolver: NameResolver::new(),
            report: SynchronizationReport::default(),
            declaration_types: HashSet::new(),
            package_types: BTreeSet::new(),
            changed_export_names: BTreeSet::new(),
            sources_with_changed_imports: BTreeSet::new(),
            modules_with_changed_exports: BTreeSet::new(),
            relinkables: Relinkables::default(),
            chain_changed: BTreeSet::new(),
            changed_properties: BTreeSet::new(),
            pending_aliases: BTreeSet::new(),
            orphaned_aliases: HashSet::new(),
        }
    }

    pub(crate) fn run(mut self, package: &SynchronizationPackage) -> Result<SynchronizationReport> {
        self.validate(package)?;

        self.synchronize_imports(package)?;
        tracing::debug!(
            "Imports synchronized ({} sources changed, {} modules re-export differently)",
            self.sources_with_changed_imports.len(),
            self.modules_with_changed_exports.len()
        );

        let entries = self.upsert_types(&package.types)?;
        let removed = self.collect_removed_types(&package.updated_source_ids)?;
        self.delete_types(&removed)?;
        self.synchronize_exported_types(&entries)?;
        self.synchronize_declarations(&entries)?;
        tracing::debug!(
            "Types upserted: {} inserted, {} updated, {} deleted",
            self.report.inserted_types,
            self.report.updated_types,
            self.report.deleted_types
        );

        self.resolve_package_types(&entries)?;
        self.relink()?;
        self.check_prototype_cycles()?;
        self.resolve_aliases()?;
        let unused_names = names::delete_unused_imported_type_names(self.conn)?;
        if unused_names > 0 {
            tracing::debug!("Deleted {} unused imported type names", unused_names);
        }

        self.synchronize_file_statuses(package)?;
        self.synchronize_project_datas(package)?;

        self.report.changed_export_names = self.changed_export_names.into_iter().collect();
        Ok(self.report)
    }
}

impl Synchronizer<'_> {
    /// Reject null identifiers before anything is written
    fn validate(&self, package: &SynchronizationPackage) -> Result<()> {
        if let Some(ty) = package.types.iter().find(|ty| !ty.source_id.is_valid()) {
            return Err(Error::TypeHasInvalidSourceId(ty.type_name.clone()));
        }
        if package.file_statuses.iter().any(|status| !status.source_id.is_valid()) {
            return Err(Error::FileStatusHasInvalidSourceId);
        }
        for data in &package.project_datas {
            if !data.project_source_id.is_valid() {
                return Err(Error::ProjectDataHasInvalidProjectSourceId);
            }
            if !data.source_id.is_valid() {
                return Err(Error::ProjectDataHasInvalidSourceId);
            }
            if !data.module_id.is_valid() {
                return Err(Error::ProjectDataHasInvalidModuleId);
            }
            if !module_exists(self.conn, data.module_id)? {
                return Err(Error::ModuleDoesNotExist(data.module_id));
            }
        }
        Ok(())
    }
}
