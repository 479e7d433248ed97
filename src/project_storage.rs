//! Project storage - the public entry point of the catalog
//!
//! Owns the database together with the identifier caches and the
//! well-known type cache. Writes go through [`ProjectStorage::synchronize`];
//! every other method is a read.

use std::path::Path;

use crate::ids::{ModuleId, PropertyDeclarationId, SourceContextId, SourceId, TypeId};
use crate::query::{
    CatalogStats, CommonTypeCache, PropertyDeclarationInfo, QueryEngine, TypeInfo, WellKnownType,
};
use crate::storage::{Database, ModuleCache, SourcePathCache};
use crate::synchronization::{
    EnumerationDeclaration, ExportedType, FileStatus, Import, ModuleExportedImport, ProjectData,
    SynchronizationPackage,
};
use crate::synchronizer::{SynchronizationReport, Synchronizer};
use crate::version::Version;
use crate::Result;

pub struct ProjectStorage {
    db: Database,
    modules: ModuleCache,
    sources: SourcePathCache,
    common_types: CommonTypeCache,
}

impl ProjectStorage {
    /// Open a catalog file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::with_database(Database::open(path)?))
    }

    /// Open an in-memory catalog (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_database(Database::open_in_memory()?))
    }

    fn with_database(db: Database) -> Self {
        Self {
            db,
            modules: ModuleCache::new(),
            sources: SourcePathCache::new(),
            common_types: CommonTypeCache::new(),
        }
    }

    /// Merge a package into the catalog. On error nothing is persisted.
    pub fn synchronize(&self, package: &SynchronizationPackage) -> Result<SynchronizationReport> {
        let result = self.db.write(|conn| Synchronizer::new(conn).run(package));

        match &result {
            Ok(report) => {
                tracing::info!(
                    "Synchronized {} types ({} inserted, {} updated, {} deleted, {} relinked, {} aliases)",
                    package.types.len(),
                    report.inserted_types,
                    report.updated_types,
                    report.deleted_types,
                    report.relinked,
                    report.resolved_aliases
                );
                let dropped = self.common_types.invalidate(&report.changed_export_names)?;
                if dropped > 0 {
                    tracing::debug!("Dropped {} cached common type ids", dropped);
                }
            }
            Err(e) => tracing::warn!("Synchronization rejected: {}", e),
        }
        result
    }

    // Identifier tables

    pub fn module_id(&self, name: &str) -> Result<ModuleId> {
        self.modules.module_id(&self.db, name)
    }

    pub fn module_name(&self, id: ModuleId) -> Result<String> {
        self.modules.module_name(&self.db, id)
    }

    pub fn source_context_id(&self, directory: &str) -> Result<SourceContextId> {
        self.sources.source_context_id(&self.db, directory)
    }

    pub fn source_context_path(&self, id: SourceContextId) -> Result<String> {
        self.sources.source_context_path(&self.db, id)
    }

    pub fn source_id(&self, path: &str) -> Result<SourceId> {
        self.sources.source_id(&self.db, path)
    }

    pub fn source_id_in_context(&self, context: SourceContextId, file_name: &str) -> Result<SourceId> {
        self.sources.source_id_in_context(&self.db, context, file_name)
    }

    pub fn source_path(&self, id: SourceId) -> Result<String> {
        self.sources.source_path(&self.db, id)
    }

    pub fn source_context_id_of(&self, id: SourceId) -> Result<SourceContextId> {
        self.sources.source_context_id_of(&self.db, id)
    }

    // Types

    pub fn type_id(&self, module_id: ModuleId, name: &str, version: Version) -> Result<Option<TypeId>> {
        self.db.read(|conn| QueryEngine::new(conn).type_id(module_id, name, version))
    }

    pub fn type_id_by_source_and_name(&self, source_id: SourceId, name: &str) -> Result<Option<TypeId>> {
        self.db
            .read(|conn| QueryEngine::new(conn).type_id_by_source_and_name(source_id, name))
    }

    pub fn fetch_type_by_type_id(&self, type_id: TypeId) -> Result<Option<TypeInfo>> {
        self.db.read(|conn| QueryEngine::new(conn).fetch_type_by_type_id(type_id))
    }

    pub fn fetch_types(&self) -> Result<Vec<TypeInfo>> {
        self.db.read(|conn| QueryEngine::new(conn).fetch_types())
    }

    pub fn exported_types(&self, type_id: TypeId) -> Result<Vec<ExportedType>> {
        self.db.read(|conn| QueryEngine::new(conn).exported_types(type_id))
    }

    pub fn type_ids_exported_by(&self, module_id: ModuleId) -> Result<Vec<TypeId>> {
        self.db.read(|conn| QueryEngine::new(conn).type_ids_exported_by(module_id))
    }

    pub fn prototype_ids(&self, type_id: TypeId) -> Result<Vec<TypeId>> {
        self.db.read(|conn| QueryEngine::new(conn).prototype_ids(type_id))
    }

    pub fn prototype_and_self_ids(&self, type_id: TypeId) -> Result<Vec<TypeId>> {
        self.db.read(|conn| QueryEngine::new(conn).prototype_and_self_ids(type_id))
    }

    pub fn is_based_on(&self, type_id: TypeId, bases: &[TypeId]) -> Result<bool> {
        self.db.read(|conn| QueryEngine::new(conn).is_based_on(type_id, bases))
    }

    /// Id of a well-known type, cached until its exported name changes
    pub fn common_type_id<T: WellKnownType>(&self, ty: T) -> Result<Option<TypeId>> {
        if let Some(cached) = self.common_types.get(ty)? {
            return Ok(cached);
        }
        let module_id = self.module_id(ty.module_name())?;
        let type_id = self.type_id(module_id, ty.type_name(), Version::none())?;
        self.common_types.insert(ty, type_id)?;
        Ok(type_id)
    }

    /// Same cache as [`Self::common_type_id`]; builtins live in module `QML`
    pub fn builtin_type_id(&self, ty: crate::query::BuiltinType) -> Result<Option<TypeId>> {
        self.common_type_id(ty)
    }

    // Members

    pub fn property_declaration_ids(&self, type_id: TypeId) -> Result<Vec<PropertyDeclarationId>> {
        self.db.read(|conn| QueryEngine::new(conn).property_declaration_ids(type_id))
    }

    pub fn local_property_declaration_ids(&self, type_id: TypeId) -> Result<Vec<PropertyDeclarationId>> {
        self.db
            .read(|conn| QueryEngine::new(conn).local_property_declaration_ids(type_id))
    }

    pub fn property_declaration_id(&self, type_id: TypeId, name: &str) -> Result<Option<PropertyDeclarationId>> {
        self.db
            .read(|conn| QueryEngine::new(conn).property_declaration_id(type_id, name))
    }

    pub fn local_property_declaration_id(
        &self,
        type_id: TypeId,
        name: &str,
    ) -> Result<Option<PropertyDeclarationId>> {
        self.db
            .read(|conn| QueryEngine::new(conn).local_property_declaration_id(type_id, name))
    }

    pub fn property_declaration(&self, id: PropertyDeclarationId) -> Result<Option<PropertyDeclarationInfo>> {
        self.db.read(|conn| QueryEngine::new(conn).property_declaration(id))
    }

    pub fn property_declarations_of(&self, type_id: TypeId) -> Result<Vec<PropertyDeclarationInfo>> {
        self.db.read(|conn| QueryEngine::new(conn).property_declarations_of(type_id))
    }

    pub fn function_declaration_names(&self, type_id: TypeId) -> Result<Vec<String>> {
        self.db.read(|conn| QueryEngine::new(conn).function_declaration_names(type_id))
    }

    pub fn signal_declaration_names(&self, type_id: TypeId) -> Result<Vec<String>> {
        self.db.read(|conn| QueryEngine::new(conn).signal_declaration_names(type_id))
    }

    pub fn enumeration_declarations(&self, type_id: TypeId) -> Result<Vec<EnumerationDeclaration>> {
        self.db.read(|conn| QueryEngine::new(conn).enumeration_declarations(type_id))
    }

    pub fn default_property_declaration_id(&self, type_id: TypeId) -> Result<Option<PropertyDeclarationId>> {
        self.db
            .read(|conn| QueryEngine::new(conn).default_property_declaration_id(type_id))
    }

    // Imports and bookkeeping

    pub fn fetch_imports(&self, source_id: SourceId) -> Result<Vec<Import>> {
        self.db.read(|conn| QueryEngine::new(conn).fetch_imports(source_id))
    }

    pub fn fetch_module_dependencies(&self, source_id: SourceId) -> Result<Vec<Import>> {
        self.db.read(|conn| QueryEngine::new(conn).fetch_module_dependencies(source_id))
    }

    pub fn fetch_module_exported_imports(&self, module_id: ModuleId) -> Result<Vec<ModuleExportedImport>> {
        self.db
            .read(|conn| QueryEngine::new(conn).fetch_module_exported_imports(module_id))
    }

    pub fn fetch_file_status(&self, source_id: SourceId) -> Result<Option<FileStatus>> {
        self.db.read(|conn| QueryEngine::new(conn).fetch_file_status(source_id))
    }

    pub fn fetch_file_statuses(&self) -> Result<Vec<FileStatus>> {
        self.db.read(|conn| QueryEngine::new(conn).fetch_file_statuses())
    }

    pub fn fetch_project_datas(&self, project_source_id: SourceId) -> Result<Vec<ProjectData>> {
        self.db
            .read(|conn| QueryEngine::new(conn).fetch_project_datas(project_source_id))
    }

    pub fn fetch_project_data(&self, source_id: SourceId) -> Result<Option<ProjectData>> {
        self.db.read(|conn| QueryEngine::new(conn).fetch_project_data(source_id))
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        self.db.read(|conn| QueryEngine::new(conn).stats())
    }
}
