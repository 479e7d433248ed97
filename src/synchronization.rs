//! Synchronization package - the input of `ProjectStorage::synchronize`
//!
//! A package carries the parsed declarations of a changed subset of source
//! files. The `updated_*` lists name the keys whose stored rows are
//! replaced; anything not named there is left alone.

use serde::{Deserialize, Serialize};

use crate::ids::{ModuleId, SourceId};
use crate::traits::{PropertyDeclarationTraits, TypeTraits};
use crate::version::Version;

/// `import <module> <version>` in a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    pub module_id: ModuleId,
    #[serde(default)]
    pub version: Version,
    pub source_id: SourceId,
}

impl Import {
    pub fn new(module_id: ModuleId, version: Version, source_id: SourceId) -> Self {
        Self {
            module_id,
            version,
            source_id,
        }
    }
}

/// Importing `module_id` also makes `exported_module_id` visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleExportedImport {
    pub module_id: ModuleId,
    pub exported_module_id: ModuleId,
    #[serde(default)]
    pub version: Version,
    /// Inherit the version the importer asked for
    #[serde(default)]
    pub is_auto_version: bool,
}

impl ModuleExportedImport {
    pub fn new(
        module_id: ModuleId,
        exported_module_id: ModuleId,
        version: Version,
        is_auto_version: bool,
    ) -> Self {
        Self {
            module_id,
            exported_module_id,
            version,
            is_auto_version,
        }
    }
}

/// A reference to a type by name as written in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImportedTypeName {
    /// Resolved through every import of the declaring source
    Unqualified { name: String },
    /// `Alias.Name` - resolved only through the pinned import
    Qualified { name: String, import: Import },
}

impl ImportedTypeName {
    pub fn unqualified(name: impl Into<String>) -> Self {
        ImportedTypeName::Unqualified { name: name.into() }
    }

    pub fn qualified(name: impl Into<String>, import: Import) -> Self {
        ImportedTypeName::Qualified {
            name: name.into(),
            import,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ImportedTypeName::Unqualified { name } | ImportedTypeName::Qualified { name, .. } => {
                name
            }
        }
    }
}

/// A name under which a type is visible from a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportedType {
    pub module_id: ModuleId,
    pub name: String,
    #[serde(default)]
    pub version: Version,
}

impl ExportedType {
    pub fn new(module_id: ModuleId, name: impl Into<String>, version: Version) -> Self {
        Self {
            module_id,
            name: name.into(),
            version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    /// For aliases this is the type the alias expression points into
    pub type_name: ImportedTypeName,
    #[serde(default)]
    pub traits: PropertyDeclarationTraits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_property_name_tail: Option<String>,
}

impl PropertyDeclaration {
    pub fn new(
        name: impl Into<String>,
        type_name: ImportedTypeName,
        traits: PropertyDeclarationTraits,
    ) -> Self {
        Self {
            name: name.into(),
            type_name,
            traits,
            alias_property_name: None,
            alias_property_name_tail: None,
        }
    }

    /// `property alias <name>: <object of type_name>.<alias_property_name>`
    pub fn alias(
        name: impl Into<String>,
        type_name: ImportedTypeName,
        alias_property_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name,
            traits: PropertyDeclarationTraits::empty(),
            alias_property_name: Some(alias_property_name.into()),
            alias_property_name_tail: None,
        }
    }

    pub fn with_alias_tail(mut self, tail: impl Into<String>) -> Self {
        self.alias_property_name_tail = Some(tail.into());
        self
    }

    pub fn is_alias(&self) -> bool {
        self.alias_property_name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub traits: PropertyDeclarationTraits,
}

impl ParameterDeclaration {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            traits: PropertyDeclarationTraits::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default)]
    pub return_type_name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
}

impl FunctionDeclaration {
    pub fn new(
        name: impl Into<String>,
        return_type_name: impl Into<String>,
        parameters: Vec<ParameterDeclaration>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type_name: return_type_name.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDeclaration {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
}

impl SignalDeclaration {
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterDeclaration>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumeratorDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl EnumeratorDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationDeclaration {
    pub name: String,
    #[serde(default)]
    pub enumerator_declarations: Vec<EnumeratorDeclaration>,
}

impl EnumerationDeclaration {
    pub fn new(name: impl Into<String>, enumerator_declarations: Vec<EnumeratorDeclaration>) -> Self {
        Self {
            name: name.into(),
            enumerator_declarations,
        }
    }

    /// Enumerator values with implicit ones counted up from the previous
    /// enumerator (or zero).
    pub fn resolved_values(&self) -> Vec<(String, i64)> {
        let mut next = 0i64;
        self.enumerator_declarations
            .iter()
            .map(|enumerator| {
                let value = enumerator.value.unwrap_or(next);
                next = value.wrapping_add(1);
                (enumerator.name.clone(), value)
            })
            .collect()
    }
}

/// How much of a type a package replaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeLevel {
    /// Members, prototype, extension and exports
    #[default]
    Full,
    /// Only exports and traits; stored members stay untouched
    Minimal,
    /// Everything except the exported names
    ExcludeExportedTypes,
}

impl ChangeLevel {
    pub fn syncs_declarations(self) -> bool {
        matches!(self, ChangeLevel::Full | ChangeLevel::ExcludeExportedTypes)
    }

    pub fn syncs_exported_types(self) -> bool {
        matches!(self, ChangeLevel::Full | ChangeLevel::Minimal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype: Option<ImportedTypeName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<ImportedTypeName>,
    #[serde(default)]
    pub traits: TypeTraits,
    pub source_id: SourceId,
    #[serde(default)]
    pub exported_types: Vec<ExportedType>,
    #[serde(default)]
    pub property_declarations: Vec<PropertyDeclaration>,
    #[serde(default)]
    pub function_declarations: Vec<FunctionDeclaration>,
    #[serde(default)]
    pub signal_declarations: Vec<SignalDeclaration>,
    #[serde(default)]
    pub enumeration_declarations: Vec<EnumerationDeclaration>,
    #[serde(default)]
    pub change_level: ChangeLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_property_name: Option<String>,
}

impl Type {
    pub fn new(type_name: impl Into<String>, source_id: SourceId, traits: TypeTraits) -> Self {
        Self {
            type_name: type_name.into(),
            prototype: None,
            extension: None,
            traits,
            source_id,
            exported_types: Vec::new(),
            property_declarations: Vec::new(),
            function_declarations: Vec::new(),
            signal_declarations: Vec::new(),
            enumeration_declarations: Vec::new(),
            change_level: ChangeLevel::Full,
            default_property_name: None,
        }
    }

    pub fn with_prototype(mut self, prototype: ImportedTypeName) -> Self {
        self.prototype = Some(prototype);
        self
    }

    pub fn with_extension(mut self, extension: ImportedTypeName) -> Self {
        self.extension = Some(extension);
        self
    }

    pub fn with_exported_type(mut self, exported_type: ExportedType) -> Self {
        self.exported_types.push(exported_type);
        self
    }

    pub fn with_property(mut self, property: PropertyDeclaration) -> Self {
        self.property_declarations.push(property);
        self
    }

    pub fn with_function(mut self, function: FunctionDeclaration) -> Self {
        self.function_declarations.push(function);
        self
    }

    pub fn with_signal(mut self, signal: SignalDeclaration) -> Self {
        self.signal_declarations.push(signal);
        self
    }

    pub fn with_enumeration(mut self, enumeration: EnumerationDeclaration) -> Self {
        self.enumeration_declarations.push(enumeration);
        self
    }

    pub fn with_change_level(mut self, change_level: ChangeLevel) -> Self {
        self.change_level = change_level;
        self
    }

    pub fn with_default_property(mut self, name: impl Into<String>) -> Self {
        self.default_property_name = Some(name.into());
        self
    }
}

/// Last synchronized size and modification time of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileStatus {
    pub source_id: SourceId,
    pub size: i64,
    pub last_modified: i64,
}

impl FileStatus {
    pub fn new(source_id: SourceId, size: i64, last_modified: i64) -> Self {
        Self {
            source_id,
            size,
            last_modified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    QmlDocument,
    QmlTypes,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::QmlDocument => "qml_document",
            FileType::QmlTypes => "qml_types",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "qml_document" => Some(FileType::QmlDocument),
            "qml_types" => Some(FileType::QmlTypes),
            _ => None,
        }
    }
}

/// Associates a file with the project directory and module it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectData {
    pub project_source_id: SourceId,
    pub source_id: SourceId,
    pub module_id: ModuleId,
    pub file_type: FileType,
}

impl ProjectData {
    pub fn new(
        project_source_id: SourceId,
        source_id: SourceId,
        module_id: ModuleId,
        file_type: FileType,
    ) -> Self {
        Self {
            project_source_id,
            source_id,
            module_id,
            file_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynchronizationPackage {
    pub imports: Vec<Import>,
    pub module_dependencies: Vec<Import>,
    pub module_exported_imports: Vec<ModuleExportedImport>,
    pub types: Vec<Type>,
    pub updated_source_ids: Vec<SourceId>,
    pub updated_module_ids: Vec<ModuleId>,
    pub updated_module_dependency_source_ids: Vec<SourceId>,
    pub file_statuses: Vec<FileStatus>,
    pub updated_file_status_source_ids: Vec<SourceId>,
    pub project_datas: Vec<ProjectData>,
    pub updated_project_source_ids: Vec<SourceId>,
}

impl SynchronizationPackage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Package replacing the given sources with `types`
    pub fn with_types(types: Vec<Type>, updated_source_ids: Vec<SourceId>) -> Self {
        Self {
            types,
            updated_source_ids,
            ..Self::default()
        }
    }
}
