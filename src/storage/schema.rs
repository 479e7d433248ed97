//! Database schema definitions

/// Directories that own source files
pub const CREATE_SOURCE_CONTEXTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS source_contexts (
    source_context_id INTEGER PRIMARY KEY,
    source_context_path TEXT NOT NULL UNIQUE
)
"#;

pub const CREATE_SOURCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    source_id INTEGER PRIMARY KEY,
    source_context_id INTEGER NOT NULL REFERENCES source_contexts(source_context_id),
    source_name TEXT NOT NULL,
    UNIQUE(source_context_id, source_name)
)
"#;

pub const CREATE_MODULES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS modules (
    module_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
)
"#;

/// A type name as written in a source, optionally pinned to a module
/// version. Types and properties keep the name they were resolved from so
/// they can be relinked later.
pub const CREATE_IMPORTED_TYPE_NAMES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS imported_type_names (
    imported_type_name_id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    module_id INTEGER,
    major_version INTEGER,
    minor_version INTEGER
)
"#;

pub const CREATE_TYPES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS types (
    type_id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    traits INTEGER NOT NULL DEFAULT 0,
    prototype_id INTEGER REFERENCES types(type_id),
    prototype_name_id INTEGER REFERENCES imported_type_names(imported_type_name_id),
    extension_id INTEGER REFERENCES types(type_id),
    extension_name_id INTEGER REFERENCES imported_type_names(imported_type_name_id),
    default_property_name TEXT,
    UNIQUE(source_id, name)
)
"#;

pub const CREATE_EXPORTED_TYPES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS exported_types (
    exported_type_id INTEGER PRIMARY KEY,
    module_id INTEGER NOT NULL REFERENCES modules(module_id),
    name TEXT NOT NULL,
    major_version INTEGER,
    minor_version INTEGER,
    type_id INTEGER NOT NULL REFERENCES types(type_id)
)
"#;

/// `property_type_id` holds the effective type; for aliases it is copied
/// from the end of the alias chain and `alias_type_id` holds the type the
/// alias expression points into.
pub const CREATE_PROPERTY_DECLARATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS property_declarations (
    property_declaration_id INTEGER PRIMARY KEY,
    type_id INTEGER NOT NULL REFERENCES types(type_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    property_type_id INTEGER REFERENCES types(type_id),
    property_type_name_id INTEGER REFERENCES imported_type_names(imported_type_name_id),
    traits INTEGER NOT NULL DEFAULT 0,
    alias_type_id INTEGER REFERENCES types(type_id),
    alias_property_name TEXT,
    alias_property_name_tail TEXT,
    alias_property_declaration_id INTEGER REFERENCES property_declarations(property_declaration_id),
    alias_property_declaration_tail_id INTEGER REFERENCES property_declarations(property_declaration_id),
    UNIQUE(type_id, name)
)
"#;

pub const CREATE_FUNCTION_DECLARATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS function_declarations (
    function_declaration_id INTEGER PRIMARY KEY,
    type_id INTEGER NOT NULL REFERENCES types(type_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    signature TEXT NOT NULL,
    return_type_name TEXT NOT NULL DEFAULT '',
    UNIQUE(type_id, name, signature)
)
"#;

pub const CREATE_SIGNAL_DECLARATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS signal_declarations (
    signal_declaration_id INTEGER PRIMARY KEY,
    type_id INTEGER NOT NULL REFERENCES types(type_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    signature TEXT NOT NULL,
    UNIQUE(type_id, name, signature)
)
"#;

pub const CREATE_ENUMERATION_DECLARATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS enumeration_declarations (
    enumeration_declaration_id INTEGER PRIMARY KEY,
    type_id INTEGER NOT NULL REFERENCES types(type_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    enumerators TEXT NOT NULL,
    UNIQUE(type_id, name)
)
"#;

pub const CREATE_IMPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS imports (
    import_id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL,
    module_id INTEGER NOT NULL REFERENCES modules(module_id),
    major_version INTEGER,
    minor_version INTEGER
)
"#;

pub const CREATE_MODULE_DEPENDENCIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS module_dependencies (
    module_dependency_id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL,
    module_id INTEGER NOT NULL REFERENCES modules(module_id),
    major_version INTEGER,
    minor_version INTEGER
)
"#;

pub const CREATE_MODULE_EXPORTED_IMPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS module_exported_imports (
    module_exported_import_id INTEGER PRIMARY KEY,
    module_id INTEGER NOT NULL REFERENCES modules(module_id),
    exported_module_id INTEGER NOT NULL REFERENCES modules(module_id),
    major_version INTEGER,
    minor_version INTEGER,
    is_auto_version INTEGER NOT NULL DEFAULT 0,
    UNIQUE(module_id, exported_module_id)
)
"#;

pub const CREATE_FILE_STATUSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS file_statuses (
    source_id INTEGER PRIMARY KEY,
    size INTEGER NOT NULL,
    last_modified INTEGER NOT NULL
)
"#;

pub const CREATE_PROJECT_DATAS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS project_datas (
    project_source_id INTEGER NOT NULL,
    source_id INTEGER NOT NULL,
    module_id INTEGER NOT NULL REFERENCES modules(module_id),
    file_type TEXT NOT NULL,
    PRIMARY KEY(project_source_id, source_id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_imported_type_names_key ON imported_type_names(source_id, name, IFNULL(module_id, -1), IFNULL(major_version, -1), IFNULL(minor_version, -1))",
    "CREATE INDEX IF NOT EXISTS idx_imported_type_names_name ON imported_type_names(name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_exported_types_key ON exported_types(module_id, name, IFNULL(major_version, -1), IFNULL(minor_version, -1))",
    "CREATE INDEX IF NOT EXISTS idx_exported_types_type ON exported_types(type_id)",
    "CREATE INDEX IF NOT EXISTS idx_exported_types_name ON exported_types(name)",
    "CREATE INDEX IF NOT EXISTS idx_types_prototype ON types(prototype_id)",
    "CREATE INDEX IF NOT EXISTS idx_types_extension ON types(extension_id)",
    "CREATE INDEX IF NOT EXISTS idx_types_prototype_name ON types(prototype_name_id)",
    "CREATE INDEX IF NOT EXISTS idx_types_extension_name ON types(extension_name_id)",
    "CREATE INDEX IF NOT EXISTS idx_properties_type ON property_declarations(property_type_id)",
    "CREATE INDEX IF NOT EXISTS idx_properties_type_name ON property_declarations(property_type_name_id)",
    "CREATE INDEX IF NOT EXISTS idx_properties_alias_type ON property_declarations(alias_type_id)",
    "CREATE INDEX IF NOT EXISTS idx_properties_alias ON property_declarations(alias_property_declaration_id)",
    "CREATE INDEX IF NOT EXISTS idx_properties_alias_tail ON property_declarations(alias_property_declaration_tail_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_imports_key ON imports(source_id, module_id, IFNULL(major_version, -1), IFNULL(minor_version, -1))",
    "CREATE INDEX IF NOT EXISTS idx_imports_module ON imports(module_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_module_dependencies_key ON module_dependencies(source_id, module_id, IFNULL(major_version, -1), IFNULL(minor_version, -1))",
    "CREATE INDEX IF NOT EXISTS idx_module_dependencies_module ON module_dependencies(module_id)",
    "CREATE INDEX IF NOT EXISTS idx_module_exported_imports_exported ON module_exported_imports(exported_module_id)",
    "CREATE INDEX IF NOT EXISTS idx_project_datas_source ON project_datas(source_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_SOURCE_CONTEXTS_TABLE,
        CREATE_SOURCES_TABLE,
        CREATE_MODULES_TABLE,
        CREATE_IMPORTED_TYPE_NAMES_TABLE,
        CREATE_TYPES_TABLE,
        CREATE_EXPORTED_TYPES_TABLE,
        CREATE_PROPERTY_DECLARATIONS_TABLE,
        CREATE_FUNCTION_DECLARATIONS_TABLE,
        CREATE_SIGNAL_DECLARATIONS_TABLE,
        CREATE_ENUMERATION_DECLARATIONS_TABLE,
        CREATE_IMPORTS_TABLE,
        CREATE_MODULE_DEPENDENCIES_TABLE,
        CREATE_MODULE_EXPORTED_IMPORTS_TABLE,
        CREATE_FILE_STATUSES_TABLE,
        CREATE_PROJECT_DATAS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
