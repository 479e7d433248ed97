//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - modules(name), source_contexts(path), sources(context, name)
//! - types(source, name, traits, prototype, extension)
//! - exported_types(module, name, version, type)
//! - property/function/signal/enumeration declarations per type
//! - imports, module_dependencies, module_exported_imports
//! - file_statuses, project_datas

pub mod database;
pub mod modules;
pub mod records;
pub mod schema;
pub mod source_paths;

pub use database::Database;
pub use modules::ModuleCache;
pub use source_paths::SourcePathCache;
