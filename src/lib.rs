//! # qmlcatalog - persistent QML type catalog
//!
//! Keeps type information parsed from QML documents and qmltypes files
//! consistent while source files are reparsed one batch at a time.
//!
//! qmlcatalog provides:
//! - Identifier tables for modules and source paths
//! - A differential synchronizer that merges a batch of parsed declarations,
//!   resolves type names through versioned imports, relinks dependents and
//!   rejects cyclic prototype and alias graphs
//! - Alias property resolution across chains of aliases
//! - Read queries over prototype chains and exported names

pub mod ids;
pub mod version;
pub mod traits;
pub mod synchronization;
pub mod storage;
pub mod synchronizer;
pub mod query;
pub mod project_storage;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use ids::{ModuleId, PropertyDeclarationId, SourceContextId, SourceId, TypeId};
pub use project_storage::ProjectStorage;
pub use synchronization::SynchronizationPackage;
pub use synchronizer::SynchronizationReport;
pub use traits::{PropertyDeclarationTraits, TypeTraits};
pub use version::Version;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Type name does not exist: {name} (referenced from source {source_id})")]
    TypeNameDoesNotExist { name: String, source_id: SourceId },

    #[error("Property name does not exist: {0}")]
    PropertyNameDoesNotExist(String),

    #[error("Module does not exist: {0}")]
    ModuleDoesNotExist(ModuleId),

    #[error("Prototype chain cycle")]
    PrototypeChainCycle,

    #[error("Alias chain cycle")]
    AliasChainCycle,

    #[error("Exported type cannot be inserted: {0}")]
    ExportedTypeCannotBeInserted(String),

    #[error("Type has invalid source id: {0}")]
    TypeHasInvalidSourceId(String),

    #[error("File status has invalid source id")]
    FileStatusHasInvalidSourceId,

    #[error("Project data has invalid source id")]
    ProjectDataHasInvalidSourceId,

    #[error("Project data has invalid project source id")]
    ProjectDataHasInvalidProjectSourceId,

    #[error("Project data has invalid module id")]
    ProjectDataHasInvalidModuleId,

    #[error("Source context id does not exist: {0}")]
    SourceContextIdDoesNotExist(SourceContextId),

    #[error("Source id does not exist: {0}")]
    SourceIdDoesNotExist(SourceId),

    #[error("Constraint prevents modification: {0}")]
    ConstraintPreventsModification(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::ConstraintPreventsModification(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                )
            }
            _ => Error::Storage(error),
        }
    }
}
