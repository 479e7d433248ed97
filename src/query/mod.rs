pub mod common_types;
pub mod engine;

pub use common_types::{BuiltinType, CommonType, CommonTypeCache, WellKnownType};
pub use engine::{CatalogStats, PropertyDeclarationInfo, QueryEngine, TypeInfo};
