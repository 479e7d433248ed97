//! Numeric identifiers
//!
//! Every key the catalog hands out is a small integer wrapped in its own
//! newtype so a `TypeId` can never be passed where a `ModuleId` is expected.
//! The value `0` is the null id; rows always get positive ids from SQLite.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The null id
            pub const fn null() -> Self {
                Self(0)
            }

            pub fn is_valid(self) -> bool {
                self.0 > 0
            }

            pub fn raw(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

define_id!(
    /// A source file (directory + file name)
    SourceId
);
define_id!(
    /// A directory holding source files
    SourceContextId
);
define_id!(
    /// A module name such as `QtQuick`
    ModuleId
);
define_id!(
    /// A type declared by name in one source file
    TypeId
);
define_id!(PropertyDeclarationId);
define_id!(ImportedTypeNameId);
define_id!(ExportedTypeId);
