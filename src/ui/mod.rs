//! Terminal output for the `qmlcatalog` binary

pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{chain_entry, error, header, info, section, success, summary_row, warn};
pub use progress::Spinner;
pub use table::{PropertyRow, TableBuilder, TypeRow, properties_table, types_table};
pub use theme::{Theme, theme};
