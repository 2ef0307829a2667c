//! Schema types: registered tables, column profiles and identifiers.

mod profile;
mod table;
mod types;

pub use profile::{NumericStatistics, OutlierBounds, Profile, TextStatistics};
pub use table::{table_id_for, ColumnInfo, TableInfo};
pub use types::{ColumnType, RunId, TableId};
