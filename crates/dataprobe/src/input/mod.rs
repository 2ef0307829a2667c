//! Normalized tabular input handed over by the ingestion collaborator.

mod source;
mod value;

pub use source::DataTable;
pub use value::Value;
