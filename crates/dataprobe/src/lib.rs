//! dataprobe: profiling, data-quality detection, drift and lineage tracking
//! for tabular datasets.
//!
//! Rows arrive already normalized as a [`DataTable`]. A [`Probe`] profiles
//! each column, runs the quality detectors, diffs the result against the
//! previous committed run and proposes SQL fixes. The whole result is
//! committed to a [`RunStore`] in one step.
//!
//! # Core Principles
//!
//! - **Deterministic**: same rows and config give the same profiles and issues
//! - **Non-destructive**: fixes are proposals, never executed
//! - **All or nothing**: a run is either fully stored or not at all
//!
//! # Example
//!
//! ```no_run
//! use dataprobe::{DataTable, Probe};
//!
//! # fn load() -> DataTable { unimplemented!() }
//! let probe = Probe::new();
//! let table_id = probe.register_table("orders", "warehouse/orders.csv");
//!
//! let report = probe.profile_table(&table_id, &load()).unwrap();
//! for issue in &report.bundle.issues {
//!     println!("{:?} {}: {}", issue.column, issue.issue_type, issue.description);
//! }
//! println!("Quality score: {:.2}", report.summary.data_quality_score);
//! ```

pub mod config;
pub mod error;
pub mod inference;
pub mod input;
pub mod lineage;
pub mod logging;
pub mod report;
pub mod schema;
pub mod store;
pub mod suggestion;
pub mod validation;

mod probe;

pub use crate::probe::Probe;
pub use config::{ProbeConfig, SeverityBands};
pub use error::{ProbeError, Result};
pub use input::{DataTable, Value};
pub use lineage::{ColumnRef, LineageGraph, SchemaChange, TransformType};
pub use report::{FailureReason, RunBundle, RunReport, RunStatus, RunSummary};
pub use schema::{ColumnType, Profile, RunId, TableId, TableInfo};
pub use store::{InMemoryStore, JsonStore, RunStore};
pub use suggestion::{generate_fix, generate_fixes, FixSuggestion};
pub use validation::{Issue, IssueType, Severity};
