//! Lineage & drift: column dependency graph and schema diffs between runs.

mod drift;
mod graph;

pub use drift::{ChangeKind, DriftDetector, SchemaChange};
pub use graph::{
    ColumnRef, EdgeSpec, LineageEdge, LineageGraph, LineageHop, LineageRun, LineageRunStatus,
    LineageSnapshot, RunMetadata, TransformType,
};
