//! Column-level lineage graph.
//!
//! Edges may form cycles; traversal is breadth-first over an adjacency map
//! with an explicit visited set. Writers are serialized behind a `RwLock`
//! and replace the adjacency copy-on-write, so readers traverse an `Arc`
//! snapshot without holding the lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProbeError, Result};

/// A column of a table, as a lineage node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Parse `table.column`. The column is everything after the first dot.
    pub fn parse(qualified: &str) -> Result<Self> {
        match qualified.split_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                Ok(Self::new(table, column))
            }
            _ => Err(ProbeError::Input(format!(
                "expected 'table.column', got '{}'",
                qualified
            ))),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// How a target column is produced from its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    /// Copied as-is.
    Direct,
    /// Computed from the source.
    Derived,
    /// Aggregated from many source rows.
    Aggregated,
    /// Any other user-declared relationship.
    Custom(String),
}

impl Default for TransformType {
    fn default() -> Self {
        TransformType::Direct
    }
}

/// A directed dependency between two columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub id: String,
    pub source: ColumnRef,
    pub target: ColumnRef,
    pub transform_type: TransformType,
    /// Free-text description of the transformation (SQL, expression, note).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transformation_logic: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An edge to insert, with optional transformation text.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub source: ColumnRef,
    pub target: ColumnRef,
    pub transform_type: TransformType,
    pub transformation_logic: Option<String>,
}

impl EdgeSpec {
    pub fn new(source: ColumnRef, target: ColumnRef, transform_type: TransformType) -> Self {
        Self {
            source,
            target,
            transform_type,
            transformation_logic: None,
        }
    }

    /// Set the transformation text.
    pub fn with_logic(mut self, logic: impl Into<String>) -> Self {
        self.transformation_logic = Some(logic.into());
        self
    }
}

/// Outcome of the pipeline run a batch of edges came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageRunStatus {
    #[default]
    Success,
    Failed,
    Partial,
}

/// Pipeline metadata attached to a recorded batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetadata {
    pub source_table: Option<String>,
    pub target_table: Option<String>,
    pub row_count_source: Option<usize>,
    pub row_count_target: Option<usize>,
    pub status: LineageRunStatus,
}

impl RunMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source and target tables.
    pub fn with_tables(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_table = Some(source.into());
        self.target_table = Some(target.into());
        self
    }

    /// Set the row counts on both sides.
    pub fn with_row_counts(mut self, source: usize, target: usize) -> Self {
        self.row_count_source = Some(source);
        self.row_count_target = Some(target);
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: LineageRunStatus) -> Self {
        self.status = status;
        self
    }
}

/// A batch of edges declared or discovered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRun {
    pub id: String,
    pub edge_ids: Vec<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub row_count_source: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub row_count_target: Option<usize>,
    #[serde(default)]
    pub status: LineageRunStatus,
}

/// A node reached during traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageHop {
    pub column: ColumnRef,
    /// Number of edges from the start node.
    pub depth: usize,
    /// Transform of the edge that discovered this node.
    pub transform_type: TransformType,
    pub edge_id: String,
}

/// Serializable form of the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageSnapshot {
    pub edges: Vec<LineageEdge>,
    pub runs: Vec<LineageRun>,
}

#[derive(Debug, Clone, Default)]
struct Adjacency {
    edges: IndexMap<String, LineageEdge>,
    by_pair: HashMap<(ColumnRef, ColumnRef), String>,
    outgoing: HashMap<ColumnRef, Vec<String>>,
    incoming: HashMap<ColumnRef, Vec<String>>,
    runs: Vec<LineageRun>,
}

impl Adjacency {
    /// Insert an edge, or return the id of the existing edge for the pair.
    fn insert(&mut self, spec: EdgeSpec, at: DateTime<Utc>) -> String {
        let pair = (spec.source.clone(), spec.target.clone());
        if let Some(id) = self.by_pair.get(&pair) {
            return id.clone();
        }

        let mut seq = self.edges.len() + 1;
        let mut id = format!("edge_{:06}", seq);
        while self.edges.contains_key(&id) {
            seq += 1;
            id = format!("edge_{:06}", seq);
        }
        self.outgoing
            .entry(spec.source.clone())
            .or_default()
            .push(id.clone());
        self.incoming
            .entry(spec.target.clone())
            .or_default()
            .push(id.clone());
        self.by_pair.insert(pair, id.clone());
        self.edges.insert(
            id.clone(),
            LineageEdge {
                id: id.clone(),
                source: spec.source,
                target: spec.target,
                transform_type: spec.transform_type,
                transformation_logic: spec.transformation_logic,
                created_at: at,
            },
        );
        id
    }

    fn traverse(
        &self,
        start: &ColumnRef,
        max_depth: Option<usize>,
        forward: bool,
    ) -> Vec<LineageHop> {
        let index = if forward { &self.outgoing } else { &self.incoming };

        let mut visited: HashSet<&ColumnRef> = HashSet::new();
        visited.insert(start);
        let mut queue: VecDeque<(&ColumnRef, usize)> = VecDeque::new();
        queue.push_back((start, 0));
        let mut hops = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let Some(edge_ids) = index.get(node) else {
                continue;
            };
            for edge_id in edge_ids {
                let Some(edge) = self.edges.get(edge_id) else {
                    continue;
                };
                let next = if forward { &edge.target } else { &edge.source };
                if visited.insert(next) {
                    hops.push(LineageHop {
                        column: next.clone(),
                        depth: depth + 1,
                        transform_type: edge.transform_type.clone(),
                        edge_id: edge.id.clone(),
                    });
                    queue.push_back((next, depth + 1));
                }
            }
        }

        hops
    }
}

/// Column-level lineage graph, safe to share across threads.
#[derive(Debug, Default)]
pub struct LineageGraph {
    inner: RwLock<Arc<Adjacency>>,
}

impl LineageGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from a snapshot.
    pub fn from_snapshot(snapshot: LineageSnapshot) -> Self {
        let mut adjacency = Adjacency::default();
        for edge in snapshot.edges {
            let pair = (edge.source.clone(), edge.target.clone());
            if adjacency.by_pair.contains_key(&pair) || adjacency.edges.contains_key(&edge.id) {
                continue;
            }
            adjacency
                .outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(edge.id.clone());
            adjacency
                .incoming
                .entry(edge.target.clone())
                .or_default()
                .push(edge.id.clone());
            adjacency.by_pair.insert(pair, edge.id.clone());
            adjacency.edges.insert(edge.id.clone(), edge);
        }
        adjacency.runs = snapshot.runs;
        Self {
            inner: RwLock::new(Arc::new(adjacency)),
        }
    }

    /// Serializable copy of all edges and runs.
    pub fn snapshot(&self) -> LineageSnapshot {
        let adjacency = self.read();
        LineageSnapshot {
            edges: adjacency.edges.values().cloned().collect(),
            runs: adjacency.runs.clone(),
        }
    }

    /// Add an edge. Re-adding an existing (source, target) pair returns the
    /// existing edge unchanged.
    pub fn add_edge(
        &self,
        source: ColumnRef,
        target: ColumnRef,
        transform_type: TransformType,
    ) -> LineageEdge {
        self.add(EdgeSpec::new(source, target, transform_type))
    }

    /// Add an edge from an `EdgeSpec`.
    pub fn add(&self, spec: EdgeSpec) -> LineageEdge {
        let now = Utc::now();
        self.write(|adjacency| {
            let id = adjacency.insert(spec, now);
            adjacency.edges[&id].clone()
        })
    }

    /// Insert a batch of edges and record them as one run.
    pub fn record_run(&self, edges: Vec<EdgeSpec>, metadata: RunMetadata) -> LineageRun {
        let now = Utc::now();
        let run = self.write(|adjacency| {
            let mut edge_ids = Vec::with_capacity(edges.len());
            for spec in edges {
                let id = adjacency.insert(spec, now);
                if !edge_ids.contains(&id) {
                    edge_ids.push(id);
                }
            }
            let run = LineageRun {
                id: format!("lineage_run_{:06}", adjacency.runs.len() + 1),
                edge_ids,
                recorded_at: now,
                source_table: metadata.source_table,
                target_table: metadata.target_table,
                row_count_source: metadata.row_count_source,
                row_count_target: metadata.row_count_target,
                status: metadata.status,
            };
            adjacency.runs.push(run.clone());
            run
        });
        debug!(run_id = %run.id, edges = run.edge_ids.len(), "Recorded lineage run");
        run
    }

    /// Columns that feed into `column`, nearest first.
    pub fn upstream(&self, column: &ColumnRef, depth: Option<usize>) -> Vec<LineageHop> {
        self.read().traverse(column, depth, false)
    }

    /// Columns fed by `column`, nearest first.
    pub fn downstream(&self, column: &ColumnRef, depth: Option<usize>) -> Vec<LineageHop> {
        self.read().traverse(column, depth, true)
    }

    /// Edges touching a table on either side, in insertion order.
    pub fn list_edges(&self, table: &str) -> Vec<LineageEdge> {
        self.read()
            .edges
            .values()
            .filter(|e| e.source.table == table || e.target.table == table)
            .cloned()
            .collect()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> Vec<LineageEdge> {
        self.read().edges.values().cloned().collect()
    }

    /// All recorded runs.
    pub fn runs(&self) -> Vec<LineageRun> {
        self.read().runs.clone()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    fn read(&self) -> Arc<Adjacency> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write<T>(&self, f: impl FnOnce(&mut Adjacency) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Clones only while a reader still holds the previous snapshot
        f(Arc::make_mut(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(qualified: &str) -> ColumnRef {
        ColumnRef::parse(qualified).unwrap()
    }

    fn names(hops: &[LineageHop]) -> Vec<String> {
        hops.iter().map(|h| h.column.to_string()).collect()
    }

    #[test]
    fn test_cycle_is_traversed_once() {
        let graph = LineageGraph::new();
        graph.add_edge(col("t.a"), col("t.b"), TransformType::Direct);
        graph.add_edge(col("t.b"), col("t.c"), TransformType::Derived);
        graph.add_edge(col("t.c"), col("t.a"), TransformType::Direct);

        let down = graph.downstream(&col("t.a"), None);
        assert_eq!(names(&down), vec!["t.b", "t.c"]);
        assert_eq!(down[1].depth, 2);
        assert_eq!(down[1].transform_type, TransformType::Derived);

        let up = graph.upstream(&col("t.a"), None);
        assert_eq!(names(&up), vec!["t.c", "t.b"]);
    }

    #[test]
    fn test_breadth_first_with_depth_limit() {
        let graph = LineageGraph::new();
        graph.add_edge(col("raw.id"), col("stage.id"), TransformType::Direct);
        graph.add_edge(col("raw.id"), col("stage.key"), TransformType::Derived);
        graph.add_edge(col("stage.id"), col("mart.id"), TransformType::Aggregated);

        let all = graph.downstream(&col("raw.id"), None);
        assert_eq!(names(&all), vec!["stage.id", "stage.key", "mart.id"]);

        let near = graph.downstream(&col("raw.id"), Some(1));
        assert_eq!(names(&near), vec!["stage.id", "stage.key"]);

        assert!(graph.downstream(&col("raw.id"), Some(0)).is_empty());
        assert!(graph.downstream(&col("nowhere.x"), None).is_empty());
    }

    #[test]
    fn test_re_adding_edge_returns_existing() {
        let graph = LineageGraph::new();
        let first = graph.add_edge(col("a.x"), col("b.x"), TransformType::Direct);
        let second = graph.add_edge(col("a.x"), col("b.x"), TransformType::Derived);
        assert_eq!(first, second);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_record_run_and_list_edges() {
        let graph = LineageGraph::new();
        let run = graph.record_run(
            vec![
                EdgeSpec::new(col("orders.total"), col("revenue.sum"), TransformType::Aggregated)
                    .with_logic("SUM(total)"),
                EdgeSpec::new(col("orders.id"), col("audit.order_id"), TransformType::Direct),
            ],
            RunMetadata::new()
                .with_tables("orders", "revenue")
                .with_row_counts(100, 1),
        );
        assert_eq!(run.edge_ids.len(), 2);
        assert_eq!(run.row_count_source, Some(100));
        assert_eq!(graph.runs().len(), 1);

        assert_eq!(graph.list_edges("orders").len(), 2);
        let revenue = graph.list_edges("revenue");
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue[0].transformation_logic.as_deref(), Some("SUM(total)"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let graph = LineageGraph::new();
        graph.add_edge(col("a.x"), col("b.y"), TransformType::Custom("lookup".to_string()));
        graph.record_run(
            vec![EdgeSpec::new(col("b.y"), col("c.z"), TransformType::Direct)],
            RunMetadata::new().with_status(LineageRunStatus::Partial),
        );

        let json = serde_json::to_string(&graph.snapshot()).unwrap();
        let restored = LineageGraph::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.edges(), graph.edges());
        assert_eq!(restored.runs(), graph.runs());
        assert_eq!(names(&restored.downstream(&col("a.x"), None)), vec!["b.y", "c.z"]);
    }

    #[test]
    fn test_reader_snapshot_is_stable() {
        let graph = LineageGraph::new();
        graph.add_edge(col("a.x"), col("b.x"), TransformType::Direct);
        let before = graph.read();
        graph.add_edge(col("b.x"), col("c.x"), TransformType::Direct);
        assert_eq!(before.edges.len(), 1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_parse_column_ref() {
        assert_eq!(col("db.table"), ColumnRef::new("db", "table"));
        assert!(ColumnRef::parse("nodot").is_err());
        assert!(ColumnRef::parse(".x").is_err());
    }
}
