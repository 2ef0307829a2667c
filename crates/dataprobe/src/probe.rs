//! Run coordinator and public entry point.

use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::inference::StatisticalAnalyzer;
use crate::input::DataTable;
use crate::lineage::{DriftDetector, LineageGraph};
use crate::report::{FailureReason, RunBundle, RunReport, RunStatus};
use crate::schema::{Profile, RunId, TableId, TableInfo};
use crate::store::{InMemoryStore, RunStore};
use crate::suggestion::FixMapper;
use crate::validation::{merge_issues, panic_message, DetectionContext, DetectorSet, Issue};

/// Profiles registered tables and records the results.
///
/// # Example
///
/// ```
/// use dataprobe::{DataTable, Probe, Value};
///
/// let probe = Probe::new();
/// let table_id = probe.register_table("orders", "orders.csv");
///
/// let data = DataTable::new(
///     vec!["id".into(), "amount".into()],
///     vec![
///         vec![Value::Number(1.0), Value::Number(9.5)],
///         vec![Value::Number(2.0), Value::Null],
///     ],
/// )?;
///
/// let report = probe.profile_table(&table_id, &data)?;
/// assert!(report.is_committed());
/// assert_eq!(report.bundle.profiles.len(), 2);
/// # Ok::<(), dataprobe::ProbeError>(())
/// ```
pub struct Probe {
    config: ProbeConfig,
    analyzer: StatisticalAnalyzer,
    detectors: DetectorSet,
    drift: DriftDetector,
    store: Arc<dyn RunStore>,
    lineage: LineageGraph,
    tables: RwLock<IndexMap<TableId, TableInfo>>,
}

impl Probe {
    /// Create a probe with default configuration and an in-memory store.
    pub fn new() -> Self {
        Self::build(ProbeConfig::default())
    }

    /// Create a probe with a custom configuration.
    pub fn with_config(config: ProbeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ProbeConfig) -> Self {
        Self {
            analyzer: StatisticalAnalyzer::new(&config),
            detectors: DetectorSet::new(),
            drift: DriftDetector::new(config.cardinality_drift_delta),
            store: Arc::new(InMemoryStore::new()),
            lineage: LineageGraph::new(),
            tables: RwLock::new(IndexMap::new()),
            config,
        }
    }

    /// Persist runs through `store`.
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the detector set.
    pub fn with_detectors(mut self, detectors: DetectorSet) -> Self {
        self.detectors = detectors;
        self
    }

    /// Start from an existing lineage graph.
    pub fn with_lineage(mut self, lineage: LineageGraph) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Column lineage shared by all tables.
    pub fn lineage(&self) -> &LineageGraph {
        &self.lineage
    }

    /// Register a dataset. Registering the same name again returns the
    /// existing id.
    pub fn register_table(&self, name: impl Into<String>, source: impl Into<String>) -> TableId {
        let info = TableInfo::new(name, source);
        let id = info.id.clone();
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if !tables.contains_key(&id) {
            info!(table = %info.name, table_id = %id, "Registered table");
            tables.insert(id.clone(), info);
        }
        id
    }

    /// Get a registered table.
    pub fn table(&self, table_id: &TableId) -> Option<TableInfo> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table_id)
            .cloned()
    }

    /// All registered tables in registration order.
    pub fn tables(&self) -> Vec<TableInfo> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Run one profiling pass over `data` and commit it.
    ///
    /// Returns `Err` only when nothing was started (unknown table, store
    /// unable to open a run). Once a run is open, failures are reported as a
    /// `RunReport` with a failed status and nothing of the run is stored.
    #[instrument(skip(self, data), fields(rows = data.row_count(), columns = data.column_count()))]
    pub fn profile_table(&self, table_id: &TableId, data: &DataTable) -> Result<RunReport> {
        let table_name = self
            .table(table_id)
            .map(|t| t.name)
            .ok_or_else(|| ProbeError::UnknownTable(table_id.to_string()))?;

        let clock = Instant::now();
        let started_at = Utc::now();
        let run_id = self.store.begin_run(table_id)?;
        info!(run_id = %run_id, table = %table_name, "Run started");

        let ctx = DetectionContext {
            config: &self.config,
            dates: self.analyzer.dates(),
            table_id,
            run_id: &run_id,
            detected_at: started_at,
        };

        let mut bundle = RunBundle {
            table_id: table_id.clone(),
            run_id: run_id.clone(),
            started_at,
            profiles: Vec::new(),
            issues: Vec::new(),
            schema_changes: Vec::new(),
            fixes: Vec::new(),
        };

        let columns = match self.profile_columns(data, &ctx) {
            Ok(columns) => columns,
            Err(message) => {
                return Ok(self.fail(bundle, FailureReason::ProfilingFailed, message));
            }
        };

        let mut issues = Vec::new();
        for (profile, column_issues) in columns {
            bundle.profiles.push(profile);
            issues.extend(column_issues);
        }
        issues.extend(self.detectors.detect_table(data, &ctx));
        bundle.issues = merge_issues(issues);

        if let Some(message) = self.deadline_exceeded(clock) {
            return Ok(self.fail(bundle, FailureReason::Timeout, message));
        }

        let previous = match self.store.get_last_profile(table_id) {
            Ok(previous) => previous,
            Err(e) => {
                return Ok(self.fail(bundle, FailureReason::ProfilingFailed, e.to_string()));
            }
        };
        if let Some(previous) = previous {
            bundle.schema_changes =
                self.drift
                    .diff(table_id, &run_id, started_at, &previous, &bundle.profiles);
        }

        bundle.fixes = FixMapper::new()
            .with_table_name(table_name.as_str())
            .generate_fixes(&bundle.issues);

        if let Some(message) = self.deadline_exceeded(clock) {
            return Ok(self.fail(bundle, FailureReason::Timeout, message));
        }

        if let Err(e) = self.store.commit_run(&bundle) {
            return Ok(self.fail(bundle, FailureReason::CommitFailed, e.to_string()));
        }

        self.mark_profiled(table_id, &bundle.profiles, started_at);

        let report = RunReport::new(RunStatus::Committed, bundle);
        info!(
            run_id = %run_id,
            issues = report.summary.total_issues,
            schema_changes = report.summary.schema_changes,
            score = report.summary.data_quality_score,
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "Run committed"
        );
        Ok(report)
    }

    /// Profile and check every column on scoped worker threads.
    ///
    /// Columns are split into contiguous chunks, one per worker; results come
    /// back in column order.
    fn profile_columns(
        &self,
        data: &DataTable,
        ctx: &DetectionContext<'_>,
    ) -> std::result::Result<Vec<(Profile, Vec<Issue>)>, String> {
        let indices: Vec<usize> = (0..data.column_count()).collect();
        let workers = self.config.workers.clamp(1, indices.len().max(1));
        let chunk_size = indices.len().div_ceil(workers).max(1);
        debug!(workers, chunk_size, "Profiling columns");

        let analyzer = &self.analyzer;
        let detectors = &self.detectors;

        thread::scope(|scope| -> std::result::Result<Vec<_>, String> {
            let handles: Vec<_> = indices
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|&index| {
                                let values = data.column_values(index);
                                let profile = analyzer.profile_column(
                                    &data.headers[index],
                                    index,
                                    values,
                                    ctx.run_id,
                                    ctx.detected_at,
                                );
                                let issues = detectors.detect_column(&profile, values, ctx);
                                (profile, issues)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut results = Vec::with_capacity(indices.len());
            for handle in handles {
                let part = handle
                    .join()
                    .map_err(|payload| format!("column worker {}", panic_message(payload)))?;
                results.extend(part);
            }
            Ok(results)
        })
    }

    fn deadline_exceeded(&self, clock: Instant) -> Option<String> {
        let limit = self.config.run_timeout?;
        let elapsed = clock.elapsed();
        (elapsed > limit).then(|| format!("run took {:?}, limit is {:?}", elapsed, limit))
    }

    /// Abort the open run and report it as failed.
    fn fail(&self, bundle: RunBundle, reason: FailureReason, message: String) -> RunReport {
        warn!(
            run_id = %bundle.run_id,
            reason = reason.as_str(),
            error = %message,
            "Run failed"
        );
        if let Err(e) = self.store.abort_run(&bundle.run_id, reason, &message) {
            warn!(run_id = %bundle.run_id, error = %e, "Failed to record aborted run");
        }
        RunReport::new(RunStatus::Failed { reason, message }, bundle)
    }

    fn mark_profiled(&self, table_id: &TableId, profiles: &[Profile], at: DateTime<Utc>) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = tables.get_mut(table_id) {
            info.mark_profiled(profiles, at);
        }
    }

    /// Most recent committed bundle of a table.
    pub fn last_run(&self, table_id: &TableId) -> Result<Option<RunBundle>> {
        self.store.last_bundle(table_id)
    }

    /// Profiles of the most recent committed run of a table.
    pub fn last_profiles(&self, table_id: &TableId) -> Result<Option<Vec<Profile>>> {
        self.store.get_last_profile(table_id)
    }

    /// Check whether a run id belongs to a committed run of a table.
    pub fn is_committed(&self, table_id: &TableId, run_id: &RunId) -> Result<bool> {
        Ok(self
            .store
            .list_runs(table_id)?
            .iter()
            .any(|r| &r.run_id == run_id && r.is_committed()))
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self::new()
    }
}
