//! In-memory run store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::report::{FailureReason, RunBundle};
use crate::schema::{Profile, RunId, TableId};

use super::{run_id_for, RunRecord, RunState, RunStore};

#[derive(Debug, Default)]
struct State {
    sequence: usize,
    runs: IndexMap<RunId, RunRecord>,
    bundles: HashMap<RunId, RunBundle>,
    latest: HashMap<TableId, RunId>,
}

impl State {
    fn open_run(&mut self, run_id: &RunId) -> Result<&mut RunRecord> {
        match self.runs.get_mut(run_id) {
            Some(record) if record.state == RunState::Open => Ok(record),
            _ => Err(ProbeError::UnknownRun(run_id.to_string())),
        }
    }
}

/// Run store held in process memory. Everything happens under one lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunStore for InMemoryStore {
    fn begin_run(&self, table_id: &TableId) -> Result<RunId> {
        let mut state = self.lock();
        state.sequence += 1;
        let run_id = run_id_for(state.sequence);
        state
            .runs
            .insert(run_id.clone(), RunRecord::open(run_id.clone(), table_id.clone()));
        debug!(run_id = %run_id, table_id = %table_id, "Run opened");
        Ok(run_id)
    }

    fn commit_run(&self, bundle: &RunBundle) -> Result<()> {
        let mut state = self.lock();
        let record = state.open_run(&bundle.run_id)?;
        if record.table_id != bundle.table_id {
            return Err(ProbeError::Commit {
                run_id: bundle.run_id.to_string(),
                message: format!(
                    "run belongs to table '{}', bundle names '{}'",
                    record.table_id, bundle.table_id
                ),
            });
        }
        record.state = RunState::Committed;
        record.finished_at = Some(Utc::now());

        state.bundles.insert(bundle.run_id.clone(), bundle.clone());
        state
            .latest
            .insert(bundle.table_id.clone(), bundle.run_id.clone());
        Ok(())
    }

    fn abort_run(&self, run_id: &RunId, reason: FailureReason, message: &str) -> Result<()> {
        let mut state = self.lock();
        let record = state.open_run(run_id)?;
        record.state = RunState::Aborted {
            reason,
            message: message.to_string(),
        };
        record.finished_at = Some(Utc::now());
        Ok(())
    }

    fn get_last_profile(&self, table_id: &TableId) -> Result<Option<Vec<Profile>>> {
        Ok(self.last_bundle(table_id)?.map(|bundle| bundle.profiles))
    }

    fn last_bundle(&self, table_id: &TableId) -> Result<Option<RunBundle>> {
        let state = self.lock();
        Ok(state
            .latest
            .get(table_id)
            .and_then(|run_id| state.bundles.get(run_id))
            .cloned())
    }

    fn list_runs(&self, table_id: &TableId) -> Result<Vec<RunRecord>> {
        let state = self.lock();
        Ok(state
            .runs
            .values()
            .filter(|r| &r.table_id == table_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(table_id: &TableId, run_id: &RunId) -> RunBundle {
        RunBundle {
            table_id: table_id.clone(),
            run_id: run_id.clone(),
            started_at: Utc::now(),
            profiles: Vec::new(),
            issues: Vec::new(),
            schema_changes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    #[test]
    fn test_run_ids_are_sequential() {
        let store = InMemoryStore::new();
        let table = TableId::from("tbl_a");
        assert_eq!(store.begin_run(&table).unwrap().as_str(), "run_000001");
        assert_eq!(store.begin_run(&table).unwrap().as_str(), "run_000002");
    }

    #[test]
    fn test_commit_and_read_back() {
        let store = InMemoryStore::new();
        let table = TableId::from("tbl_a");
        assert!(store.get_last_profile(&table).unwrap().is_none());

        let run = store.begin_run(&table).unwrap();
        store.commit_run(&bundle(&table, &run)).unwrap();

        let last = store.last_bundle(&table).unwrap().unwrap();
        assert_eq!(last.run_id, run);
        assert!(store.list_runs(&table).unwrap()[0].is_committed());
    }

    #[test]
    fn test_commit_requires_open_run() {
        let store = InMemoryStore::new();
        let table = TableId::from("tbl_a");

        let err = store
            .commit_run(&bundle(&table, &RunId::from("run_999999")))
            .unwrap_err();
        assert!(matches!(err, ProbeError::UnknownRun(_)));

        let run = store.begin_run(&table).unwrap();
        store.commit_run(&bundle(&table, &run)).unwrap();
        assert!(store.commit_run(&bundle(&table, &run)).is_err());
    }

    #[test]
    fn test_aborted_run_is_not_visible() {
        let store = InMemoryStore::new();
        let table = TableId::from("tbl_a");
        let run = store.begin_run(&table).unwrap();
        store
            .abort_run(&run, FailureReason::Timeout, "too slow")
            .unwrap();

        assert!(store.last_bundle(&table).unwrap().is_none());
        assert!(store.commit_run(&bundle(&table, &run)).is_err());
        let runs = store.list_runs(&table).unwrap();
        assert_eq!(
            runs[0].state,
            RunState::Aborted {
                reason: FailureReason::Timeout,
                message: "too slow".to_string()
            }
        );
    }

    #[test]
    fn test_commit_rejects_foreign_table() {
        let store = InMemoryStore::new();
        let run = store.begin_run(&TableId::from("tbl_a")).unwrap();
        let err = store
            .commit_run(&bundle(&TableId::from("tbl_b"), &run))
            .unwrap_err();
        assert!(matches!(err, ProbeError::Commit { .. }));
        assert!(store.last_bundle(&TableId::from("tbl_b")).unwrap().is_none());
    }
}
