//! Run store backed by a directory of JSON documents.
//!
//! ```text
//! store/
//! ├── index.json              # run records and the latest run per table
//! └── runs/
//!     └── run_000001.json     # one committed bundle
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place. The
//! index is written last, so a bundle only becomes visible once the index
//! names it.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ProbeError, Result};
use crate::report::{FailureReason, RunBundle};
use crate::schema::{Profile, RunId, TableId};

use super::{run_id_for, RunRecord, RunState, RunStore};

const INDEX_FILE: &str = "index.json";
const RUNS_DIR: &str = "runs";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Index {
    sequence: usize,
    runs: Vec<RunRecord>,
    latest: IndexMap<TableId, RunId>,
}

impl Index {
    fn open_run(&mut self, run_id: &RunId) -> Result<&mut RunRecord> {
        self.runs
            .iter_mut()
            .find(|r| &r.run_id == run_id && r.state == RunState::Open)
            .ok_or_else(|| ProbeError::UnknownRun(run_id.to_string()))
    }
}

/// Run store persisted as JSON files under a directory.
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    index: Mutex<Index>,
}

impl JsonStore {
    /// Open a store at `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        let runs = root.join(RUNS_DIR);
        fs::create_dir_all(&runs).map_err(|e| {
            ProbeError::Persistence(format!(
                "Failed to create directory '{}': {}",
                runs.display(),
                e
            ))
        })?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            read_json(&index_path)?
        } else {
            Index::default()
        };

        debug!(path = %root.display(), runs = index.runs.len(), "Opened JSON run store");
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    /// Directory holding the store.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn bundle_path(&self, run_id: &RunId) -> PathBuf {
        self.root.join(RUNS_DIR).join(format!("{}.json", run_id))
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to a copy of the index, persist it, then publish it.
    fn update_index<T>(&self, f: impl FnOnce(&mut Index) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_json(&self.root.join(INDEX_FILE), &next)?;
        *guard = next;
        Ok(out)
    }
}

impl RunStore for JsonStore {
    fn begin_run(&self, table_id: &TableId) -> Result<RunId> {
        self.update_index(|index| {
            index.sequence += 1;
            let run_id = run_id_for(index.sequence);
            index
                .runs
                .push(RunRecord::open(run_id.clone(), table_id.clone()));
            Ok(run_id)
        })
    }

    #[instrument(skip(self, bundle), fields(run_id = %bundle.run_id))]
    fn commit_run(&self, bundle: &RunBundle) -> Result<()> {
        let commit_error = |message: String| ProbeError::Commit {
            run_id: bundle.run_id.to_string(),
            message,
        };

        self.update_index(|index| {
            let record = index.open_run(&bundle.run_id)?;
            if record.table_id != bundle.table_id {
                return Err(commit_error(format!(
                    "run belongs to table '{}', bundle names '{}'",
                    record.table_id, bundle.table_id
                )));
            }
            record.state = RunState::Committed;
            record.finished_at = Some(Utc::now());
            index
                .latest
                .insert(bundle.table_id.clone(), bundle.run_id.clone());

            // Bundle first: it stays invisible until the index names it.
            write_json(&self.bundle_path(&bundle.run_id), bundle)
                .map_err(|e| commit_error(e.to_string()))
        })
        .map_err(|e| match e {
            ProbeError::Persistence(message) => commit_error(message),
            other => other,
        })?;

        debug!(profiles = bundle.profiles.len(), issues = bundle.issues.len(), "Run committed");
        Ok(())
    }

    fn abort_run(&self, run_id: &RunId, reason: FailureReason, message: &str) -> Result<()> {
        self.update_index(|index| {
            let record = index.open_run(run_id)?;
            record.state = RunState::Aborted {
                reason,
                message: message.to_string(),
            };
            record.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    fn get_last_profile(&self, table_id: &TableId) -> Result<Option<Vec<Profile>>> {
        Ok(self.last_bundle(table_id)?.map(|bundle| bundle.profiles))
    }

    fn last_bundle(&self, table_id: &TableId) -> Result<Option<RunBundle>> {
        let run_id = match self.lock().latest.get(table_id) {
            Some(run_id) => run_id.clone(),
            None => return Ok(None),
        };
        read_json(&self.bundle_path(&run_id)).map(Some)
    }

    fn list_runs(&self, table_id: &TableId) -> Result<Vec<RunRecord>> {
        Ok(self
            .lock()
            .runs
            .iter()
            .filter(|r| &r.table_id == table_id)
            .cloned()
            .collect())
    }
}

/// Write `value` as pretty JSON via a temporary file and a rename.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");

    let file = File::create(&tmp).map_err(|e| {
        ProbeError::Persistence(format!(
            "Failed to create file '{}': {}",
            tmp.display(),
            e
        ))
    })?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| {
        ProbeError::Persistence(format!("Failed to serialize '{}': {}", path.display(), e))
    })?;
    writer
        .flush()
        .and_then(|_| writer.get_ref().sync_all())
        .map_err(|e| {
            ProbeError::Persistence(format!("Failed to write '{}': {}", tmp.display(), e))
        })?;

    fs::rename(&tmp, path).map_err(|e| {
        ProbeError::Persistence(format!(
            "Failed to move '{}' into place: {}",
            path.display(),
            e
        ))
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        ProbeError::Persistence(format!(
            "Failed to open file '{}': {}",
            path.display(),
            e
        ))
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        ProbeError::Persistence(format!("Failed to parse '{}': {}", path.display(), e))
    })
}
