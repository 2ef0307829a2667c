//! Run persistence.
//!
//! A run is opened with [`RunStore::begin_run`] and then either committed as
//! one [`RunBundle`] or aborted. Readers only ever see committed bundles.

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::InMemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::report::{FailureReason, RunBundle};
use crate::schema::{Profile, RunId, TableId};

/// Lifecycle state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Opened, nothing stored yet.
    Open,
    Committed,
    Aborted {
        reason: FailureReason,
        message: String,
    },
}

/// Bookkeeping entry for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub table_id: TableId,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
}

impl RunRecord {
    fn open(run_id: RunId, table_id: TableId) -> Self {
        Self {
            run_id,
            table_id,
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::Open,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == RunState::Committed
    }
}

/// Persistence collaborator for profiling runs.
///
/// `commit_run` must be all-or-nothing: after an error, readers see the
/// store exactly as before the call.
pub trait RunStore: Send + Sync {
    /// Open a new run for a table and allocate its id.
    fn begin_run(&self, table_id: &TableId) -> Result<RunId>;

    /// Store a complete bundle for an open run.
    fn commit_run(&self, bundle: &RunBundle) -> Result<()>;

    /// Close an open run without storing anything.
    fn abort_run(&self, run_id: &RunId, reason: FailureReason, message: &str) -> Result<()>;

    /// Profiles of the most recent committed run of a table, if any.
    fn get_last_profile(&self, table_id: &TableId) -> Result<Option<Vec<Profile>>>;

    /// The most recent committed bundle of a table, if any.
    fn last_bundle(&self, table_id: &TableId) -> Result<Option<RunBundle>>;

    /// All runs of a table in the order they were opened.
    fn list_runs(&self, table_id: &TableId) -> Result<Vec<RunRecord>>;
}

/// Format the nth run id.
pub(crate) fn run_id_for(sequence: usize) -> RunId {
    RunId(format!("run_{:06}", sequence))
}
