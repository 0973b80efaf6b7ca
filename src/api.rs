//! Request and response bodies exchanged with an HTTP layer.
//!
//! These mirror the transformation resource of the marketplace API: a job is
//! created from a `parameters` object, read back as `{id, parameters, state}`
//! and updated by requesting a new `state`.

use serde::{Deserialize, Serialize};

use crate::state_machine::{Job, JobId, JobState};

fn default_new_state() -> JobState {
    JobState::Created
}

/// Body of a create request. `state` may be `CREATED` (default) or `RUNNING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub parameters: serde_json::Value,
    #[serde(default = "default_new_state")]
    pub state: JobState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCreated {
    pub id: JobId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub parameters: serde_json::Value,
    pub state: JobState,
}

impl JobView {
    /// Snapshot of a job. Polls the process, so it needs the job mutably.
    pub fn observe(job: &mut Job) -> Self {
        let state = job.poll_state();
        Self {
            id: job.id(),
            parameters: job.config().to_parameters(),
            state,
        }
    }
}

/// Body of an update request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub state: JobState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobStateView {
    pub id: JobId,
    pub state: JobState,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobList {
    pub items: Vec<JobView>,
}
