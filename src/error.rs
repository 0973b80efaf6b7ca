use thiserror::Error;

use crate::state_machine::{JobId, JobState};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job '{0}' is already running")]
    AlreadyRunning(JobId),

    #[error("No process to stop. Is job '{0}' running?")]
    NotRunning(JobId),

    #[error("Job '{0}' is running. Stop it before deleting it.")]
    StillRunning(JobId),

    #[error("Job '{id}' cannot move from {current} to {target}")]
    Conflict {
        id: JobId,
        current: JobState,
        target: JobState,
    },

    #[error("Failed to spawn process for job '{id}': {source}")]
    Spawn {
        id: JobId,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// HTTP status an API layer should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            JobError::InvalidConfig(_) => 422,
            JobError::NotFound(_) => 404,
            JobError::AlreadyRunning(_)
            | JobError::NotRunning(_)
            | JobError::StillRunning(_)
            | JobError::Conflict { .. } => 409,
            JobError::Spawn { .. } | JobError::Io(_) => 500,
        }
    }
}

pub type Result<T, E = JobError> = std::result::Result<T, E>;
