use std::fmt;

use serde::{Deserialize, Serialize};

/// The five states of a transformation job.
///
/// A job flows CREATED → RUNNING → {COMPLETED | FAILED | STOPPED}.
/// `Created`, `Running` and `Stopped` can be requested by a caller;
/// `Completed` and `Failed` are only ever reached by the process exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    /// `Completed` and `Failed` admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Created => write!(f, "CREATED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// The action a caller-requested state change resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Spawn the job's process.
    Start,
    /// Terminate the job's process.
    Stop,
}

/// Policy table for caller-requested state changes.
pub struct StateMachine;

impl StateMachine {
    /// Resolve a requested `target` against the currently observed state.
    ///
    /// Only two pairs are legal:
    /// - `(Created, Running)` starts the job;
    /// - `(Running, Stopped)` stops it.
    ///
    /// Every other pair is a conflict and yields `None`.
    pub fn resolve(current: JobState, target: JobState) -> Option<Transition> {
        match (current, target) {
            (JobState::Created, JobState::Running) => Some(Transition::Start),
            (JobState::Running, JobState::Stopped) => Some(Transition::Stop),
            _ => None,
        }
    }
}
