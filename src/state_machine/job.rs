use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::state::JobState;
use crate::error::{JobError, Result};
use crate::process::{ProcessHandle, ProcessSpawner, ProcessStatus};

/// Smallest accepted `input_value`.
pub const MIN_INPUT_VALUE: i64 = 5;

/// Directory under a job's workdir holding materialized configuration.
pub const INPUT_DIR: &str = "input";
/// Directory under a job's workdir the process writes into.
pub const OUTPUT_DIR: &str = "output";
/// Name of the rendered configuration file inside [`INPUT_DIR`].
pub const INPUT_FILE: &str = "inputFile.conf";

/// Unique identifier of a job (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Validated, immutable parameters of a transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobConfig {
    input_value: i64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameters {
    input_value: i64,
}

impl JobConfig {
    pub fn new(input_value: i64) -> Result<Self> {
        if input_value < MIN_INPUT_VALUE {
            return Err(JobError::InvalidConfig(format!(
                "input_value must be at least {MIN_INPUT_VALUE}, got {input_value}"
            )));
        }
        Ok(Self { input_value })
    }

    /// Validate a raw parameter object such as `{"input_value": 10}`.
    pub fn from_parameters(parameters: &serde_json::Value) -> Result<Self> {
        if !parameters.is_object() {
            return Err(JobError::InvalidConfig(
                "parameters must be an object".to_string(),
            ));
        }
        let raw = RawParameters::deserialize(parameters)
            .map_err(|e| JobError::InvalidConfig(e.to_string()))?;
        Self::new(raw.input_value)
    }

    pub fn input_value(&self) -> i64 {
        self.input_value
    }

    /// The configuration as the parameter object it was built from.
    pub fn to_parameters(&self) -> serde_json::Value {
        serde_json::json!({ "input_value": self.input_value })
    }

    /// Contents of `input/inputFile.conf`.
    pub fn render_input_file(&self) -> String {
        format!("# transformation input\ninput_value = {}\n", self.input_value)
    }
}

/// One transformation job and its execution lifecycle.
///
/// A job exclusively owns its working directory and, while running, the
/// handle of its process. Completion is never pushed: it is observed by
/// [`Job::poll_state`].
#[derive(Debug)]
pub struct Job {
    id: JobId,
    config: JobConfig,
    state: JobState,
    process: Option<Box<dyn ProcessHandle>>,
    workdir: PathBuf,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    retired: bool,
}

impl Job {
    /// Allocate an id, materialize `<jobs_dir>/<id>/input/` and return the
    /// job in `Created`. No process is started.
    pub async fn create(config: JobConfig, jobs_dir: &Path) -> Result<Self> {
        let id = JobId::new();
        let workdir = jobs_dir.join(id.to_string());

        fs::create_dir_all(jobs_dir).await?;
        // Fails if the directory exists: a workdir never belongs to two jobs.
        fs::create_dir(&workdir).await?;
        if let Err(e) = write_inputs(&workdir, &config).await {
            error!(job_id = %id, error = %e, "failed to materialize job inputs");
            if let Err(cleanup) = fs::remove_dir_all(&workdir).await {
                warn!(job_id = %id, error = %cleanup, "failed to remove partial job workdir");
            }
            return Err(e.into());
        }

        let now = Utc::now();
        info!(
            job_id = %id,
            input_value = config.input_value(),
            workdir = %workdir.display(),
            "job created"
        );
        Ok(Self {
            id,
            config,
            state: JobState::Created,
            process: None,
            workdir,
            created_at: now,
            updated_at: now,
            retired: false,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True once [`Job::delete`] has succeeded.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// The last recorded state, without polling the process.
    pub fn recorded_state(&self) -> JobState {
        self.state
    }

    /// Observe the job's state.
    ///
    /// While `Running`, this polls the process and, if it has exited,
    /// records `Completed` (exit code 0) or `Failed` (anything else) and
    /// releases the handle. A process that can no longer be polled is
    /// recorded as `Failed`. In every other state it is a plain read.
    pub fn poll_state(&mut self) -> JobState {
        if self.state != JobState::Running {
            return self.state;
        }
        let Some(process) = self.process.as_mut() else {
            return self.state;
        };
        match process.poll() {
            Ok(ProcessStatus::Running) => {}
            Ok(status) => self.settle(status),
            Err(e) => {
                error!(job_id = %self.id, error = %e, "failed to poll job process");
                self.process = None;
                self.set_state(JobState::Failed);
            }
        }
        self.state
    }

    /// Spawn `command` in the working directory and move to `Running`.
    ///
    /// Only a `Created` job can be started; a running one yields
    /// `AlreadyRunning`, a stopped or finished one a `Conflict`.
    pub async fn run(&mut self, spawner: &dyn ProcessSpawner, command: &[String]) -> Result<()> {
        self.ensure_live()?;
        match self.poll_state() {
            JobState::Created => {}
            JobState::Running => {
                warn!(job_id = %self.id, "job already in progress");
                return Err(JobError::AlreadyRunning(self.id));
            }
            current => {
                warn!(job_id = %self.id, %current, "job cannot be started again");
                return Err(JobError::Conflict {
                    id: self.id,
                    current,
                    target: JobState::Running,
                });
            }
        }

        fs::create_dir_all(self.workdir.join(OUTPUT_DIR)).await?;
        let process = spawner.spawn(command, &self.workdir).map_err(|source| {
            error!(job_id = %self.id, error = %source, "failed to spawn job process");
            JobError::Spawn {
                id: self.id,
                source,
            }
        })?;

        info!(job_id = %self.id, pid = ?process.pid(), "job started");
        self.process = Some(process);
        self.set_state(JobState::Running);
        Ok(())
    }

    /// Terminate the running process and move to `Stopped`.
    ///
    /// The process is polled first: if it had already exited, its natural
    /// outcome is recorded instead and `NotRunning` is returned.
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_live()?;
        let Some(mut process) = self.process.take() else {
            warn!(job_id = %self.id, state = %self.state, "no process to stop");
            return Err(JobError::NotRunning(self.id));
        };

        match process.poll() {
            Ok(ProcessStatus::Running) => {}
            Ok(status) => {
                self.settle(status);
                warn!(job_id = %self.id, state = %self.state, "process exited before stop");
                return Err(JobError::NotRunning(self.id));
            }
            Err(e) => warn!(job_id = %self.id, error = %e, "failed to poll job process before stop"),
        }

        if let Err(e) = process.terminate() {
            error!(job_id = %self.id, error = %e, "failed to terminate job process");
            self.process = Some(process);
            return Err(e.into());
        }

        self.set_state(JobState::Stopped);
        info!(job_id = %self.id, "job stopped");
        Ok(())
    }

    /// Remove the working directory. Refused while the job is running.
    pub async fn delete(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.poll_state() == JobState::Running {
            warn!(job_id = %self.id, "refusing to delete a running job");
            return Err(JobError::StillRunning(self.id));
        }

        match fs::remove_dir_all(&self.workdir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(job_id = %self.id, "job workdir already gone");
            }
            Err(e) => return Err(e.into()),
        }

        self.retired = true;
        info!(job_id = %self.id, "job and related files deleted");
        Ok(())
    }

    // A deleted job is gone even for callers still holding a reference to it.
    fn ensure_live(&self) -> Result<()> {
        if self.retired {
            warn!(job_id = %self.id, "job has been deleted");
            return Err(JobError::NotFound(self.id));
        }
        Ok(())
    }

    fn settle(&mut self, status: ProcessStatus) {
        self.process = None;
        if status.is_success() {
            self.set_state(JobState::Completed);
            info!(job_id = %self.id, "job completed");
        } else {
            self.set_state(JobState::Failed);
            error!(job_id = %self.id, exit = ?status, "job failed");
        }
    }

    fn set_state(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}

async fn write_inputs(workdir: &Path, config: &JobConfig) -> std::io::Result<()> {
    let input = workdir.join(INPUT_DIR);
    fs::create_dir_all(&input).await?;
    fs::write(input.join(INPUT_FILE), config.render_input_file()).await
}
