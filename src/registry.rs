//! Concurrency-safe table of transformation jobs.
//!
//! [`JobRegistry`] is the only entry point an outer layer needs: it creates
//! jobs from raw parameters, routes lifecycle calls to them by id and
//! enforces the update policy of [`StateMachine`].
//!
//! Locking: the id table sits behind an `RwLock` that is only held for map
//! reads and writes; each job has its own `Mutex`, so slow work on one job
//! (spawning, removing its directory) never stalls another. A job lock may be
//! held while taking the table lock, never the reverse.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

use crate::api::{JobCreated, JobList, JobStateView, JobUpdate, JobView, NewJob};
use crate::config::EngineConfig;
use crate::error::{JobError, Result};
use crate::process::{ProcessSpawner, TokioSpawner};
use crate::state_machine::{Job, JobConfig, JobId, JobState, StateMachine, Transition};

/// Shared handle to a registered job.
pub type JobRef = Arc<Mutex<Job>>;

#[derive(Default)]
struct JobTable {
    jobs: HashMap<JobId, JobRef>,
    // Creation order, for listing.
    order: Vec<JobId>,
}

pub struct JobRegistry {
    jobs_dir: PathBuf,
    command: Vec<String>,
    spawner: Arc<dyn ProcessSpawner>,
    table: RwLock<JobTable>,
}

impl JobRegistry {
    pub fn new(config: &EngineConfig, spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self {
            jobs_dir: config.jobs_dir.clone(),
            command: config.command.clone(),
            spawner,
            table: RwLock::new(JobTable::default()),
        }
    }

    /// A registry spawning real processes.
    pub fn with_tokio(config: &EngineConfig) -> Self {
        Self::new(config, Arc::new(TokioSpawner))
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Validate `parameters`, create the job and register it.
    ///
    /// The job is visible to [`JobRegistry::get`] once this returns.
    pub async fn create(&self, parameters: &serde_json::Value) -> Result<JobId> {
        let config = JobConfig::from_parameters(parameters).inspect_err(|e| {
            warn!(error = %e, "rejected job configuration");
        })?;
        let job = Job::create(config, &self.jobs_dir).await?;
        let id = job.id();

        let mut table = self.table.write().await;
        table.jobs.insert(id, Arc::new(Mutex::new(job)));
        table.order.push(id);
        Ok(id)
    }

    /// Create a job directly in `initial`, which must be `Created` or `Running`.
    ///
    /// If starting the new job fails it is deleted again and the error returned.
    pub async fn create_with_state(
        &self,
        parameters: &serde_json::Value,
        initial: JobState,
    ) -> Result<JobId> {
        match initial {
            JobState::Created => self.create(parameters).await,
            JobState::Running => {
                let id = self.create(parameters).await?;
                if let Err(e) = self.run(id).await {
                    if let Err(cleanup) = self.delete(id).await {
                        warn!(job_id = %id, error = %cleanup, "failed to discard unstartable job");
                    }
                    return Err(e);
                }
                Ok(id)
            }
            other => Err(JobError::InvalidConfig(format!(
                "a new job must be CREATED or RUNNING, not {other}"
            ))),
        }
    }

    /// Handle a create request body.
    pub async fn submit(&self, request: &NewJob) -> Result<JobCreated> {
        let id = self
            .create_with_state(&request.parameters, request.state)
            .await?;
        Ok(JobCreated { id })
    }

    /// Look up a job by id.
    pub async fn get(&self, id: JobId) -> Result<JobRef> {
        let table = self.table.read().await;
        table.jobs.get(&id).cloned().ok_or_else(|| {
            warn!(job_id = %id, "job not found");
            JobError::NotFound(id)
        })
    }

    // Look up and lock a job, treating one deleted in the meantime as absent.
    async fn lock(&self, id: JobId) -> Result<OwnedMutexGuard<Job>> {
        let job = self.get(id).await?.lock_owned().await;
        if job.is_retired() {
            return Err(JobError::NotFound(id));
        }
        Ok(job)
    }

    pub async fn run(&self, id: JobId) -> Result<()> {
        let mut job = self.lock(id).await?;
        job.run(self.spawner.as_ref(), &self.command).await
    }

    pub async fn stop(&self, id: JobId) -> Result<()> {
        let mut job = self.lock(id).await?;
        job.stop()
    }

    /// Observed state of a job; polls its process if it is running.
    pub async fn state(&self, id: JobId) -> Result<JobState> {
        let mut job = self.lock(id).await?;
        Ok(job.poll_state())
    }

    /// Delete a job's files, then drop it from the table.
    pub async fn delete(&self, id: JobId) -> Result<()> {
        let mut job = self.lock(id).await?;
        job.delete().await?;

        let mut table = self.table.write().await;
        table.jobs.remove(&id);
        table.order.retain(|other| *other != id);
        Ok(())
    }

    /// Apply a caller-requested state change.
    ///
    /// `RUNNING` is accepted from `CREATED` and `STOPPED` from `RUNNING`;
    /// every other request is a [`JobError::Conflict`].
    pub async fn update(&self, id: JobId, target: JobState) -> Result<JobStateView> {
        let mut job = self.lock(id).await?;
        let current = job.poll_state();

        match StateMachine::resolve(current, target) {
            Some(Transition::Start) => job.run(self.spawner.as_ref(), &self.command).await?,
            Some(Transition::Stop) => job.stop()?,
            None => {
                warn!(job_id = %id, %current, %target, "requested state is unavailable");
                return Err(JobError::Conflict {
                    id,
                    current,
                    target,
                });
            }
        }

        info!(job_id = %id, from = %current, to = %target, "job state updated");
        Ok(JobStateView {
            id,
            state: job.recorded_state(),
        })
    }

    /// Handle an update request body.
    pub async fn apply(&self, id: JobId, request: &JobUpdate) -> Result<JobStateView> {
        self.update(id, request.state).await
    }

    /// `{id, parameters, state}` of one job.
    pub async fn describe(&self, id: JobId) -> Result<JobView> {
        let mut job = self.lock(id).await?;
        Ok(JobView::observe(&mut job))
    }

    /// Ids in creation order, restricted to `[offset, offset + limit)`.
    pub async fn list(&self, offset: usize, limit: usize) -> Vec<JobId> {
        let table = self.table.read().await;
        table.order.iter().skip(offset).take(limit).copied().collect()
    }

    /// Like [`JobRegistry::list`] but with full views. Jobs deleted while
    /// the page is being built are left out.
    pub async fn list_views(&self, offset: usize, limit: usize) -> JobList {
        let mut items = Vec::new();
        for id in self.list(offset, limit).await {
            if let Ok(view) = self.describe(id).await {
                items.push(view);
            }
        }
        JobList { items }
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}


#[cfg(all(test, unix))]
mod process_tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn registry(dir: &TempDir, script: &str) -> JobRegistry {
        let config = EngineConfig {
            jobs_dir: dir.path().to_path_buf(),
            command: vec!["sh".into(), "-c".into(), script.into()],
            ..EngineConfig::default()
        };
        JobRegistry::with_tokio(&config)
    }

    async fn settle(registry: &JobRegistry, id: JobId) -> JobState {
        for _ in 0..300 {
            let state = registry.state(id).await.unwrap();
            if state != JobState::Running {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never left RUNNING");
    }

    #[tokio::test]
    async fn real_process_completes_and_writes_output() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, "cat input/inputFile.conf > output/result.txt");
        let id = registry.create(&json!({"input_value": 10})).await.unwrap();

        registry.update(id, JobState::Running).await.unwrap();
        assert_eq!(settle(&registry, id).await, JobState::Completed);

        let result = std::fs::read_to_string(dir.path().join(id.to_string()).join("output/result.txt")).unwrap();
        assert!(result.contains("input_value = 10"));

        registry.delete(id).await.unwrap();
        assert!(!dir.path().join(id.to_string()).exists());
    }

    #[tokio::test]
    async fn real_process_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, "exit 1");
        let id = registry.create(&json!({"input_value": 10})).await.unwrap();

        registry.run(id).await.unwrap();
        assert_eq!(settle(&registry, id).await, JobState::Failed);
    }

    #[tokio::test]
    async fn real_process_can_be_stopped() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, "sleep 30");
        let id = registry.create(&json!({"input_value": 10})).await.unwrap();

        registry.run(id).await.unwrap();
        let view = registry.update(id, JobState::Stopped).await.unwrap();
        assert_eq!(view.state, JobState::Stopped);
        assert_eq!(registry.state(id).await.unwrap(), JobState::Stopped);
        registry.delete(id).await.unwrap();
    }
}
