//! Subcommand bodies: each drives a [`JobRegistry`] the way an API handler would.

use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use transforma::api::{JobUpdate, JobView, NewJob};
use transforma::config::EngineConfig;
use transforma::error::JobError;
use transforma::registry::JobRegistry;
use transforma::state_machine::{JobId, JobState};

use crate::ui::{JobProgress, StepPrinter};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Create a job, start it and poll until it leaves `RUNNING`.
///
/// Ctrl-C stops the job instead of leaving an orphaned process behind.
pub async fn run(registry: &JobRegistry, input_value: i64, keep: bool) -> Result<JobView> {
    let request = NewJob {
        parameters: json!({ "input_value": input_value }),
        state: JobState::Running,
    };
    let id = registry.submit(&request).await?.id;
    let progress = JobProgress::start(id);

    let interrupted = wait_until_settled(registry, id, &progress).await?;
    if interrupted {
        stop_interrupted(registry, id).await?;
    }

    let view = registry.describe(id).await?;
    progress.complete(&view);

    let job = registry.get(id).await?;
    let (runtime, workdir) = {
        let job = job.lock().await;
        (job.updated_at() - job.created_at(), job.workdir().to_path_buf())
    };
    info!(job_id = %id, state = %view.state, runtime_ms = runtime.num_milliseconds(), "job settled");

    if keep {
        info!(job_id = %id, workdir = %workdir.display(), "job kept");
    } else {
        registry.delete(id).await?;
    }
    Ok(view)
}

// Returns true if Ctrl-C arrived before the job settled.
async fn wait_until_settled(
    registry: &JobRegistry,
    id: JobId,
    progress: &JobProgress,
) -> Result<bool> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let state = registry.state(id).await?;
        progress.update_state(state);
        if state != JobState::Running {
            return Ok(false);
        }
        tokio::select! {
            _ = &mut ctrl_c => return Ok(true),
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

// Stop a job after Ctrl-C. A job that exited on its own since the last poll
// has already settled.
async fn stop_interrupted(registry: &JobRegistry, id: JobId) -> Result<()> {
    warn!(job_id = %id, "interrupted, stopping job");
    match registry.stop(id).await {
        Ok(()) | Err(JobError::NotRunning(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Walk one job through every lifecycle call, including the refused ones.
pub async fn demo(registry: &JobRegistry) -> Result<()> {
    let out = StepPrinter::default();

    out.section("Validation");
    match registry.create(&json!({ "input_value": 3 })).await {
        Ok(id) => anyhow::bail!("input_value 3 was accepted as job {id}"),
        Err(e) => out.rejected("create input_value=3", &e),
    }

    out.section("Created");
    let id = registry.create(&json!({ "input_value": 10 })).await?;
    out.ok("create input_value=10", id);
    out.state(id, registry.state(id).await?);
    expect_refusal(&out, "stop before run", registry.stop(id).await)?;
    expect_refusal(&out, "update to STOPPED", registry.update(id, JobState::Stopped).await)?;
    expect_refusal(&out, "update to CREATED", registry.update(id, JobState::Created).await)?;

    out.section("Running");
    let start = JobUpdate {
        state: JobState::Running,
    };
    let view = registry.apply(id, &start).await?;
    out.ok("update to RUNNING", view.state);
    expect_refusal(&out, "update to RUNNING again", registry.update(id, JobState::Running).await)?;
    expect_refusal(&out, "delete while running", registry.delete(id).await)?;

    out.section("Stopped");
    match registry.update(id, JobState::Stopped).await {
        Ok(view) => out.ok("update to STOPPED", view.state),
        // The command may already have finished on its own.
        Err(e) => out.rejected("update to STOPPED", &e),
    }
    out.state(id, registry.state(id).await?);
    expect_refusal(&out, "stop again", registry.stop(id).await)?;

    out.section("Deleted");
    registry.delete(id).await?;
    out.ok("delete", id);
    expect_refusal(&out, "get after delete", registry.describe(id).await)?;
    out.ok("jobs left", registry.len().await);
    Ok(())
}

fn expect_refusal<T: std::fmt::Debug>(
    out: &StepPrinter,
    action: &str,
    result: Result<T, JobError>,
) -> Result<()> {
    match result {
        Ok(value) => anyhow::bail!("{action} unexpectedly succeeded: {value:?}"),
        Err(e) => {
            out.rejected(action, &e);
            Ok(())
        }
    }
}

pub fn show_config(config: &EngineConfig) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
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

    #[tokio::test]
    async fn interrupt_after_natural_exit_keeps_outcome() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, "exit 0");
        let id = registry
            .create_with_state(&json!({ "input_value": 10 }), JobState::Running)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        stop_interrupted(&registry, id).await.unwrap();
        assert_eq!(registry.state(id).await.unwrap(), JobState::Completed);
        registry.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn interrupt_stops_running_job() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, "sleep 30");
        let id = registry
            .create_with_state(&json!({ "input_value": 10 }), JobState::Running)
            .await
            .unwrap();

        stop_interrupted(&registry, id).await.unwrap();
        assert_eq!(registry.state(id).await.unwrap(), JobState::Stopped);
    }

    #[tokio::test]
    async fn interrupt_on_unknown_job_is_an_error() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, "exit 0");
        assert!(stop_interrupted(&registry, JobId::new()).await.is_err());
    }
}
