//! Process port used by jobs to run their simulation command.
//!
//! [`ProcessSpawner`] starts a command inside a job's working directory and
//! hands back a [`ProcessHandle`] that can be polled without blocking and
//! terminated on demand. [`TokioSpawner`] is the production implementation.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};

/// Liveness of a spawned process as seen by a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exit code, `None` when the process was killed by a signal.
    Exited(Option<i32>),
}

impl ProcessStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ProcessStatus::Exited(Some(0)))
    }
}

/// An externally spawned unit of execution.
pub trait ProcessHandle: Send + fmt::Debug {
    /// OS process id, when known.
    fn pid(&self) -> Option<u32>;

    /// Check for exit without waiting.
    fn poll(&mut self) -> io::Result<ProcessStatus>;

    /// Send a termination signal. Does not wait for the process to exit.
    fn terminate(&mut self) -> io::Result<()>;
}

/// Starts processes rooted at a working directory.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, command: &[String], workdir: &Path) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Spawns real child processes through `tokio::process`.
///
/// stdout and stderr are written to `output/stdout.log` and
/// `output/stderr.log` inside the working directory, which must already
/// contain the `output/` directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, command: &[String], workdir: &Path) -> io::Result<Box<dyn ProcessHandle>> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let output = workdir.join("output");
        let stdout = File::create(output.join("stdout.log"))?;
        let stderr = File::create(output.join("stderr.log"))?;

        let child = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()?;

        Ok(Box::new(ChildProcess { child }))
    }
}

#[derive(Debug)]
struct ChildProcess {
    child: Child,
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn poll(&mut self) -> io::Result<ProcessStatus> {
        Ok(match self.child.try_wait()? {
            None => ProcessStatus::Running,
            Some(status) => ProcessStatus::Exited(status.code()),
        })
    }

    fn terminate(&mut self) -> io::Result<()> {
        match self.child.start_kill() {
            // Already reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}
