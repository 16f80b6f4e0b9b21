use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::Result;

/// The supervised activity: started when leadership is acquired, expected
/// to run indefinitely.
///
/// There is no stop API. Leadership loss is handled by terminating the
/// owning process, which takes the activity down with it; the supervisor
/// only ever needs to detect that `run` has returned.
#[async_trait]
pub trait Worker: Send + Sync + std::fmt::Debug {
    async fn run(&self) -> Result<()>;
}

/// Runs an external scheduler command (e.g. `celery beat`) as a child
/// process and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    program: String,
    args: Vec<String>,
    pid_file: Option<PathBuf>,
}

impl CommandWorker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            pid_file: None,
        }
    }

    /// Pid file to clear before each start. A leftover file from a previous
    /// leadership generation would keep some schedulers from starting.
    #[must_use]
    pub fn with_pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_file = Some(path.into());
        self
    }
}

#[async_trait]
impl Worker for CommandWorker {
    async fn run(&self) -> Result<()> {
        if let Some(pid_file) = &self.pid_file {
            match tokio::fs::remove_file(pid_file).await {
                Ok(()) => info!(path = %pid_file.display(), "removed stale pid file"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(%err, path = %pid_file.display(), "could not remove stale pid file");
                }
            }
        }

        info!(program = %self.program, args = ?self.args, "starting worker command");
        let status = Command::new(&self.program).args(&self.args).status().await?;
        warn!(%status, "worker command exited");
        Ok(())
    }
}
