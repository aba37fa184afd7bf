//! Starting a collect run from the process that wants the report.
//!
//! By default the current executable is re-invoked as
//! `streamdelta collect --tenant <id>`; the child persists the snapshot and
//! the caller polls the store for it.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use streamdelta_core::TenantId;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("cannot locate the current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("failed to start collect process {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("collect process timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("collect process failed ({status})")]
    Failed { status: ExitStatus },
}

/// Starts a collect run for one tenant and waits for it to finish.
#[async_trait]
pub trait CollectTrigger: Send + Sync {
    async fn trigger(&self, tenant: &TenantId) -> Result<(), LaunchError>;
}

/// Runs `<program> <args…> collect --tenant <id>` as a child process.
#[derive(Debug, Clone)]
pub struct CollectCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CollectCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Re-invokes the running binary.
    ///
    /// # Errors
    ///
    /// [`LaunchError::CurrentExe`] if the executable path is unavailable.
    pub fn current_exe(timeout: Duration) -> Result<Self, LaunchError> {
        let program = std::env::current_exe().map_err(LaunchError::CurrentExe)?;
        Ok(Self::new(program, Vec::new(), timeout))
    }
}

#[async_trait]
impl CollectTrigger for CollectCommand {
    async fn trigger(&self, tenant: &TenantId) -> Result<(), LaunchError> {
        let program = self.program.display().to_string();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(["collect", "--tenant", tenant.as_str()])
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        tracing::info!(tenant = %tenant, program = %program, "launcher: collect process started");

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        match waited {
            Ok(Ok(status)) if status.success() => {
                tracing::info!(tenant = %tenant, "launcher: collect process finished");
                Ok(())
            }
            Ok(Ok(status)) => Err(LaunchError::Failed { status }),
            Ok(Err(e)) => Err(LaunchError::Spawn { program, source: e }),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(tenant = %tenant, error = %e, "launcher: failed to kill collect process");
                }
                Err(LaunchError::TimedOut(self.timeout))
            }
        }
    }
}
