//! Workload control (start/stop commands)

use crate::error::ControlError;
use crate::hysteresis::ControlAction;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Starts and stops the managed workload. Calls are fire-and-forget: no
/// read-back confirms that the workload actually changed state.
#[async_trait::async_trait]
pub trait WorkloadController: Send + Sync {
    async fn start(&self) -> Result<(), ControlError>;
    async fn stop(&self) -> Result<(), ControlError>;

    async fn apply(&self, action: ControlAction) -> Result<(), ControlError> {
        match action {
            ControlAction::Start => self.start().await,
            ControlAction::Stop => self.stop().await,
        }
    }
}

/// Runs the configured shell commands, e.g. `boinccmd --set_run_mode never`.
#[derive(Debug, Clone)]
pub struct CommandController {
    start_command: String,
    stop_command: String,
    timeout: Duration,
}

impl CommandController {
    pub fn new(
        start_command: impl Into<String>,
        stop_command: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            start_command: start_command.into(),
            stop_command: stop_command.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl WorkloadController for CommandController {
    async fn start(&self) -> Result<(), ControlError> {
        run_shell(&self.start_command, self.timeout).await
    }

    async fn stop(&self) -> Result<(), ControlError> {
        run_shell(&self.stop_command, self.timeout).await
    }
}

/// Run `command` through `sh -c`, capturing its output into the log.
/// A non-zero exit, a spawn failure, or exceeding `timeout` is an error.
pub async fn run_shell(command: &str, timeout: Duration) -> Result<(), ControlError> {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|source| ControlError::Spawn {
            command: command.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(ControlError::TimedOut {
                command: command.to_string(),
                timeout,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        debug!(command, output = %stdout.trim(), "command stdout");
    }

    if output.status.success() {
        Ok(())
    } else {
        if !stderr.trim().is_empty() {
            warn!(command, output = %stderr.trim(), "command stderr");
        }
        Err(ControlError::Failed {
            command: command.to_string(),
            code: output.status.code(),
        })
    }
}

/// Logs the commands it would run instead of running them.
#[derive(Debug, Clone)]
pub struct DryRunController {
    start_command: String,
    stop_command: String,
}

impl DryRunController {
    pub fn new(start_command: impl Into<String>, stop_command: impl Into<String>) -> Self {
        Self {
            start_command: start_command.into(),
            stop_command: stop_command.into(),
        }
    }
}

#[async_trait::async_trait]
impl WorkloadController for DryRunController {
    async fn start(&self) -> Result<(), ControlError> {
        info!(command = %self.start_command, "dry run: not starting workload");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ControlError> {
        info!(command = %self.stop_command, "dry run: not stopping workload");
        Ok(())
    }
}
