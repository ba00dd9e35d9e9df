//! Sample → decide → act → sleep control loop

use crate::error::{ControlError, SampleError};
use crate::executor::WorkloadController;
use crate::hysteresis::{decide, ControlAction, ControllerState, Decision, Thresholds};
use crate::sampler::{LoadSample, LoadSampler};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub thresholds: Thresholds,
    pub poll_interval: Duration,
    /// Upper bound on a single load read; exceeding it counts as a failed
    /// sample. The caller stops waiting but the read itself is not
    /// cancelled, see `ProcStatSampler`.
    pub sample_timeout: Duration,
}

/// A control command issued during a tick and what it returned.
#[derive(Debug)]
pub struct ActionReport {
    pub action: ControlAction,
    pub result: Result<(), ControlError>,
}

/// What happened in one loop iteration.
#[derive(Debug)]
pub enum TickOutcome {
    Sampled {
        sample: LoadSample,
        decision: Decision,
        action: Option<ActionReport>,
    },
    SampleFailed(SampleError),
}

/// Owns the controller state and drives sampler and controller.
pub struct MonitorLoop<S, C> {
    sampler: S,
    controller: C,
    settings: MonitorSettings,
    state: ControllerState,
}

impl<S, C> MonitorLoop<S, C>
where
    S: LoadSampler,
    C: WorkloadController,
{
    pub fn new(sampler: S, controller: C, settings: MonitorSettings) -> Self {
        Self {
            sampler,
            controller,
            settings,
            state: ControllerState::Running,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Run one iteration without sleeping.
    ///
    /// A failed sample leaves the state untouched. On a transition the
    /// matching command is issued and the new state is committed whether
    /// or not the command succeeded.
    pub async fn tick(&mut self) -> TickOutcome {
        let sample = match self.read_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                error!(error = %e, state = %self.state, "failed to sample load, keeping state");
                return TickOutcome::SampleFailed(e);
            }
        };

        let decision = decide(self.state, sample, &self.settings.thresholds);
        debug!(
            sample,
            state = %self.state,
            next = %decision.next,
            dead_zone = self.settings.thresholds.in_dead_zone(sample),
            "load sampled"
        );

        let action = match decision.action() {
            Some(action) => {
                info!(
                    sample,
                    from = %self.state,
                    to = %decision.next,
                    %action,
                    "load crossed threshold"
                );
                let result = self.controller.apply(action).await;
                match &result {
                    Ok(()) => info!(%action, "workload command succeeded"),
                    Err(e) => error!(%action, error = %e, "workload command failed"),
                }
                Some(ActionReport { action, result })
            }
            None => None,
        };

        self.state = decision.next;
        TickOutcome::Sampled {
            sample,
            decision,
            action,
        }
    }

    async fn read_sample(&self) -> Result<LoadSample, SampleError> {
        let timeout = self.settings.sample_timeout;
        match tokio::time::timeout(timeout, self.sampler.sample()).await {
            Ok(result) => result,
            Err(_) => Err(SampleError::Unavailable(format!(
                "load read timed out after {:?}",
                timeout
            ))),
        }
    }

    /// Run until `shutdown` carries `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            stop_threshold = self.settings.thresholds.stop(),
            start_threshold = self.settings.thresholds.start(),
            interval = ?self.settings.poll_interval,
            state = %self.state,
            "monitor loop starting"
        );

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown channel closed");
                        break;
                    }
                }
            }
        }

        info!(state = %self.state, "monitor loop stopped");
    }

    /// Run with no termination condition.
    pub async fn run_forever(self) {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run(shutdown_rx).await;
    }
}
