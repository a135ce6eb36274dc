//! # Replay Driver
//!
//! Drives one archive replay from start to a terminal state:
//!
//! 1. The window ends now and starts `lookback` earlier.
//! 2. The replay rule target is upserted with the window start as `startTime`.
//! 3. After the settle margin the replay is started under a name derived from
//!    the current time.
//! 4. The replay is described every `poll_interval` until it completes, fails,
//!    is cancelled remotely, the caller cancels, or `max_wait` runs out.
//!
//! ```text
//! Starting ──> Running ──> Completed
//!    │            │ ╰────> Failed
//!    │            ╰──────> Cancelled
//!    ╰──> Cancelled | Failed | Completed
//! ```
//!
//! No state leaves a terminal state.

use crate::rule_target::{ProvisionError, RuleTargetProvisioner, UpsertRuleTarget};
use crate::stack_outputs::{ConfigError, OutputVariable, StackOutputs};
use event_bus_runtime::{
    BusError, EventBusProvider, ReplayDescription, ReplayState, StartReplayRequest, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;

/// Format of the timestamp a replay name is derived from
pub const REPLAY_NAME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Settings
// ============================================================================

/// Timing of a replay run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// Length of the replayed window ending now
    pub lookback: Duration,

    /// Delay between status checks
    pub poll_interval: Duration,

    /// Pause between the rule target upsert and the replay start
    pub settle_margin: Duration,

    /// Upper bound on polling; unbounded when `None`
    pub max_wait: Option<Duration>,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(5),
            settle_margin: Duration::ZERO,
            max_wait: None,
        }
    }
}

/// Deployment references a replay needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayTargets {
    /// Bus the replay delivers into; also hosts the replay rule
    pub event_bus_arn: String,
    pub archive_arn: String,
    pub rule_name: String,
    pub rule_role_arn: String,
    /// Downstream processor receiving replayed events
    pub target_arn: String,
}

impl ReplayTargets {
    /// Resolve every reference from loaded stack outputs
    pub fn from_outputs(outputs: &StackOutputs) -> Result<Self, ConfigError> {
        Ok(Self {
            event_bus_arn: outputs.resolve(OutputVariable::EventBusArn)?,
            archive_arn: outputs.resolve(OutputVariable::EventBusArchiveArn)?,
            rule_name: outputs.resolve(OutputVariable::ReplayRuleName)?,
            rule_role_arn: outputs.resolve(OutputVariable::ReplayRuleRoleArn)?,
            target_arn: outputs.resolve(OutputVariable::ReplayStateMachineArn)?,
        })
    }
}

// ============================================================================
// Replay job
// ============================================================================

/// Half-open time range of archived events to replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayWindow {
    start: Timestamp,
    end: Timestamp,
}

impl ReplayWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, ReplayError> {
        if start >= end {
            return Err(ReplayError::InvalidWindow {
                start: start.to_rfc3339_nanos(),
                end: end.to_rfc3339_nanos(),
            });
        }
        Ok(Self { start, end })
    }

    /// Window of length `lookback` ending at `end`
    pub fn ending_at(end: Timestamp, lookback: Duration) -> Result<Self, ReplayError> {
        let start = end
            .checked_sub(lookback)
            .ok_or_else(|| ReplayError::InvalidWindow {
                start: format!("{} - {:?}", end.to_rfc3339_nanos(), lookback),
                end: end.to_rfc3339_nanos(),
            })?;
        Self::new(start, end)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }
}

/// A replay as tracked by the driver
///
/// Only `state` and `state_reason` change after creation, and never once the
/// job is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayJob {
    pub name: String,
    pub replay_arn: Option<String>,
    pub source_archive_arn: String,
    pub destination_bus_arn: String,
    pub window: ReplayWindow,
    pub state: ReplayState,
    /// Set only for `Cancelled` and `Failed`
    pub state_reason: Option<String>,
}

impl ReplayJob {
    pub fn new(
        name: impl Into<String>,
        source_archive_arn: impl Into<String>,
        destination_bus_arn: impl Into<String>,
        window: ReplayWindow,
    ) -> Self {
        Self {
            name: name.into(),
            replay_arn: None,
            source_archive_arn: source_archive_arn.into(),
            destination_bus_arn: destination_bus_arn.into(),
            window,
            state: ReplayState::Starting,
            state_reason: None,
        }
    }

    /// Request that starts this job on the remote service
    pub fn start_request(&self) -> StartReplayRequest {
        StartReplayRequest {
            replay_name: self.name.clone(),
            event_source_arn: self.source_archive_arn.clone(),
            destination_arn: self.destination_bus_arn.clone(),
            event_start_time: self.window.start(),
            event_end_time: self.window.end(),
        }
    }

    /// Apply a remote status report; ignored once the job is terminal
    pub fn observe(&mut self, description: &ReplayDescription) {
        if self.state.is_terminal() {
            return;
        }

        if self.replay_arn.is_none() {
            self.replay_arn = description.replay_arn.clone();
        }
        self.state = description.state.clone();
        self.state_reason = match self.state {
            ReplayState::Cancelled | ReplayState::Failed => description.state_reason.clone(),
            _ => None,
        };
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn reason(&self) -> String {
        self.state_reason.clone().unwrap_or_default()
    }
}

/// Replay name for a start time: `2024-01-01 00:00:00` becomes
/// `2024-01-01-00.00.00`
pub fn replay_name_for(now: &Timestamp) -> String {
    sanitize_replay_name(&now.as_datetime().format(REPLAY_NAME_FORMAT).to_string())
}

/// Replace spaces with `-` and colons with `.`
pub fn sanitize_replay_name(raw: &str) -> String {
    raw.replace(' ', "-").replace(':', ".")
}

// ============================================================================
// Cancellation
// ============================================================================

/// Create a linked cancel handle and signal
pub fn cancel_channel() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelSignal { receiver })
}

/// Raises cancellation for every linked [`CancelSignal`]
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Receivers may all be gone already
        let _ = self.sender.send(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Observes cancellation raised by a [`CancelHandle`]
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that is never raised
    pub fn never() -> Self {
        let (_handle, signal) = cancel_channel();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is raised.
    ///
    /// Pends forever if the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Starts replays and polls them to completion
pub struct ReplayDriver {
    provider: Arc<dyn EventBusProvider>,
    provisioner: RuleTargetProvisioner,
    settings: ReplaySettings,
}

impl ReplayDriver {
    pub fn new(provider: Arc<dyn EventBusProvider>, settings: ReplaySettings) -> Self {
        Self {
            provisioner: RuleTargetProvisioner::new(provider.clone()),
            provider,
            settings,
        }
    }

    pub fn with_provisioner(mut self, provisioner: RuleTargetProvisioner) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn settings(&self) -> &ReplaySettings {
        &self.settings
    }

    /// Replay the window ending at the current time
    pub async fn run(
        &self,
        targets: &ReplayTargets,
        cancel: &CancelSignal,
    ) -> Result<ReplayJob, ReplayError> {
        self.run_at(Timestamp::now(), targets, cancel).await
    }

    /// Replay the window ending at `now`, naming the replay after `now`
    ///
    /// # Errors
    /// - `ReplayError::Provision` - the rule target could not be configured
    /// - `ReplayError::Start` / `StartCancelled` - the replay did not start
    /// - `ReplayError::Cancelled` / `Failed` - terminal remote outcome
    /// - `ReplayError::Poll` - a status check failed
    /// - `ReplayError::Interrupted` - `cancel` was raised
    /// - `ReplayError::TimedOut` - `max_wait` ran out
    #[instrument(skip(self, targets, cancel), fields(replay_name))]
    pub async fn run_at(
        &self,
        now: Timestamp,
        targets: &ReplayTargets,
        cancel: &CancelSignal,
    ) -> Result<ReplayJob, ReplayError> {
        let replay_name = replay_name_for(&now);
        tracing::Span::current().record("replay_name", replay_name.as_str());

        if cancel.is_cancelled() {
            return Err(ReplayError::Interrupted { replay_name });
        }

        let window = ReplayWindow::ending_at(now, self.settings.lookback)?;
        info!(
            window_start = %window.start(),
            window_end = %window.end(),
            "Replaying archived events"
        );

        self.provisioner
            .upsert(&UpsertRuleTarget {
                rule_name: targets.rule_name.clone(),
                event_bus: targets.event_bus_arn.clone(),
                target_arn: targets.target_arn.clone(),
                role_arn: targets.rule_role_arn.clone(),
                start_time: window.start(),
            })
            .await?;

        if !self.settings.settle_margin.is_zero() {
            debug!(settle_margin = ?self.settings.settle_margin, "Waiting for rule change to apply");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReplayError::Interrupted { replay_name });
                }
                _ = tokio::time::sleep(self.settings.settle_margin) => {}
            }
        }

        let mut job = ReplayJob::new(
            &replay_name,
            &targets.archive_arn,
            &targets.event_bus_arn,
            window,
        );
        let started = self
            .provider
            .start_replay(&job.start_request())
            .await
            .map_err(|source| ReplayError::Start {
                replay_name: replay_name.clone(),
                source,
            })?;
        job.observe(&started);
        info!(replay_arn = ?job.replay_arn, state = %job.state, "Replay started");

        if job.state == ReplayState::Cancelled {
            return Err(ReplayError::StartCancelled {
                replay_name,
                reason: job.reason(),
            });
        }

        self.poll(job, cancel).await
    }

    async fn poll(&self, mut job: ReplayJob, cancel: &CancelSignal) -> Result<ReplayJob, ReplayError> {
        let started = Instant::now();
        let deadline = self.settings.max_wait.map(|max_wait| started + max_wait);

        loop {
            let description = self
                .provider
                .describe_replay(&job.name)
                .await
                .map_err(|source| ReplayError::Poll {
                    replay_name: job.name.clone(),
                    source,
                })?;
            job.observe(&description);
            info!(state = %job.state, "Replay status");

            match job.state {
                ReplayState::Completed => return Ok(job),
                ReplayState::Cancelled => {
                    return Err(ReplayError::Cancelled {
                        reason: job.reason(),
                        replay_name: job.name,
                    })
                }
                ReplayState::Failed => {
                    return Err(ReplayError::Failed {
                        reason: job.reason(),
                        replay_name: job.name,
                    })
                }
                _ => {}
            }

            let mut next_poll = Instant::now() + self.settings.poll_interval;
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(waited = ?started.elapsed(), "Replay did not finish in time");
                    return Err(ReplayError::TimedOut {
                        replay_name: job.name,
                        waited: started.elapsed(),
                    });
                }
                next_poll = next_poll.min(deadline);
            }

            // Cancellation wins over a tick that is already due
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Replay wait interrupted");
                    return Err(ReplayError::Interrupted { replay_name: job.name });
                }
                _ = tokio::time::sleep_until(next_poll) => {}
            }
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors driving a replay
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to provision replay rule target: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Invalid replay window: {start} is not before {end}")]
    InvalidWindow { start: String, end: String },

    #[error("Failed to start replay {replay_name}: {source}")]
    Start {
        replay_name: String,
        #[source]
        source: BusError,
    },

    #[error("Replay {replay_name} was cancelled on start: {reason}")]
    StartCancelled { replay_name: String, reason: String },

    #[error("Replay {replay_name} was cancelled: {reason}")]
    Cancelled { replay_name: String, reason: String },

    #[error("Replay {replay_name} failed: {reason}")]
    Failed { replay_name: String, reason: String },

    #[error("Failed to check status of replay {replay_name}: {source}")]
    Poll {
        replay_name: String,
        #[source]
        source: BusError,
    },

    #[error("Interrupted while waiting for replay {replay_name}")]
    Interrupted { replay_name: String },

    #[error("Replay {replay_name} did not finish within {waited:?}")]
    TimedOut {
        replay_name: String,
        waited: Duration,
    },
}
