//! # Archive Replay Core
//!
//! Orchestrates a bounded replay of archived events back onto a live event
//! bus and measures how long replayed events waited.
//!
//! A replay run flows through the modules in order:
//! - [stack_outputs] resolves deployment identifiers from the outputs document
//! - [rule_target] points the replay rule at the downstream processor
//! - [replay] starts the replay and polls it to a terminal state
//! - [wait_time] is what the downstream processor computes per event
//!
//! [publisher] seeds the bus with synthetic events to archive, and
//! [processor] plays the downstream role: it waits out each delivered event's
//! wait time and puts the event back on the bus.
//!
//! All remote calls go through [`event_bus_runtime::EventBusProvider`], so the
//! same flow runs against EventBridge or the in-memory bus.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use archive_replay_core::{
//!     replay::{CancelSignal, ReplayDriver, ReplaySettings, ReplayTargets},
//!     stack_outputs::{StackOutputs, DEFAULT_STACK_NAME, OUTPUTS_FILE_NAME},
//! };
//! use event_bus_runtime::InMemoryProvider;
//! use std::{path::Path, sync::Arc};
//!
//! # async fn example() -> Result<(), archive_replay_core::ArchiveReplayError> {
//! let outputs = StackOutputs::discover(Path::new("."), OUTPUTS_FILE_NAME, DEFAULT_STACK_NAME)?;
//! let targets = ReplayTargets::from_outputs(&outputs)?;
//!
//! let driver = ReplayDriver::new(Arc::new(InMemoryProvider::default()), ReplaySettings::default());
//! let job = driver.run(&targets, &CancelSignal::never()).await?;
//! println!("replay {} finished as {}", job.name, job.state);
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod processor;
pub mod publisher;
pub mod replay;
pub mod rule_target;
pub mod stack_outputs;
pub mod wait_time;

pub use processor::{ProcessError, ProcessedEvent, ReplayedEventProcessor};
pub use publisher::{EventPublisher, PublishError, SyntheticEventTemplate};
pub use replay::{
    cancel_channel, CancelHandle, CancelSignal, ReplayDriver, ReplayError, ReplayJob,
    ReplaySettings, ReplayTargets, ReplayWindow,
};
pub use rule_target::{ProvisionError, RuleTargetProvisioner, UpsertRuleTarget};
pub use stack_outputs::{ConfigError, OutputVariable, StackOutputs};
pub use wait_time::{WaitTimeError, WaitTimeInput};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Standard result type for archive replay operations
pub type ArchiveReplayResult<T> = Result<T, ArchiveReplayError>;

/// Top-level error type for archive replay operations
#[derive(Debug, Error)]
pub enum ArchiveReplayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Wait time error: {0}")]
    WaitTime(#[from] WaitTimeError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),
}

impl ArchiveReplayError {
    /// Flatten provisioning and wait time failures raised by nested steps
    pub fn normalize(self) -> Self {
        match self {
            Self::Replay(ReplayError::Provision(error)) => Self::Provision(error),
            Self::Process(ProcessError::WaitTime(error)) => Self::WaitTime(error),
            other => other,
        }
    }

    /// Check if the run stopped because cancellation was requested
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Replay(ReplayError::Interrupted { .. })
                | Self::Process(ProcessError::Interrupted { .. })
        )
    }
}
