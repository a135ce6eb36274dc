//! Replay request and status types.

use crate::event::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;

/// Request to re-deliver archived events within a time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReplayRequest {
    pub replay_name: String,
    /// Archive the events are read from
    pub event_source_arn: String,
    /// Bus the events are re-published to
    pub destination_arn: String,
    pub event_start_time: Timestamp,
    pub event_end_time: Timestamp,
}

/// State of a replay as reported by the bus
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplayState {
    Starting,
    Running,
    Cancelling,
    Completed,
    Cancelled,
    Failed,
    /// A state this runtime does not recognize, kept verbatim
    Unknown(String),
}

impl ReplayState {
    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Cancelling => "CANCELLING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Unknown(value) => value,
        }
    }

    /// Parse the wire representation (`RUNNING`, `COMPLETED`, ...)
    pub fn from_wire(value: &str) -> Self {
        match value {
            "STARTING" => Self::Starting,
            "RUNNING" => Self::Running,
            "CANCELLING" => Self::Cancelling,
            "COMPLETED" => Self::Completed,
            "CANCELLED" => Self::Cancelled,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a replay returned by start and describe calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDescription {
    pub replay_name: String,
    pub replay_arn: Option<String>,
    pub state: ReplayState,
    pub state_reason: Option<String>,
}

impl ReplayDescription {
    pub fn new(replay_name: impl Into<String>, state: ReplayState) -> Self {
        Self {
            replay_name: replay_name.into(),
            replay_arn: None,
            state,
            state_reason: None,
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.replay_arn = Some(arn.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_reason = Some(reason.into());
        self
    }
}
