//! # Replayed Event Processor
//!
//! The downstream side of a replay. For each payload the replay rule delivers
//! it computes the wait time, waits that many seconds and puts the original
//! event back onto the bus with its `source`, `detail-type`, `detail` and
//! `time`.
//!
//! Every delivery is handled independently, so events come back spaced out in
//! the order of their original event times regardless of the order the replay
//! delivered them in.

use crate::replay::CancelSignal;
use crate::wait_time::{self, OriginalEvent, WaitTimeError, WaitTimeInput};
use event_bus_runtime::{BusError, BusEvent, EventBusProvider, PutEventsResultEntry, Timestamp};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;

/// Result of re-publishing one replayed event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedEvent {
    /// Identifier the bus assigned to the re-published event
    pub event_id: Option<String>,
    pub event_time: Timestamp,
    pub wait_time_seconds: f64,
}

/// Waits out each replayed event's wait time and re-publishes it
#[derive(Clone)]
pub struct ReplayedEventProcessor {
    provider: Arc<dyn EventBusProvider>,
    event_bus: String,
}

impl ReplayedEventProcessor {
    /// Re-publish onto `event_bus` through `provider`
    pub fn new(provider: Arc<dyn EventBusProvider>, event_bus: impl Into<String>) -> Self {
        Self {
            provider,
            event_bus: event_bus.into(),
        }
    }

    pub fn event_bus(&self) -> &str {
        &self.event_bus
    }

    /// Rebuild the event to re-publish from a delivered envelope
    pub fn restore_event(&self, original: &OriginalEvent) -> Result<BusEvent, ProcessError> {
        let source = string_field(original, "source")?;
        let detail_type = string_field(original, "detail-type")?;
        let detail = match original.rest.get("detail") {
            Some(Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => return Err(ProcessError::MissingField { field: "detail" }),
        };

        Ok(BusEvent::new(
            &self.event_bus,
            source,
            detail_type,
            detail,
            original.time,
        ))
    }

    /// Wait out the payload's wait time, then put its event back on the bus
    ///
    /// Negative wait times publish immediately.
    ///
    /// # Errors
    /// - `ProcessError::WaitTime` - `startTime` is malformed
    /// - `ProcessError::MissingField` - the envelope lacks an event field
    /// - `ProcessError::Interrupted` - `cancel` was raised during the wait
    /// - `ProcessError::Rejected` - the bus reported failed entries
    /// - `ProcessError::Transport` - the publish call failed
    #[instrument(skip(self, input, cancel), fields(event_time = %input.original_event.time))]
    pub async fn process(
        &self,
        input: &WaitTimeInput,
        cancel: &CancelSignal,
    ) -> Result<ProcessedEvent, ProcessError> {
        let wait_time_seconds = wait_time::handle(input)?;
        let event = self.restore_event(&input.original_event)?;

        let delay = delay_for(wait_time_seconds);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Wait for re-publish interrupted");
                return Err(ProcessError::Interrupted {
                    event_time: event.time.to_rfc3339(),
                });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let outcome = self.provider.put_events(std::slice::from_ref(&event)).await?;
        if outcome.failed_entry_count > 0 {
            let failed = outcome.failed_entries();
            for entry in &failed {
                error!(failure = %entry, "Re-published event rejected");
            }
            return Err(ProcessError::Rejected {
                failed_entry_count: outcome.failed_entry_count,
                failed,
            });
        }

        let event_id = outcome.event_ids().into_iter().next();
        info!(event_id = ?event_id, wait_time_seconds, "Event re-published");
        Ok(ProcessedEvent {
            event_id,
            event_time: event.time,
            wait_time_seconds,
        })
    }

    /// Process every payload concurrently
    ///
    /// Results come back in the order events were re-published. The first
    /// failure aborts the payloads still waiting.
    pub async fn process_all(
        &self,
        inputs: Vec<WaitTimeInput>,
        cancel: &CancelSignal,
    ) -> Result<Vec<ProcessedEvent>, ProcessError> {
        let mut tasks = JoinSet::new();
        for input in inputs {
            let processor = self.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { processor.process(&input, &cancel).await });
        }

        let mut processed = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| ProcessError::Task {
                message: e.to_string(),
            })?;
            processed.push(result?);
        }
        Ok(processed)
    }
}

fn string_field(original: &OriginalEvent, field: &'static str) -> Result<String, ProcessError> {
    original
        .rest
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProcessError::MissingField { field })
}

/// Sleep duration for a wait time in seconds
pub fn delay_for(wait_time_seconds: f64) -> Duration {
    if wait_time_seconds > 0.0 {
        Duration::from_secs_f64(wait_time_seconds)
    } else {
        Duration::ZERO
    }
}

/// Errors re-publishing a replayed event
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Cannot compute wait time: {0}")]
    WaitTime(#[from] WaitTimeError),

    #[error("Original event has no {field} field")]
    MissingField { field: &'static str },

    #[error("Interrupted before re-publishing event from {event_time}")]
    Interrupted { event_time: String },

    #[error("Failed to re-publish {failed_entry_count} event(s)")]
    Rejected {
        failed_entry_count: usize,
        failed: Vec<PutEventsResultEntry>,
    },

    #[error("Re-publish request failed: {0}")]
    Transport(#[from] BusError),

    #[error("Processing task failed: {message}")]
    Task { message: String },
}
