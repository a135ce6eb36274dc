//! # Wait Time
//!
//! Computes how long a replayed event should wait before it is re-published,
//! scaled down from the time it originally spent between the replay window
//! start and its own event time.
//!
//! The downstream processor receives the replay target's payload:
//!
//! ```json
//! { "originalEvent": { "time": "2024-01-01T00:01:40Z", ... }, "startTime": "2024-01-01T00:00:00Z" }
//! ```

use event_bus_runtime::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
#[path = "wait_time_tests.rs"]
mod tests;

/// Factor applied to the elapsed seconds before rounding
pub const WAIT_TIME_SCALE: f64 = 0.01;

/// The raw event as forwarded by the replay rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalEvent {
    pub time: Timestamp,

    /// Remaining envelope fields, kept as received
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Payload delivered to the downstream processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitTimeInput {
    #[serde(rename = "originalEvent")]
    pub original_event: OriginalEvent,

    /// Kept as text so a malformed value surfaces as a parse error
    #[serde(rename = "startTime")]
    pub start_time: String,
}

/// `round((event_time - start_time) seconds * 0.01)`
///
/// Negative results are kept, halves round away from zero and a zero result
/// is always `+0`.
///
/// # Errors
/// `WaitTimeError::Parse` when `start_time` is not RFC 3339.
pub fn compute(event_time: &Timestamp, start_time: &str) -> Result<f64, WaitTimeError> {
    let start = Timestamp::from_rfc3339(start_time).map_err(|source| WaitTimeError::Parse {
        value: start_time.to_string(),
        source,
    })?;

    let elapsed = elapsed_seconds(event_time.signed_duration_since(&start));
    let wait = (elapsed * WAIT_TIME_SCALE).round();

    // -0.0 == 0.0, so this also clears the sign of a negative zero
    Ok(if wait == 0.0 { 0.0 } else { wait })
}

/// Compute the wait time for a delivered payload
pub fn handle(input: &WaitTimeInput) -> Result<f64, WaitTimeError> {
    let wait = compute(&input.original_event.time, &input.start_time)?;
    debug!(
        event_time = %input.original_event.time,
        start_time = %input.start_time,
        wait_time_seconds = wait,
        "Computed wait time"
    );
    Ok(wait)
}

/// Decode a JSON payload and compute its wait time
pub fn handle_json(payload: &str) -> Result<f64, WaitTimeError> {
    let input: WaitTimeInput =
        serde_json::from_str(payload).map_err(|source| WaitTimeError::Decode { source })?;
    handle(&input)
}

fn elapsed_seconds(elapsed: chrono::Duration) -> f64 {
    match elapsed.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1_000_000_000.0,
        // Spans beyond ~292 years only fit in milliseconds
        None => elapsed.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Errors computing a wait time
#[derive(Debug, Error)]
pub enum WaitTimeError {
    #[error("Invalid start time {value:?}: {source}")]
    Parse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid wait time input: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}
