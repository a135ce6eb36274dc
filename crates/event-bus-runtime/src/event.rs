//! Event structures and publish results.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parse timestamp from RFC3339 string, normalizing to UTC
    pub fn from_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// RFC3339 with whole seconds and a `Z` suffix, e.g. `2024-01-01T00:00:00Z`
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// RFC3339 with nanosecond precision
    pub fn to_rfc3339_nanos(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Subtract a duration from this timestamp
    pub fn checked_sub(&self, duration: std::time::Duration) -> Option<Self> {
        let duration = Duration::from_std(duration).ok()?;
        self.0.checked_sub_signed(duration).map(Self)
    }

    /// Signed time elapsed from `earlier` to `self`
    pub fn signed_duration_since(&self, earlier: &Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_rfc3339(s)
    }
}

/// A single event submitted to a bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Producer identifier, e.g. `eb-test-app`
    pub source: String,
    /// Free-form event classification
    pub detail_type: String,
    /// JSON document carried as the event body
    pub detail: String,
    /// Name or ARN of the target bus
    pub event_bus: String,
    /// When the event occurred
    pub time: Timestamp,
}

impl BusEvent {
    /// Create a new event bound for the given bus
    pub fn new(
        event_bus: impl Into<String>,
        source: impl Into<String>,
        detail_type: impl Into<String>,
        detail: impl Into<String>,
        time: Timestamp,
    ) -> Self {
        Self {
            source: source.into(),
            detail_type: detail_type.into(),
            detail: detail.into(),
            event_bus: event_bus.into(),
            time,
        }
    }
}

/// Per-entry result of a publish call. Failed entries carry an error code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PutEventsResultEntry {
    pub event_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl PutEventsResultEntry {
    /// Entry that was accepted by the bus
    pub fn accepted(event_id: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            ..Default::default()
        }
    }

    /// Entry that was rejected by the bus
    pub fn rejected(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            event_id: None,
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error_code.is_some()
    }
}

impl fmt::Display for PutEventsResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.event_id, &self.error_code) {
            (_, Some(code)) => write!(
                f,
                "{}: {}",
                code,
                self.error_message.as_deref().unwrap_or_default()
            ),
            (Some(id), None) => write!(f, "accepted {}", id),
            (None, None) => write!(f, "accepted"),
        }
    }
}

/// Outcome of a batch publish as reported by the bus
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PutEventsOutcome {
    pub failed_entry_count: usize,
    /// One result per submitted event, in submission order
    pub entries: Vec<PutEventsResultEntry>,
}

impl PutEventsOutcome {
    /// Entries the bus rejected
    pub fn failed_entries(&self) -> Vec<PutEventsResultEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.is_failed())
            .cloned()
            .collect()
    }

    /// Identifiers of accepted events
    pub fn event_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| entry.event_id.clone())
            .collect()
    }
}
