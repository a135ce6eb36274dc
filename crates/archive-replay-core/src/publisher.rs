//! # Event Publisher
//!
//! Emits synthetic test events onto a bus so there is something to archive
//! and replay. Each event's detail carries its own creation time:
//! `{"id": "2024-01-01T00:00:00.123456789Z"}`.

use event_bus_runtime::{BusError, BusEvent, EventBusProvider, PutEventsResultEntry, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;

/// Default number of events per publish run
pub const DEFAULT_EVENT_COUNT: usize = 10;

/// Source and detail type stamped on synthetic events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticEventTemplate {
    pub source: String,
    pub detail_type: String,
}

impl Default for SyntheticEventTemplate {
    fn default() -> Self {
        Self {
            source: "eb-test-app".to_string(),
            detail_type: "test-event".to_string(),
        }
    }
}

impl SyntheticEventTemplate {
    /// Build one event stamped with `now`
    pub fn event(&self, event_bus: &str, now: Timestamp) -> BusEvent {
        let detail = serde_json::json!({ "id": now.to_rfc3339_nanos() }).to_string();
        BusEvent::new(event_bus, &self.source, &self.detail_type, detail, now)
    }
}

/// Publishes batches of synthetic events
#[derive(Clone)]
pub struct EventPublisher {
    provider: Arc<dyn EventBusProvider>,
    template: SyntheticEventTemplate,
}

impl EventPublisher {
    pub fn new(provider: Arc<dyn EventBusProvider>) -> Self {
        Self {
            provider,
            template: SyntheticEventTemplate::default(),
        }
    }

    pub fn with_template(mut self, template: SyntheticEventTemplate) -> Self {
        self.template = template;
        self
    }

    /// Publish `count` events to `event_bus`, returning the assigned ids
    ///
    /// Events are sent in batches no larger than the provider accepts. Every
    /// batch is sent before failures are reported.
    ///
    /// # Errors
    /// - `PublishError::InvalidCount` - `count` is zero
    /// - `PublishError::PartialFailure` - some entries were rejected
    /// - `PublishError::Transport` - a publish call failed
    #[instrument(skip(self), fields(provider = %self.provider.provider_type()))]
    pub async fn publish(&self, count: usize, event_bus: &str) -> Result<Vec<String>, PublishError> {
        if count == 0 {
            return Err(PublishError::InvalidCount);
        }

        let events: Vec<BusEvent> = (0..count)
            .map(|_| self.template.event(event_bus, Timestamp::now()))
            .collect();

        let batch_size = self.provider.provider_type().max_publish_batch_size();
        let mut event_ids = Vec::with_capacity(count);
        let mut failed_entry_count = 0;
        let mut failed = Vec::new();

        for batch in events.chunks(batch_size) {
            let outcome = self.provider.put_events(batch).await?;
            failed_entry_count += outcome.failed_entry_count;
            failed.extend(outcome.failed_entries());
            event_ids.extend(outcome.event_ids());
        }

        // The reported count decides; entries may not say which ones failed
        if failed_entry_count > 0 {
            for entry in &failed {
                error!(failure = %entry, "Event rejected");
            }
            error!(failed_entry_count, "Events were not accepted");
            return Err(PublishError::PartialFailure {
                failed_entry_count,
                failed,
            });
        }

        info!(count, "Events sent");
        Ok(event_ids)
    }
}

/// Errors publishing synthetic events
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Event count must be at least 1")]
    InvalidCount,

    #[error("Failed to put {failed_entry_count} event(s)")]
    PartialFailure {
        failed_entry_count: usize,
        failed: Vec<PutEventsResultEntry>,
    },

    #[error("Publish request failed: {0}")]
    Transport(#[from] BusError),
}
