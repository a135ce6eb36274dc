//! Provider trait and factory.

use crate::error::BusError;
use crate::event::{BusEvent, PutEventsOutcome};
use crate::provider::{ProviderConfig, ProviderType};
use crate::providers::{EventBridgeProvider, InMemoryProvider};
use crate::replay::{ReplayDescription, StartReplayRequest};
use crate::target::{PutTargetsOutcome, PutTargetsRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by specific event bus providers (EventBridge, in-memory)
///
/// Partial failures are reported in the returned outcomes, not as errors.
/// Callers decide whether a non-zero failed count is fatal.
#[async_trait]
pub trait EventBusProvider: Send + Sync {
    /// Publish a batch of events
    async fn put_events(&self, events: &[BusEvent]) -> Result<PutEventsOutcome, BusError>;

    /// Create or replace targets on a rule
    async fn put_targets(&self, request: &PutTargetsRequest)
        -> Result<PutTargetsOutcome, BusError>;

    /// Start replaying an archive into a bus
    async fn start_replay(
        &self,
        request: &StartReplayRequest,
    ) -> Result<ReplayDescription, BusError>;

    /// Fetch the current status of a replay by name
    async fn describe_replay(&self, replay_name: &str) -> Result<ReplayDescription, BusError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Factory for creating providers from configuration
pub struct EventBusClientFactory;

impl EventBusClientFactory {
    /// Create a provider for the configured backend
    pub async fn create_provider(
        config: ProviderConfig,
    ) -> Result<Arc<dyn EventBusProvider>, BusError> {
        let provider: Arc<dyn EventBusProvider> = match config {
            ProviderConfig::EventBridge(eventbridge_config) => {
                Arc::new(EventBridgeProvider::new(eventbridge_config).await?)
            }
            ProviderConfig::InMemory(memory_config) => {
                Arc::new(InMemoryProvider::new(memory_config))
            }
        };

        info!(provider = %provider.provider_type(), "Created event bus provider");
        Ok(provider)
    }
}
