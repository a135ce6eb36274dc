//! AWS EventBridge provider implementation.
//!
//! Talks to EventBridge through the AWS SDK. Credentials and region come from
//! the default provider chain unless overridden in [`EventBridgeConfig`].
//!
//! ## Operations
//!
//! - `PutEvents`: batch publish, up to 10 entries per call
//! - `PutTargets`: upsert rule targets with input transformers
//! - `StartReplay` / `DescribeReplay`: archive replay lifecycle
//!
//! Partial failures (`FailedEntryCount > 0`) are returned in the outcome so
//! that callers can decide how to surface them.

use crate::client::EventBusProvider;
use crate::error::{BusError, ConfigurationError};
use crate::event::{BusEvent, PutEventsOutcome, PutEventsResultEntry, Timestamp};
use crate::provider::{EventBridgeConfig, ProviderType};
use crate::replay::{ReplayDescription, ReplayState, StartReplayRequest};
use crate::target::{FailedTargetEntry, PutTargetsOutcome, PutTargetsRequest, RuleTarget};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_eventbridge::error::DisplayErrorContext;
use aws_sdk_eventbridge::primitives::DateTime as AwsDateTime;
use aws_sdk_eventbridge::types::{
    InputTransformer as AwsInputTransformer, PutEventsRequestEntry, ReplayDestination,
    RetryPolicy as AwsRetryPolicy, Target,
};
use aws_sdk_eventbridge::Client;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

#[cfg(test)]
#[path = "eventbridge_tests.rs"]
mod tests;

/// AWS EventBridge provider
pub struct EventBridgeProvider {
    client: Client,
    config: EventBridgeConfig,
}

impl EventBridgeProvider {
    /// Create new EventBridge provider
    ///
    /// # Errors
    ///
    /// Returns error if the region or endpoint override is blank.
    pub async fn new(config: EventBridgeConfig) -> Result<Self, BusError> {
        validate_config(&config)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref region) = config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        info!(
            region = ?config.region,
            endpoint = ?config.endpoint_url,
            "Connected to AWS EventBridge"
        );

        Ok(Self {
            client: Client::new(&sdk_config),
            config,
        })
    }

    /// Create a provider around an existing SDK client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            config: EventBridgeConfig::default(),
        }
    }
}

impl fmt::Debug for EventBridgeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridgeProvider")
            .field("config", &self.config)
            .finish()
    }
}

fn validate_config(config: &EventBridgeConfig) -> Result<(), BusError> {
    if matches!(config.region.as_deref(), Some(region) if region.trim().is_empty()) {
        return Err(ConfigurationError::Invalid {
            message: "region cannot be empty".to_string(),
        }
        .into());
    }
    if matches!(config.endpoint_url.as_deref(), Some(url) if url.trim().is_empty()) {
        return Err(ConfigurationError::Invalid {
            message: "endpoint_url cannot be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

fn to_aws_time(timestamp: &Timestamp) -> AwsDateTime {
    AwsDateTime::from_millis(timestamp.timestamp_millis())
}

fn to_request_entry(event: &BusEvent) -> PutEventsRequestEntry {
    PutEventsRequestEntry::builder()
        .source(&event.source)
        .detail_type(&event.detail_type)
        .detail(&event.detail)
        .event_bus_name(&event.event_bus)
        .time(to_aws_time(&event.time))
        .build()
}

fn to_sdk_target(target: &RuleTarget) -> Result<Target, BusError> {
    let paths: HashMap<String, String> = target
        .input_transformer
        .input_paths_map
        .iter()
        .map(|(name, path)| (name.clone(), path.clone()))
        .collect();

    let input_transformer = AwsInputTransformer::builder()
        .set_input_paths_map(Some(paths))
        .input_template(&target.input_transformer.input_template)
        .build()
        .map_err(|e| BusError::InvalidRequest {
            message: format!("invalid input transformer: {}", e),
        })?;

    let retry_attempts = i32::try_from(target.retry_policy.maximum_retry_attempts).map_err(|_| {
        BusError::InvalidRequest {
            message: "maximum_retry_attempts out of range".to_string(),
        }
    })?;

    Target::builder()
        .id(&target.id)
        .arn(&target.arn)
        .role_arn(&target.role_arn)
        .input_transformer(input_transformer)
        .retry_policy(
            AwsRetryPolicy::builder()
                .maximum_retry_attempts(retry_attempts)
                .build(),
        )
        .build()
        .map_err(|e| BusError::InvalidRequest {
            message: format!("invalid target {}: {}", target.id, e),
        })
}

fn failed_count(count: i32) -> usize {
    usize::try_from(count).unwrap_or_default()
}

#[async_trait]
impl EventBusProvider for EventBridgeProvider {
    async fn put_events(&self, events: &[BusEvent]) -> Result<PutEventsOutcome, BusError> {
        let entries = events.iter().map(to_request_entry).collect::<Vec<_>>();

        let output = self
            .client
            .put_events()
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                BusError::transport("PutEvents", message, e)
            })?;

        let entries = output
            .entries()
            .iter()
            .map(|entry| PutEventsResultEntry {
                event_id: entry.event_id().map(str::to_string),
                error_code: entry.error_code().map(str::to_string),
                error_message: entry.error_message().map(str::to_string),
            })
            .collect();

        Ok(PutEventsOutcome {
            failed_entry_count: failed_count(output.failed_entry_count()),
            entries,
        })
    }

    async fn put_targets(
        &self,
        request: &PutTargetsRequest,
    ) -> Result<PutTargetsOutcome, BusError> {
        let targets = request
            .targets
            .iter()
            .map(to_sdk_target)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .put_targets()
            .rule(&request.rule)
            .event_bus_name(&request.event_bus)
            .set_targets(Some(targets))
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                BusError::transport("PutTargets", message, e)
            })?;

        let failed_entries = output
            .failed_entries()
            .iter()
            .map(|entry| FailedTargetEntry {
                target_id: entry.target_id().map(str::to_string),
                error_code: entry.error_code().map(str::to_string),
                error_message: entry.error_message().map(str::to_string),
            })
            .collect();

        Ok(PutTargetsOutcome {
            failed_entry_count: failed_count(output.failed_entry_count()),
            failed_entries,
        })
    }

    async fn start_replay(
        &self,
        request: &StartReplayRequest,
    ) -> Result<ReplayDescription, BusError> {
        let destination = ReplayDestination::builder()
            .arn(&request.destination_arn)
            .build()
            .map_err(|e| BusError::InvalidRequest {
                message: format!("invalid replay destination: {}", e),
            })?;

        let output = self
            .client
            .start_replay()
            .replay_name(&request.replay_name)
            .event_source_arn(&request.event_source_arn)
            .event_start_time(to_aws_time(&request.event_start_time))
            .event_end_time(to_aws_time(&request.event_end_time))
            .destination(destination)
            .send()
            .await
            .map_err(|e| {
                let already_exists = e
                    .as_service_error()
                    .map(|service| service.is_resource_already_exists_exception())
                    .unwrap_or(false);
                if already_exists {
                    return BusError::ReplayAlreadyExists {
                        replay_name: request.replay_name.clone(),
                    };
                }
                let message = DisplayErrorContext(&e).to_string();
                BusError::transport("StartReplay", message, e)
            })?;

        let state = output.state().ok_or(BusError::IncompleteResponse {
            operation: "StartReplay",
            field: "State",
        })?;

        debug!(
            replay_name = %request.replay_name,
            state = %state.as_str(),
            "StartReplay accepted"
        );

        Ok(ReplayDescription {
            replay_name: request.replay_name.clone(),
            replay_arn: output.replay_arn().map(str::to_string),
            state: ReplayState::from_wire(state.as_str()),
            state_reason: output.state_reason().map(str::to_string),
        })
    }

    async fn describe_replay(&self, replay_name: &str) -> Result<ReplayDescription, BusError> {
        let output = self
            .client
            .describe_replay()
            .replay_name(replay_name)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|service| service.is_resource_not_found_exception())
                    .unwrap_or(false);
                if not_found {
                    return BusError::ReplayNotFound {
                        replay_name: replay_name.to_string(),
                    };
                }
                let message = DisplayErrorContext(&e).to_string();
                BusError::transport("DescribeReplay", message, e)
            })?;

        let state = output.state().ok_or(BusError::IncompleteResponse {
            operation: "DescribeReplay",
            field: "State",
        })?;

        Ok(ReplayDescription {
            replay_name: output.replay_name().unwrap_or(replay_name).to_string(),
            replay_arn: output.replay_arn().map(str::to_string),
            state: ReplayState::from_wire(state.as_str()),
            state_reason: output.state_reason().map(str::to_string),
        })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::EventBridge
    }
}
