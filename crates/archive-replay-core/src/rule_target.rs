//! # Rule Target Provisioning
//!
//! Attaches the downstream processor as a target of the replay rule. The
//! target forwards each replayed event wrapped as
//! `{"originalEvent": <event>, "startTime": "<RFC3339>"}` so the processor can
//! measure how long the event waited.
//!
//! Rule changes are eventually consistent on the remote service; callers that
//! start a replay right after an upsert should allow a settling delay (see
//! `ReplaySettings::settle_margin`).

use event_bus_runtime::{
    BusError, EventBusProvider, FailedTargetEntry, InputTransformer, PutTargetsRequest,
    RetryPolicy, RuleTarget, Timestamp,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

#[cfg(test)]
#[path = "rule_target_tests.rs"]
mod tests;

/// Target id used for the replay target; upserts replace this entry
pub const DEFAULT_TARGET_ID: &str = "rule";

/// Placeholder bound to the raw event by the input transform
const ORIGINAL_EVENT_PLACEHOLDER: &str = "originalEvent";

/// Build the input template carrying `start_time` as a literal
pub fn input_template(start_time: &Timestamp) -> String {
    format!(
        r#"{{"originalEvent": <{}>, "startTime": "{}"}}"#,
        ORIGINAL_EVENT_PLACEHOLDER,
        start_time.to_rfc3339()
    )
}

/// Parameters of a rule target upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertRuleTarget {
    pub rule_name: String,
    pub event_bus: String,
    /// Downstream processor, e.g. a state machine ARN
    pub target_arn: String,
    /// Role the bus assumes to invoke the target
    pub role_arn: String,
    /// Injected into every forwarded event as `startTime`
    pub start_time: Timestamp,
}

/// Idempotently configures the replay rule's target
#[derive(Clone)]
pub struct RuleTargetProvisioner {
    provider: Arc<dyn EventBusProvider>,
    target_id: String,
}

impl RuleTargetProvisioner {
    pub fn new(provider: Arc<dyn EventBusProvider>) -> Self {
        Self {
            provider,
            target_id: DEFAULT_TARGET_ID.to_string(),
        }
    }

    pub fn with_target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = target_id.into();
        self
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Build the full target configuration for an upsert
    pub fn build_target(&self, request: &UpsertRuleTarget) -> RuleTarget {
        RuleTarget {
            id: self.target_id.clone(),
            arn: request.target_arn.clone(),
            role_arn: request.role_arn.clone(),
            input_transformer: InputTransformer::new(input_template(&request.start_time))
                .with_path(ORIGINAL_EVENT_PLACEHOLDER, "$"),
            retry_policy: RetryPolicy::no_retries(),
        }
    }

    /// Create or replace the rule target
    ///
    /// # Errors
    /// - `ProvisionError::PartialFailure` - the service rejected the target
    /// - `ProvisionError::Transport` - the call itself failed
    #[instrument(skip(self, request), fields(rule = %request.rule_name, target_id = %self.target_id))]
    pub async fn upsert(&self, request: &UpsertRuleTarget) -> Result<(), ProvisionError> {
        let put_request = PutTargetsRequest {
            rule: request.rule_name.clone(),
            event_bus: request.event_bus.clone(),
            targets: vec![self.build_target(request)],
        };

        let outcome = self.provider.put_targets(&put_request).await?;

        if outcome.failed_entry_count > 0 {
            for entry in &outcome.failed_entries {
                error!(failure = %entry, "Rule target rejected");
            }
            return Err(ProvisionError::PartialFailure {
                rule: request.rule_name.clone(),
                failed_entry_count: outcome.failed_entry_count,
                failed: outcome.failed_entries,
            });
        }

        info!(
            start_time = %request.start_time,
            "Rule target configured"
        );
        Ok(())
    }
}

/// Errors configuring the replay rule target
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Failed to put {failed_entry_count} target(s) on rule {rule}")]
    PartialFailure {
        rule: String,
        failed_entry_count: usize,
        failed: Vec<FailedTargetEntry>,
    },

    #[error("Rule target request failed: {0}")]
    Transport(#[from] BusError),
}
