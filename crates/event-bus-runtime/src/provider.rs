//! Provider types and configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumeration of supported event bus providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    EventBridge,
    InMemory,
}

impl ProviderType {
    /// Maximum number of entries accepted by a single publish call
    pub fn max_publish_batch_size(&self) -> usize {
        match self {
            Self::EventBridge => 10,
            Self::InMemory => 100,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventBridge => write!(f, "eventbridge"),
            Self::InMemory => write!(f, "memory"),
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderConfig {
    EventBridge(EventBridgeConfig),
    InMemory(InMemoryConfig),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::EventBridge(EventBridgeConfig::default())
    }
}

/// AWS EventBridge configuration
///
/// Credentials come from the default AWS provider chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventBridgeConfig {
    /// Region override; the default chain decides when unset
    pub region: Option<String>,
    /// Endpoint override, e.g. a LocalStack URL
    pub endpoint_url: Option<String>,
}

/// In-memory bus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryConfig {
    /// Describe calls a replay spends in `RUNNING` before completing
    pub replay_running_polls: u32,
    /// Account id stamped on delivered events
    pub account: String,
    /// Region stamped on delivered events
    pub region: String,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            replay_running_polls: 1,
            account: "000000000000".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}
