//! # Event Bus Runtime
//!
//! Provider runtime for an event bus with archive and replay support, with
//! AWS EventBridge and in-memory implementations.
//!
//! This library provides:
//! - Provider-agnostic publish, rule-target, and replay operations
//! - Partial-failure reporting for batch operations
//! - An in-memory bus with scripted replays for tests
//!
//! ## Module Organization
//!
//! - [error] - Error types for all bus operations
//! - [event] - Events, timestamps and publish results
//! - [target] - Rule targets and input transforms
//! - [replay] - Replay requests and states
//! - [provider] - Provider types and configuration
//! - [client] - Provider trait and factory

pub mod client;
pub mod error;
pub mod event;
pub mod provider;
pub mod providers;
pub mod replay;
pub mod target;

// Re-export commonly used types at crate root for convenience
pub use client::{EventBusClientFactory, EventBusProvider};
pub use error::{BusError, ConfigurationError};
pub use event::{BusEvent, PutEventsOutcome, PutEventsResultEntry, Timestamp};
pub use provider::{EventBridgeConfig, InMemoryConfig, ProviderConfig, ProviderType};
pub use providers::{Delivery, EventBridgeProvider, InMemoryProvider, ReplayScript, ReplayStep};
pub use replay::{ReplayDescription, ReplayState, StartReplayRequest};
pub use target::{
    FailedTargetEntry, InputTransformer, PutTargetsOutcome, PutTargetsRequest, RetryPolicy,
    RuleTarget,
};
