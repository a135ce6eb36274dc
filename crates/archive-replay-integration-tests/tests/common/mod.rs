//! Common test utilities for archive replay integration tests
//!
//! This module provides:
//! - A harness wiring the in-memory bus to publisher and driver
//! - Helpers for turning deliveries into wait time inputs

use archive_replay_core::{
    stack_outputs::{StackOutputs, OUTPUTS_FILE_NAME},
    wait_time::{self, WaitTimeInput},
    EventPublisher, ReplayDriver, ReplaySettings, ReplayTargets, ReplayedEventProcessor,
};
use archive_replay_integration_tests::{Deployment, STACK_NAME};
use chrono::Utc;
use event_bus_runtime::{Delivery, InMemoryProvider, Timestamp};
use std::sync::Arc;
use std::time::Duration;

/// In-memory bus plus the deployment it is described by
#[allow(dead_code)]
pub struct Harness {
    pub deployment: Deployment,
    pub bus: InMemoryProvider,
    pub targets: ReplayTargets,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        let deployment = Deployment::new().expect("deployment fixture");
        let outputs = StackOutputs::discover(deployment.root(), OUTPUTS_FILE_NAME, STACK_NAME)
            .expect("outputs document");
        let targets = ReplayTargets::from_outputs(&outputs).expect("replay targets");

        Self {
            deployment,
            bus: InMemoryProvider::default(),
            targets,
        }
    }

    pub fn publisher(&self) -> EventPublisher {
        EventPublisher::new(Arc::new(self.bus.clone()))
    }

    pub fn driver(&self, settings: ReplaySettings) -> ReplayDriver {
        ReplayDriver::new(Arc::new(self.bus.clone()), settings)
    }

    /// Downstream processor re-publishing onto the deployed bus
    pub fn processor(&self) -> ReplayedEventProcessor {
        ReplayedEventProcessor::new(Arc::new(self.bus.clone()), &self.targets.event_bus_arn)
    }
}

/// Settings with a short poll interval
#[allow(dead_code)]
pub fn quick_settings() -> ReplaySettings {
    ReplaySettings {
        poll_interval: Duration::from_secs(1),
        ..ReplaySettings::default()
    }
}

/// Wall-clock time `seconds` from now
#[allow(dead_code)]
pub fn seconds_from_now(seconds: i64) -> Timestamp {
    Timestamp::from_datetime(Utc::now() + chrono::Duration::seconds(seconds))
}

/// Payload of a delivery as the downstream processor reads it
#[allow(dead_code)]
pub fn input_of(delivery: &Delivery) -> WaitTimeInput {
    serde_json::from_value(delivery.payload.clone()).expect("delivery payload shape")
}

/// Wait time the downstream processor would compute for a delivery
#[allow(dead_code)]
pub fn wait_time_of(delivery: &Delivery) -> f64 {
    wait_time::handle(&input_of(delivery)).expect("wait time")
}
