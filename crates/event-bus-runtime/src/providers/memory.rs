//! In-memory event bus provider implementation for testing and development.
//!
//! This module provides a working in-memory bus that:
//! - Archives every published event
//! - Keeps rule targets keyed by (bus, rule, target id), replacing on upsert
//! - Runs replays through `STARTING -> RUNNING -> COMPLETED` as they are polled
//! - Delivers replayed events to every target on the destination bus, rendered
//!   through the target's input transformer
//!
//! Scripts and failure injection let tests drive specific replay state
//! sequences and partial publish/provision failures.

use crate::client::EventBusProvider;
use crate::error::BusError;
use crate::event::{BusEvent, PutEventsOutcome, PutEventsResultEntry, Timestamp};
use crate::provider::{InMemoryConfig, ProviderType};
use crate::replay::{ReplayDescription, ReplayState, StartReplayRequest};
use crate::target::{FailedTargetEntry, PutTargetsOutcome, PutTargetsRequest, RuleTarget};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// An event accepted by the bus and kept in its archive
#[derive(Debug, Clone)]
struct ArchivedEvent {
    event_id: String,
    event: BusEvent,
}

/// Sequence of states a scripted replay goes through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayScript {
    /// State reported by the start call
    pub on_start: ReplayStep,
    /// States reported by successive describe calls; the last one repeats
    pub polls: Vec<ReplayStep>,
}

/// A state plus optional reason reported for a scripted replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStep {
    pub state: ReplayState,
    pub reason: Option<String>,
}

impl ReplayStep {
    pub fn new(state: ReplayState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    pub fn with_reason(state: ReplayState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

impl ReplayScript {
    /// Start normally and report the given states on successive polls
    pub fn polls(states: Vec<ReplayStep>) -> Self {
        Self {
            on_start: ReplayStep::new(ReplayState::Starting),
            polls: states,
        }
    }

    /// Report `CANCELLED` straight from the start call
    pub fn cancelled_on_start(reason: impl Into<String>) -> Self {
        Self {
            on_start: ReplayStep::with_reason(ReplayState::Cancelled, reason),
            polls: Vec::new(),
        }
    }
}

/// A replay known to the bus
#[derive(Debug)]
struct InMemoryReplay {
    request: StartReplayRequest,
    arn: String,
    state: ReplayState,
    reason: Option<String>,
    polls: VecDeque<ReplayStep>,
    last_step: Option<ReplayStep>,
    delivered: bool,
}

/// A payload delivered to a rule target by a replay
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub rule: String,
    pub target_id: String,
    pub target_arn: String,
    pub replay_name: String,
    pub payload: Value,
}

#[derive(Default)]
struct BusState {
    archive: Vec<ArchivedEvent>,
    /// (bus, rule) -> target id -> target
    rules: HashMap<(String, String), BTreeMap<String, RuleTarget>>,
    replays: HashMap<String, InMemoryReplay>,
    scripts: VecDeque<ReplayScript>,
    failing_event_indices: HashSet<usize>,
    failing_target_ids: HashSet<String>,
    deliveries: Vec<Delivery>,
    describe_calls: usize,
    next_event_id: u64,
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory event bus for tests and local runs
#[derive(Clone)]
pub struct InMemoryProvider {
    state: Arc<Mutex<BusState>>,
    config: InMemoryConfig,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

impl InMemoryProvider {
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // A poisoned lock only means another test thread panicked mid-update
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a script for the next replay started on this bus
    pub fn script_next_replay(&self, script: ReplayScript) {
        self.lock().scripts.push_back(script);
    }

    /// Reject the entries at these positions in subsequent publish calls
    pub fn fail_event_entries(&self, indices: impl IntoIterator<Item = usize>) {
        self.lock().failing_event_indices.extend(indices);
    }

    /// Reject targets with this id in subsequent put-targets calls
    pub fn fail_target(&self, target_id: impl Into<String>) {
        self.lock().failing_target_ids.insert(target_id.into());
    }

    /// Targets currently attached to a rule
    pub fn targets(&self, event_bus: &str, rule: &str) -> Vec<RuleTarget> {
        self.lock()
            .rules
            .get(&(event_bus.to_string(), rule.to_string()))
            .map(|targets| targets.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of archived events
    pub fn archived_count(&self) -> usize {
        self.lock().archive.len()
    }

    /// Archived events in the order the bus accepted them
    pub fn archived_events(&self) -> Vec<BusEvent> {
        self.lock()
            .archive
            .iter()
            .map(|archived| archived.event.clone())
            .collect()
    }

    /// Payloads delivered to rule targets by completed replays
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().deliveries.clone()
    }

    /// Number of describe-replay calls served
    pub fn describe_calls(&self) -> usize {
        self.lock().describe_calls
    }

    /// Names of all replays started on this bus
    pub fn replay_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().replays.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the event envelope a rule sees for a replayed event
    fn envelope(&self, archived: &ArchivedEvent, replay_name: &str) -> Value {
        let detail = serde_json::from_str::<Value>(&archived.event.detail)
            .unwrap_or_else(|_| Value::String(archived.event.detail.clone()));

        json!({
            "version": "0",
            "id": archived.event_id,
            "detail-type": archived.event.detail_type,
            "source": archived.event.source,
            "account": self.config.account,
            "time": archived.event.time.to_rfc3339(),
            "region": self.config.region,
            "resources": [],
            "detail": detail,
            "replay-name": replay_name,
        })
    }

    /// Deliver archived events inside the replay window to every target on
    /// the destination bus
    fn deliver(&self, state: &mut BusState, replay_name: &str) -> Result<(), BusError> {
        let request = match state.replays.get(replay_name) {
            Some(replay) => replay.request.clone(),
            None => return Ok(()),
        };

        let window = request.event_start_time..request.event_end_time;
        let in_window: Vec<ArchivedEvent> = state
            .archive
            .iter()
            .filter(|archived| window.contains(&archived.event.time))
            .cloned()
            .collect();

        let mut deliveries = Vec::new();
        for ((bus, rule), targets) in &state.rules {
            if *bus != request.destination_arn {
                continue;
            }
            for archived in &in_window {
                let envelope = self.envelope(archived, replay_name);
                for target in targets.values() {
                    let rendered = target.input_transformer.render(&envelope)?;
                    let payload = serde_json::from_str::<Value>(&rendered).map_err(|e| {
                        BusError::InputTransform {
                            message: format!("rendered payload is not JSON: {}", e),
                        }
                    })?;
                    deliveries.push(Delivery {
                        rule: rule.clone(),
                        target_id: target.id.clone(),
                        target_arn: target.arn.clone(),
                        replay_name: replay_name.to_string(),
                        payload,
                    });
                }
            }
        }

        debug!(
            replay_name = %replay_name,
            deliveries = deliveries.len(),
            "Replay delivered archived events"
        );
        state.deliveries.extend(deliveries);
        Ok(())
    }
}

#[async_trait]
impl EventBusProvider for InMemoryProvider {
    async fn put_events(&self, events: &[BusEvent]) -> Result<PutEventsOutcome, BusError> {
        if events.is_empty() {
            return Err(BusError::InvalidRequest {
                message: "at least one event is required".to_string(),
            });
        }

        let mut state = self.lock();
        let mut entries = Vec::with_capacity(events.len());
        let mut failed_entry_count = 0;

        for (index, event) in events.iter().enumerate() {
            if state.failing_event_indices.contains(&index) {
                failed_entry_count += 1;
                entries.push(PutEventsResultEntry::rejected(
                    "InternalFailure",
                    format!("injected failure for entry {}", index),
                ));
                continue;
            }

            state.next_event_id += 1;
            let event_id = format!("evt-{:08}", state.next_event_id);
            state.archive.push(ArchivedEvent {
                event_id: event_id.clone(),
                event: event.clone(),
            });
            entries.push(PutEventsResultEntry::accepted(event_id));
        }

        Ok(PutEventsOutcome {
            failed_entry_count,
            entries,
        })
    }

    async fn put_targets(
        &self,
        request: &PutTargetsRequest,
    ) -> Result<PutTargetsOutcome, BusError> {
        let mut state = self.lock();
        let mut failed_entries = Vec::new();
        let mut accepted = Vec::new();

        for target in &request.targets {
            if state.failing_target_ids.contains(&target.id) {
                failed_entries.push(FailedTargetEntry {
                    target_id: Some(target.id.clone()),
                    error_code: Some("ConcurrentModificationException".to_string()),
                    error_message: Some("injected failure".to_string()),
                });
            } else {
                accepted.push(target.clone());
            }
        }

        let rule_targets = state
            .rules
            .entry((request.event_bus.clone(), request.rule.clone()))
            .or_default();
        for target in accepted {
            rule_targets.insert(target.id.clone(), target);
        }

        Ok(PutTargetsOutcome {
            failed_entry_count: failed_entries.len(),
            failed_entries,
        })
    }

    async fn start_replay(
        &self,
        request: &StartReplayRequest,
    ) -> Result<ReplayDescription, BusError> {
        if request.event_start_time >= request.event_end_time {
            return Err(BusError::InvalidRequest {
                message: "event_start_time must be before event_end_time".to_string(),
            });
        }

        let mut state = self.lock();
        if state.replays.contains_key(&request.replay_name) {
            return Err(BusError::ReplayAlreadyExists {
                replay_name: request.replay_name.clone(),
            });
        }

        let script = state.scripts.pop_front().unwrap_or_else(|| {
            let running = self.config.replay_running_polls as usize;
            let mut polls = vec![ReplayStep::new(ReplayState::Running); running];
            polls.push(ReplayStep::new(ReplayState::Completed));
            ReplayScript::polls(polls)
        });

        let arn = format!(
            "arn:aws:events:{}:{}:replay/{}",
            self.config.region, self.config.account, request.replay_name
        );
        let replay = InMemoryReplay {
            request: request.clone(),
            arn: arn.clone(),
            state: script.on_start.state.clone(),
            reason: script.on_start.reason.clone(),
            polls: script.polls.into(),
            last_step: None,
            delivered: false,
        };
        let mut description = ReplayDescription::new(&request.replay_name, replay.state.clone())
            .with_arn(arn);
        description.state_reason = replay.reason.clone();

        state.replays.insert(request.replay_name.clone(), replay);
        Ok(description)
    }

    async fn describe_replay(&self, replay_name: &str) -> Result<ReplayDescription, BusError> {
        let mut state = self.lock();
        state.describe_calls += 1;

        let replay = state
            .replays
            .get_mut(replay_name)
            .ok_or_else(|| BusError::ReplayNotFound {
                replay_name: replay_name.to_string(),
            })?;

        if !replay.state.is_terminal() {
            let step = replay.polls.pop_front().or_else(|| replay.last_step.clone());
            if let Some(step) = step {
                replay.state = step.state.clone();
                replay.reason = step.reason.clone();
                replay.last_step = Some(step);
            } else {
                warn!(replay_name = %replay_name, "Replay script exhausted without steps");
            }
        }

        let description = ReplayDescription {
            replay_name: replay_name.to_string(),
            replay_arn: Some(replay.arn.clone()),
            state: replay.state.clone(),
            state_reason: replay.reason.clone(),
        };

        let needs_delivery = replay.state == ReplayState::Completed && !replay.delivered;
        if needs_delivery {
            // Left undelivered on error so the next status check retries
            self.deliver(&mut state, replay_name)?;
            if let Some(replay) = state.replays.get_mut(replay_name) {
                replay.delivered = true;
            }
        }

        Ok(description)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
