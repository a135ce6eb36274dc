//! End-to-end replay flows against the in-memory bus.

mod common;

use archive_replay_core::{
    cancel_channel, CancelSignal, ProcessError, PublishError, ReplayError, ReplaySettings,
};
use archive_replay_integration_tests::{bus_arn, state_machine_arn, RULE_NAME};
use common::{input_of, quick_settings, seconds_from_now, wait_time_of, Harness};
use event_bus_runtime::{BusEvent, EventBusProvider, ReplayScript, ReplayState, ReplayStep};
use std::time::Duration;
use tokio::time::Instant;

/// Verify publish, replay, delivery and wait time end to end
#[tokio::test(start_paused = true)]
async fn test_publish_replay_and_measure() {
    let harness = Harness::new();

    let event_ids = harness
        .publisher()
        .publish(5, &harness.targets.event_bus_arn)
        .await
        .unwrap();
    assert_eq!(event_ids.len(), 5);

    let job = harness
        .driver(quick_settings())
        .run_at(seconds_from_now(1), &harness.targets, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(job.state, ReplayState::Completed);

    let deliveries = harness.bus.deliveries();
    assert_eq!(deliveries.len(), 5);

    let start_time = job.window.start().to_rfc3339();
    for delivery in &deliveries {
        assert_eq!(delivery.rule, RULE_NAME);
        assert_eq!(delivery.target_arn, state_machine_arn());
        assert_eq!(delivery.replay_name, job.name);

        // Exactly the two fields of the downstream contract
        let payload = delivery.payload.as_object().unwrap();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload["startTime"], start_time.as_str());
        assert_eq!(payload["originalEvent"]["source"], "eb-test-app");
        assert_eq!(payload["originalEvent"]["detail-type"], "test-event");

        // Events are about an hour after the window start
        assert_eq!(wait_time_of(delivery), 36.0);
    }
}

/// Verify events outside the window are not replayed
#[tokio::test(start_paused = true)]
async fn test_events_outside_window_are_skipped() {
    let harness = Harness::new();
    harness
        .publisher()
        .publish(3, &harness.targets.event_bus_arn)
        .await
        .unwrap();

    // Window ends two hours from now, so the events are older than its start
    let settings = ReplaySettings {
        lookback: Duration::from_secs(60 * 60),
        ..quick_settings()
    };
    let job = harness
        .driver(settings)
        .run_at(seconds_from_now(2 * 60 * 60), &harness.targets, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(job.state, ReplayState::Completed);
    assert!(harness.bus.deliveries().is_empty());
}

/// Verify consecutive replays keep a single rule target
#[tokio::test(start_paused = true)]
async fn test_consecutive_replays_reuse_target() {
    let harness = Harness::new();
    harness
        .publisher()
        .publish(2, &harness.targets.event_bus_arn)
        .await
        .unwrap();
    let driver = harness.driver(quick_settings());

    let first = driver
        .run_at(seconds_from_now(1), &harness.targets, &CancelSignal::never())
        .await
        .unwrap();
    let second = driver
        .run_at(seconds_from_now(2), &harness.targets, &CancelSignal::never())
        .await
        .unwrap();

    assert_ne!(first.name, second.name);
    assert_eq!(harness.bus.targets(&bus_arn(), RULE_NAME).len(), 1);
    assert_eq!(harness.bus.deliveries().len(), 4);
    assert_eq!(harness.bus.replay_names().len(), 2);
}

/// Verify a failed replay delivers nothing and keeps its reason
#[tokio::test(start_paused = true)]
async fn test_failed_replay() {
    let harness = Harness::new();
    harness
        .publisher()
        .publish(2, &harness.targets.event_bus_arn)
        .await
        .unwrap();
    harness.bus.script_next_replay(ReplayScript::polls(vec![
        ReplayStep::new(ReplayState::Running),
        ReplayStep::with_reason(ReplayState::Failed, "Destination bus deleted"),
    ]));

    let result = harness
        .driver(quick_settings())
        .run_at(seconds_from_now(1), &harness.targets, &CancelSignal::never())
        .await;

    match result {
        Err(ReplayError::Failed { reason, .. }) => assert_eq!(reason, "Destination bus deleted"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(harness.bus.deliveries().is_empty());
}

/// Verify cancellation stops a long-running replay promptly
#[tokio::test(start_paused = true)]
async fn test_cancel_long_running_replay() {
    let harness = Harness::new();
    harness
        .bus
        .script_next_replay(ReplayScript::polls(vec![ReplayStep::new(
            ReplayState::Running,
        )]));
    let settings = ReplaySettings {
        poll_interval: Duration::from_secs(5),
        ..ReplaySettings::default()
    };
    let (handle, signal) = cancel_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        handle.cancel();
    });

    let result = harness
        .driver(settings)
        .run_at(seconds_from_now(1), &harness.targets, &signal)
        .await;

    assert!(matches!(result, Err(ReplayError::Interrupted { .. })));
    // Checks at 0s, 5s and 10s; cancellation lands before the next one
    assert_eq!(harness.bus.describe_calls(), 3);
}

/// Verify a partially failed publish lists the rejected entries
#[tokio::test]
async fn test_publish_partial_failure() {
    let harness = Harness::new();
    harness.bus.fail_event_entries([1]);

    let result = harness
        .publisher()
        .publish(3, &harness.targets.event_bus_arn)
        .await;

    match result {
        Err(PublishError::PartialFailure { failed, .. }) => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].error_code.as_deref(), Some("InternalFailure"));
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert_eq!(harness.bus.archived_count(), 2);
}

/// Verify replayed events are re-published spaced out in event time order
#[tokio::test(start_paused = true)]
async fn test_replayed_events_are_reemitted_in_order() {
    let harness = Harness::new();
    let bus_arn = harness.targets.event_bus_arn.clone();

    // Archived out of order, 10, 30 and 20 minutes into the replay window
    let event = |id: &str, seconds_ago: i64| {
        BusEvent::new(
            &bus_arn,
            "eb-test-app",
            "test-event",
            format!(r#"{{"id":"{}"}}"#, id),
            seconds_from_now(-seconds_ago),
        )
    };
    harness
        .bus
        .put_events(&[event("a", 3000), event("c", 1800), event("b", 2400)])
        .await
        .unwrap();

    harness
        .driver(quick_settings())
        .run_at(seconds_from_now(1), &harness.targets, &CancelSignal::never())
        .await
        .unwrap();
    let inputs: Vec<_> = harness.bus.deliveries().iter().map(input_of).collect();
    assert_eq!(inputs.len(), 3);

    let started = Instant::now();
    let processed = harness
        .processor()
        .process_all(inputs, &CancelSignal::never())
        .await
        .unwrap();

    let waits: Vec<f64> = processed.iter().map(|p| p.wait_time_seconds).collect();
    assert_eq!(waits, vec![6.0, 12.0, 18.0]);
    assert!(started.elapsed() >= Duration::from_secs(18));

    let reemitted = harness.bus.archived_events().split_off(3);
    let ids: Vec<String> = reemitted
        .iter()
        .map(|event| {
            let detail: serde_json::Value = serde_json::from_str(&event.detail).unwrap();
            detail["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(reemitted.iter().all(|event| event.event_bus == bus_arn));
    assert!(reemitted.windows(2).all(|pair| pair[0].time < pair[1].time));
}

/// Verify cancellation stops re-publishing events still waiting
#[tokio::test(start_paused = true)]
async fn test_cancel_stops_reemission() {
    let harness = Harness::new();
    harness
        .publisher()
        .publish(2, &harness.targets.event_bus_arn)
        .await
        .unwrap();
    harness
        .driver(quick_settings())
        .run_at(seconds_from_now(1), &harness.targets, &CancelSignal::never())
        .await
        .unwrap();
    let inputs: Vec<_> = harness.bus.deliveries().iter().map(input_of).collect();
    let (handle, signal) = cancel_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.cancel();
    });

    let result = harness.processor().process_all(inputs, &signal).await;

    assert!(matches!(result, Err(ProcessError::Interrupted { .. })));
    assert_eq!(harness.bus.archived_count(), 2);
}
