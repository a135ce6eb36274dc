//! Tests for the EventBridge provider.
//!
//! These cover request construction and configuration without calling AWS.

use super::*;
use crate::target::{InputTransformer, RetryPolicy};

fn sample_target() -> RuleTarget {
    RuleTarget {
        id: "rule".to_string(),
        arn: "arn:aws:states:us-east-1:123456789012:stateMachine:replay".to_string(),
        role_arn: "arn:aws:iam::123456789012:role/replay".to_string(),
        input_transformer: InputTransformer::new(
            r#"{"originalEvent": <originalEvent>, "startTime": "2024-01-01T00:00:00Z"}"#,
        )
        .with_path("originalEvent", "$"),
        retry_policy: RetryPolicy::no_retries(),
    }
}

mod configuration_tests {
    use super::*;

    /// Verify provider creation succeeds with an explicit region
    #[tokio::test]
    async fn test_provider_creation_with_region() {
        let provider = EventBridgeProvider::new(EventBridgeConfig {
            region: Some("eu-west-1".to_string()),
            endpoint_url: None,
        })
        .await
        .unwrap();

        assert_eq!(provider.provider_type(), ProviderType::EventBridge);
    }

    /// Verify blank overrides are rejected
    #[test]
    fn test_validate_config_rejects_blank_values() {
        let blank_endpoint = EventBridgeConfig {
            region: None,
            endpoint_url: Some(String::new()),
        };
        assert!(validate_config(&blank_endpoint).is_err());
        assert!(validate_config(&EventBridgeConfig::default()).is_ok());
    }
}

mod request_tests {
    use super::*;

    /// Verify the SDK target mirrors the rule target
    #[test]
    fn test_to_sdk_target() {
        let target = to_sdk_target(&sample_target()).unwrap();

        assert_eq!(target.id(), "rule");
        assert_eq!(
            target.arn(),
            "arn:aws:states:us-east-1:123456789012:stateMachine:replay"
        );
        assert_eq!(
            target.role_arn(),
            Some("arn:aws:iam::123456789012:role/replay")
        );
        assert_eq!(
            target
                .retry_policy()
                .and_then(|policy| policy.maximum_retry_attempts()),
            Some(0)
        );
        let transformer = target.input_transformer().unwrap();
        assert!(transformer.input_template().contains("<originalEvent>"));
        assert_eq!(
            transformer
                .input_paths_map()
                .and_then(|paths| paths.get("originalEvent"))
                .map(String::as_str),
            Some("$")
        );
    }

    /// Verify the publish entry carries every event field
    #[test]
    fn test_to_request_entry() {
        let time = Timestamp::from_rfc3339("2024-01-01T00:00:00Z").unwrap();
        let event = BusEvent::new("bus", "eb-test-app", "test-event", r#"{"id":"1"}"#, time);

        let entry = to_request_entry(&event);

        assert_eq!(entry.source(), Some("eb-test-app"));
        assert_eq!(entry.detail_type(), Some("test-event"));
        assert_eq!(entry.detail(), Some(r#"{"id":"1"}"#));
        assert_eq!(entry.event_bus_name(), Some("bus"));
        assert_eq!(entry.time().map(|t| t.secs()), Some(1_704_067_200));
    }

    /// Verify negative failed counts from the wire collapse to zero
    #[test]
    fn test_failed_count() {
        assert_eq!(failed_count(3), 3);
        assert_eq!(failed_count(-1), 0);
    }
}
