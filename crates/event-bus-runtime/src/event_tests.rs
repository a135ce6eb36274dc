//! Tests for event types and timestamps.

use super::*;

mod timestamp_tests {
    use super::*;

    /// Verify RFC3339 parsing normalizes offsets to UTC
    #[test]
    fn test_from_rfc3339_normalizes_to_utc() {
        let ts = Timestamp::from_rfc3339("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-01T00:00:00Z");
    }

    /// Verify malformed input is rejected
    #[test]
    fn test_from_rfc3339_rejects_garbage() {
        assert!(Timestamp::from_rfc3339("yesterday").is_err());
        assert!("2024-13-01T00:00:00Z".parse::<Timestamp>().is_err());
    }

    /// Verify the nanosecond rendering keeps sub-second precision
    #[test]
    fn test_to_rfc3339_nanos() {
        let ts = Timestamp::from_rfc3339("2024-01-01T00:00:00.123456789Z").unwrap();
        assert_eq!(ts.to_rfc3339_nanos(), "2024-01-01T00:00:00.123456789Z");
        assert_eq!(ts.to_rfc3339(), "2024-01-01T00:00:00Z");
    }

    /// Verify subtracting a std duration
    #[test]
    fn test_checked_sub() {
        let ts = Timestamp::from_rfc3339("2024-01-01T01:00:00Z").unwrap();
        let earlier = ts
            .checked_sub(std::time::Duration::from_secs(3600))
            .unwrap();
        assert_eq!(earlier.to_rfc3339(), "2024-01-01T00:00:00Z");
        assert_eq!(ts.signed_duration_since(&earlier).num_seconds(), 3600);
    }
}

mod put_events_outcome_tests {
    use super::*;

    /// Verify failed entries and accepted ids are separated
    #[test]
    fn test_outcome_partitions_entries() {
        let outcome = PutEventsOutcome {
            failed_entry_count: 1,
            entries: vec![
                PutEventsResultEntry::accepted("a"),
                PutEventsResultEntry::rejected("ThrottlingException", "slow down"),
                PutEventsResultEntry::accepted("b"),
            ],
        };

        assert_eq!(outcome.event_ids(), vec!["a".to_string(), "b".to_string()]);
        let failed = outcome.failed_entries();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].to_string(), "ThrottlingException: slow down");
    }
}
