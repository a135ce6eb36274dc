//! Tests for CLI configuration loading.

use super::*;
use std::fs;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_config_defaults() {
    let config = CliConfig::default();

    assert_eq!(config.event_bus.provider, ProviderKind::EventBridge);
    assert_eq!(config.outputs.file_name, "outputs.json");
    assert_eq!(config.outputs.stack_name, "InfraStack");
    assert_eq!(config.replay.lookback_seconds, 3600);
    assert_eq!(config.replay.poll_interval_seconds, 5);
    assert_eq!(config.replay.settle_margin_seconds, 0);
    assert_eq!(config.replay.max_wait_seconds, None);
    assert_eq!(config.publish.count, 10);
    assert_eq!(config.publish.source, "eb-test-app");
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

/// Verify missing sources produce the defaults
#[test]
fn test_load_without_sources() {
    let dir = TempDir::new().unwrap();
    let absent = dir.path().join("config.toml");

    let config =
        load_configuration_from(Some(&absent), None, "ARCHIVE_REPLAY_TEST_NO_SOURCES").unwrap();

    assert_eq!(config, CliConfig::default());
}

/// Verify the explicit file overrides the user file
#[test]
fn test_explicit_file_overrides_user_file() {
    let dir = TempDir::new().unwrap();
    let user = write_file(
        dir.path(),
        "user.toml",
        r#"
[event_bus]
provider = "memory"
region = "eu-west-1"

[replay]
poll_interval_seconds = 30
"#,
    );
    let explicit = write_file(
        dir.path(),
        "explicit.toml",
        r#"
[replay]
poll_interval_seconds = 2
max_wait_seconds = 600

[logging]
format = "json"
"#,
    );

    let config = load_configuration_from(
        Some(&user),
        Some(&explicit),
        "ARCHIVE_REPLAY_TEST_LAYERING",
    )
    .unwrap();

    assert_eq!(config.event_bus.provider, ProviderKind::Memory);
    assert_eq!(config.event_bus.region.as_deref(), Some("eu-west-1"));
    assert_eq!(config.replay.poll_interval_seconds, 2);
    assert_eq!(config.replay.max_wait_seconds, Some(600));
    assert_eq!(config.logging.format, LogFormat::Json);
}

/// Verify an explicit file that does not exist is an error
#[test]
fn test_missing_explicit_file_fails() {
    let dir = TempDir::new().unwrap();
    let result = load_configuration_from(
        None,
        Some(&dir.path().join("missing.toml")),
        "ARCHIVE_REPLAY_TEST_MISSING",
    );

    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

/// Verify environment variables override files
#[test]
fn test_environment_overrides() {
    let dir = TempDir::new().unwrap();
    let explicit = write_file(
        dir.path(),
        "explicit.toml",
        "[publish]\ncount = 3\n",
    );
    std::env::set_var("ARCHIVE_REPLAY_TEST_ENV__PUBLISH__COUNT", "7");
    std::env::set_var("ARCHIVE_REPLAY_TEST_ENV__OUTPUTS__STACK_NAME", "OtherStack");

    let config =
        load_configuration_from(None, Some(&explicit), "ARCHIVE_REPLAY_TEST_ENV").unwrap();

    assert_eq!(config.publish.count, 7);
    assert_eq!(config.outputs.stack_name, "OtherStack");
}

/// Verify values that cannot drive a run are rejected
#[test]
fn test_invalid_values_fail() {
    let dir = TempDir::new().unwrap();
    let explicit = write_file(
        dir.path(),
        "explicit.toml",
        "[replay]\npoll_interval_seconds = 0\n",
    );

    let result = load_configuration_from(None, Some(&explicit), "ARCHIVE_REPLAY_TEST_INVALID");
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));

    let malformed = write_file(dir.path(), "malformed.toml", "[replay\n");
    let result = load_configuration_from(None, Some(&malformed), "ARCHIVE_REPLAY_TEST_INVALID");
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_replay_settings_conversion() {
    let config = ReplayConfig {
        lookback_seconds: 120,
        poll_interval_seconds: 1,
        settle_margin_seconds: 10,
        max_wait_seconds: Some(60),
    };

    let settings = config.settings();

    assert_eq!(settings.lookback, Duration::from_secs(120));
    assert_eq!(settings.poll_interval, Duration::from_secs(1));
    assert_eq!(settings.settle_margin, Duration::from_secs(10));
    assert_eq!(settings.max_wait, Some(Duration::from_secs(60)));
}

#[test]
fn test_provider_config_selection() {
    let eventbridge = EventBusSettings {
        provider: ProviderKind::EventBridge,
        region: Some("us-west-2".to_string()),
        endpoint_url: None,
    };
    match eventbridge.provider_config() {
        ProviderConfig::EventBridge(config) => {
            assert_eq!(config.region.as_deref(), Some("us-west-2"))
        }
        other => panic!("expected EventBridge config, got {other:?}"),
    }

    let memory = EventBusSettings {
        provider: ProviderKind::Memory,
        ..EventBusSettings::default()
    };
    assert!(matches!(
        memory.provider_config(),
        ProviderConfig::InMemory(_)
    ));
}
