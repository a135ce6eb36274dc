//! Tests for the archive-replay-cli library module.

use super::*;
use archive_replay_core::ProvisionError;

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from(["archive-replay", "publish", "--count", "25"]);
    assert!(cli.is_ok());

    let cli = cli.unwrap();
    match cli.command {
        Commands::Publish { count, event_bus } => {
            assert_eq!(count, Some(25));
            assert_eq!(event_bus, None);
        }
        _ => panic!("Expected Publish command"),
    }
}

/// Verify global flags are accepted after the subcommand
#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "archive-replay",
        "replay",
        "--max-wait-secs",
        "600",
        "--provider",
        "memory",
        "--stack",
        "OtherStack",
    ])
    .unwrap();

    assert_eq!(cli.provider, Some(ProviderKind::Memory));
    assert_eq!(cli.stack.as_deref(), Some("OtherStack"));
    match cli.command {
        Commands::Replay { max_wait_secs, .. } => assert_eq!(max_wait_secs, Some(600)),
        _ => panic!("Expected Replay command"),
    }
}

#[test]
fn test_process_parsing() {
    let cli = Cli::try_parse_from([
        "archive-replay",
        "process",
        "payload.json",
        "--event-bus",
        "replay-bus",
    ])
    .unwrap();

    match cli.command {
        Commands::Process { input, event_bus } => {
            assert_eq!(input, Some(PathBuf::from("payload.json")));
            assert_eq!(event_bus.as_deref(), Some("replay-bus"));
        }
        _ => panic!("Expected Process command"),
    }
}

#[test]
fn test_outputs_subcommand_parsing() {
    let cli =
        Cli::try_parse_from(["archive-replay", "outputs", "show", "--format", "yaml"]).unwrap();
    match cli.command {
        Commands::Outputs {
            action: OutputsCommands::Show { format },
        } => assert_eq!(format, OutputFormat::Yaml),
        _ => panic!("Expected outputs show command"),
    }

    assert!(Cli::try_parse_from(["archive-replay", "outputs", "get"]).is_err());
}

#[test]
fn test_apply_overrides() {
    let cli = Cli::try_parse_from([
        "archive-replay",
        "--log-level",
        "debug",
        "--json-logs",
        "--region",
        "eu-central-1",
        "--outputs-file",
        "deploy/outputs.json",
        "outputs",
        "get",
        "eventBusArn",
    ])
    .unwrap();
    let mut config = CliConfig::default();

    apply_overrides(&mut config, &cli);

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.event_bus.region.as_deref(), Some("eu-central-1"));
    assert_eq!(
        config.outputs.file,
        Some(PathBuf::from("deploy/outputs.json"))
    );
    assert_eq!(config.event_bus.provider, ProviderKind::EventBridge);
}

#[test]
fn test_exit_codes() {
    let interrupted = CliError::from(ReplayError::Interrupted {
        replay_name: "2024-01-01-00.00.00".to_string(),
    });
    assert_eq!(interrupted.exit_code(), EXIT_INTERRUPTED);

    let failed = CliError::from(ReplayError::Failed {
        replay_name: "2024-01-01-00.00.00".to_string(),
        reason: "boom".to_string(),
    });
    assert_eq!(failed.exit_code(), 3);

    let provision = CliError::from(ReplayError::Provision(ProvisionError::Transport(
        BusError::InvalidRequest {
            message: "no rule".to_string(),
        },
    )));
    assert_eq!(provision.exit_code(), 2);

    let unknown = CliError::from(OutputsError::UnknownVariable {
        name: "nope".to_string(),
    });
    assert_eq!(unknown.exit_code(), 1);

    assert_eq!(CliError::from(PublishError::InvalidCount).exit_code(), 4);

    let rejected = CliError::from(ProcessError::Rejected {
        failed_entry_count: 1,
        failed: Vec::new(),
    });
    assert_eq!(rejected.exit_code(), 4);

    let waiting = CliError::from(ProcessError::Interrupted {
        event_time: "2024-01-01T00:00:00Z".to_string(),
    });
    assert_eq!(waiting.exit_code(), EXIT_INTERRUPTED);

    let io = CliError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
    assert_eq!(io.exit_code(), 6);
}

#[test]
fn test_error_chain_includes_causes() {
    let error = CliError::from(ReplayError::Poll {
        replay_name: "2024-01-01-00.00.00".to_string(),
        source: BusError::ReplayNotFound {
            replay_name: "2024-01-01-00.00.00".to_string(),
        },
    });

    let message = error_chain(&error);
    assert!(message.contains("Failed to check status of replay"));
    assert!(message.contains("Replay not found"));
}

#[test]
fn test_render_outputs() {
    let values = vec![
        (OutputVariable::EventBusName, "replay-bus".to_string()),
        (OutputVariable::ReplayRuleName, "replay-rule".to_string()),
    ];

    assert_eq!(
        render_outputs(&values, OutputFormat::Text).unwrap(),
        "eventBusName=replay-bus\nreplayRuleName=replay-rule"
    );

    let json: serde_json::Value =
        serde_json::from_str(&render_outputs(&values, OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(json["replayRuleName"], "replay-rule");

    assert_eq!(
        render_outputs(&values, OutputFormat::Yaml).unwrap(),
        "eventBusName: replay-bus\nreplayRuleName: replay-rule"
    );
}
