//! # Archive Replay CLI
//!
//! Command-line interface for replaying archived events.
//!
//! This module provides CLI commands for:
//! - Publishing synthetic events to archive
//! - Replaying the last window of archived events and waiting for completion
//! - Computing the wait time of a delivered event
//! - Re-publishing a delivered event once its wait time has passed
//! - Inspecting the deployment outputs

use archive_replay_core::{
    cancel_channel,
    stack_outputs::{OutputVariable, StackOutputs},
    wait_time, ArchiveReplayError, ConfigError as OutputsError, EventPublisher, ProcessError,
    PublishError, ReplayDriver, ReplayError, ReplayTargets, ReplayedEventProcessor,
    WaitTimeError, WaitTimeInput,
};
use clap::{CommandFactory, Parser, Subcommand};
use event_bus_runtime::{BusError, EventBusClientFactory, EventBusProvider};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod settings;
pub mod shutdown;

pub use settings::{CliConfig, ConfigError, LogFormat, ProviderKind};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Exit code used when a run is interrupted by a signal
pub const EXIT_INTERRUPTED: i32 = 130;

// ============================================================================
// CLI Structure
// ============================================================================

/// Archive Replay CLI - Replay archived events onto a live event bus
#[derive(Debug, Parser)]
#[command(name = "archive-replay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay archived events onto a live event bus")]
#[command(
    long_about = "Replays the last window of archived events into the live bus, waits for the replay to finish and computes how long replayed events waited"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "ARCHIVE_REPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level or filter directive
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Event bus backend
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderKind>,

    /// AWS region override
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Event bus endpoint override
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,

    /// Outputs document to read instead of searching for one
    #[arg(long, global = true)]
    pub outputs_file: Option<PathBuf>,

    /// Directory searched for the outputs document
    #[arg(long, global = true)]
    pub search_root: Option<PathBuf>,

    /// Stack whose outputs are used
    #[arg(long, global = true)]
    pub stack: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish synthetic events to the event bus
    Publish {
        /// Number of events to publish
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Bus to publish to; defaults to the deployed bus name
        #[arg(short, long)]
        event_bus: Option<String>,
    },

    /// Replay archived events and wait for the replay to finish
    Replay {
        /// Length of the replayed window in seconds
        #[arg(long)]
        lookback_secs: Option<u64>,

        /// Seconds between status checks
        #[arg(long)]
        poll_interval_secs: Option<u64>,

        /// Seconds to wait after updating the rule target
        #[arg(long)]
        settle_margin_secs: Option<u64>,

        /// Give up after this many seconds of polling
        #[arg(long)]
        max_wait_secs: Option<u64>,
    },

    /// Compute the wait time of a delivered event
    WaitTime {
        /// JSON payload file; read from stdin when omitted
        input: Option<PathBuf>,
    },

    /// Wait out a delivered event's wait time and put it back on the bus
    Process {
        /// JSON payload file; read from stdin when omitted
        input: Option<PathBuf>,

        /// Bus to re-publish to; defaults to the deployed bus ARN
        #[arg(short, long)]
        event_bus: Option<String>,
    },

    /// Inspect deployment outputs
    Outputs {
        #[command(subcommand)]
        action: OutputsCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Deployment output subcommands
#[derive(Debug, Subcommand)]
pub enum OutputsCommands {
    /// Print a single output value
    Get {
        /// Output name, e.g. eventBusArn
        variable: String,
    },

    /// Print every output value
    Show {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `name=value` lines
    Text,
    /// JSON object
    Json,
    /// YAML mapping
    Yaml,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    #[error("{0}")]
    ArchiveReplay(#[from] ArchiveReplayError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Bus(_) | Self::Logging { .. } => 1,
            Self::ArchiveReplay(error) => match error {
                ArchiveReplayError::Config(_) => 1,
                ArchiveReplayError::Provision(_) => 2,
                ArchiveReplayError::Replay(ReplayError::Interrupted { .. }) => EXIT_INTERRUPTED,
                ArchiveReplayError::Replay(_) => 3,
                ArchiveReplayError::Publish(_) => 4,
                ArchiveReplayError::WaitTime(_) => 5,
                ArchiveReplayError::Process(ProcessError::Interrupted { .. }) => EXIT_INTERRUPTED,
                ArchiveReplayError::Process(_) => 4,
            },
            Self::Output { .. } | Self::Io(_) => 6,
        }
    }
}

impl From<OutputsError> for CliError {
    fn from(error: OutputsError) -> Self {
        Self::ArchiveReplay(error.into())
    }
}

impl From<ReplayError> for CliError {
    fn from(error: ReplayError) -> Self {
        Self::ArchiveReplay(ArchiveReplayError::from(error).normalize())
    }
}

impl From<PublishError> for CliError {
    fn from(error: PublishError) -> Self {
        Self::ArchiveReplay(error.into())
    }
}

impl From<ProcessError> for CliError {
    fn from(error: ProcessError) -> Self {
        Self::ArchiveReplay(ArchiveReplayError::from(error).normalize())
    }
}

impl From<WaitTimeError> for CliError {
    fn from(error: WaitTimeError) -> Self {
        Self::ArchiveReplay(error.into())
    }
}

/// Render an error with its chain of causes
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute parsed CLI arguments
pub async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Completions { shell } = &cli.command {
        return execute_completions_command(*shell);
    }

    let mut config = settings::load_configuration(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    initialize_logging(&config.logging)?;

    match cli.command {
        Commands::Publish { count, event_bus } => {
            execute_publish_command(&config, count, event_bus).await
        }
        Commands::Replay {
            lookback_secs,
            poll_interval_secs,
            settle_margin_secs,
            max_wait_secs,
        } => {
            let replay = &mut config.replay;
            if let Some(value) = lookback_secs {
                replay.lookback_seconds = value;
            }
            if let Some(value) = poll_interval_secs {
                replay.poll_interval_seconds = value;
            }
            if let Some(value) = settle_margin_secs {
                replay.settle_margin_seconds = value;
            }
            if max_wait_secs.is_some() {
                replay.max_wait_seconds = max_wait_secs;
            }
            config.validate()?;
            execute_replay_command(&config).await
        }
        Commands::WaitTime { input } => execute_wait_time_command(input),
        Commands::Process { input, event_bus } => {
            execute_process_command(&config, input, event_bus).await
        }
        Commands::Outputs { action } => execute_outputs_command(&config, action),
        Commands::Completions { .. } => Ok(()),
    }
}

/// Apply global command-line flags on top of loaded configuration
pub fn apply_overrides(config: &mut CliConfig, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    if let Some(provider) = cli.provider {
        config.event_bus.provider = provider;
    }
    if let Some(region) = &cli.region {
        config.event_bus.region = Some(region.clone());
    }
    if let Some(endpoint_url) = &cli.endpoint_url {
        config.event_bus.endpoint_url = Some(endpoint_url.clone());
    }
    if let Some(file) = &cli.outputs_file {
        config.outputs.file = Some(file.clone());
    }
    if let Some(root) = &cli.search_root {
        config.outputs.search_root = root.clone();
    }
    if let Some(stack) = &cli.stack {
        config.outputs.stack_name = stack.clone();
    }
}

/// Install the tracing subscriber; logs go to stderr
///
/// `RUST_LOG` takes precedence over the configured level.
fn initialize_logging(logging: &settings::LoggingConfig) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| ConfigError::Invalid {
            key: "logging.level".to_string(),
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

// ============================================================================
// Command Implementations
// ============================================================================

fn load_outputs(config: &CliConfig) -> Result<StackOutputs, CliError> {
    let outputs = &config.outputs;
    let loaded = match &outputs.file {
        Some(path) => StackOutputs::load(path, &outputs.stack_name)?,
        None => StackOutputs::discover(
            &outputs.search_root,
            &outputs.file_name,
            &outputs.stack_name,
        )?,
    };
    Ok(loaded)
}

async fn create_provider(config: &CliConfig) -> Result<Arc<dyn EventBusProvider>, CliError> {
    Ok(EventBusClientFactory::create_provider(config.event_bus.provider_config()).await?)
}

/// Execute publish command
async fn execute_publish_command(
    config: &CliConfig,
    count: Option<usize>,
    event_bus: Option<String>,
) -> Result<(), CliError> {
    let count = count.unwrap_or(config.publish.count);
    let event_bus = match event_bus {
        Some(event_bus) => event_bus,
        None => load_outputs(config)?.resolve(OutputVariable::EventBusName)?,
    };

    info!(count, event_bus = %event_bus, "Sending events");

    let provider = create_provider(config).await?;
    let publisher = EventPublisher::new(provider).with_template(config.publish.template());
    let event_ids = publisher.publish(count, &event_bus).await?;

    for event_id in event_ids {
        println!("{}", event_id);
    }
    Ok(())
}

/// Execute replay command
async fn execute_replay_command(config: &CliConfig) -> Result<(), CliError> {
    let targets = ReplayTargets::from_outputs(&load_outputs(config)?)?;
    let provider = create_provider(config).await?;
    let driver = ReplayDriver::new(provider, config.replay.settings());

    let (handle, signal) = cancel_channel();
    let listener = shutdown::spawn_signal_listener(handle);

    info!(
        archive = %targets.archive_arn,
        event_bus = %targets.event_bus_arn,
        rule = %targets.rule_name,
        "Starting replay"
    );
    let result = driver.run(&targets, &signal).await;
    listener.abort();

    let job = result?;
    let summary = serde_json::to_string_pretty(&job).map_err(|e| CliError::Output {
        message: e.to_string(),
    })?;
    println!("{}", summary);
    Ok(())
}

fn read_payload(input: Option<PathBuf>) -> Result<String, CliError> {
    let payload = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    Ok(payload)
}

/// Execute wait-time command
fn execute_wait_time_command(input: Option<PathBuf>) -> Result<(), CliError> {
    let wait = wait_time::handle_json(&read_payload(input)?)?;
    println!("{}", wait);
    Ok(())
}

/// Execute process command
async fn execute_process_command(
    config: &CliConfig,
    input: Option<PathBuf>,
    event_bus: Option<String>,
) -> Result<(), CliError> {
    let payload: WaitTimeInput = serde_json::from_str(&read_payload(input)?)
        .map_err(|source| WaitTimeError::Decode { source })?;
    let event_bus = match event_bus {
        Some(event_bus) => event_bus,
        None => load_outputs(config)?.resolve(OutputVariable::EventBusArn)?,
    };

    let provider = create_provider(config).await?;
    let processor = ReplayedEventProcessor::new(provider, event_bus);

    let (handle, signal) = cancel_channel();
    let listener = shutdown::spawn_signal_listener(handle);
    let result = processor.process(&payload, &signal).await;
    listener.abort();

    let processed = result?;
    let summary = serde_json::to_string_pretty(&processed).map_err(|e| CliError::Output {
        message: e.to_string(),
    })?;
    println!("{}", summary);
    Ok(())
}

/// Execute outputs command
fn execute_outputs_command(config: &CliConfig, action: OutputsCommands) -> Result<(), CliError> {
    let outputs = load_outputs(config)?;

    match action {
        OutputsCommands::Get { variable } => {
            println!("{}", outputs.resolve_name(&variable)?);
        }
        OutputsCommands::Show { format } => {
            let values = outputs.resolve_all()?;
            println!("{}", render_outputs(&values, format)?);
        }
    }
    Ok(())
}

/// Render resolved outputs in the requested format
pub fn render_outputs(
    values: &[(OutputVariable, String)],
    format: OutputFormat,
) -> Result<String, CliError> {
    let output_error = |message: String| CliError::Output { message };

    match format {
        OutputFormat::Text => Ok(values
            .iter()
            .map(|(variable, value)| format!("{}={}", variable, value))
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => {
            let map: BTreeMap<&str, &str> = values
                .iter()
                .map(|(variable, value)| (variable.field_name(), value.as_str()))
                .collect();
            serde_json::to_string_pretty(&map).map_err(|e| output_error(e.to_string()))
        }
        OutputFormat::Yaml => {
            let map: BTreeMap<&str, &str> = values
                .iter()
                .map(|(variable, value)| (variable.field_name(), value.as_str()))
                .collect();
            serde_yaml::to_string(&map)
                .map(|rendered| rendered.trim_end().to_string())
                .map_err(|e| output_error(e.to_string()))
        }
    }
}

/// Execute completions command
fn execute_completions_command(shell: clap_complete::Shell) -> Result<(), CliError> {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "archive-replay", &mut std::io::stdout());
    Ok(())
}
