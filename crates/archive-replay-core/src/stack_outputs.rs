//! # Stack Outputs
//!
//! Resolves deployment identifiers (bus, archive, rule, role and state machine
//! references) from the outputs document written by the provisioning step.
//!
//! The document is a JSON object keyed by stack name, each stack holding a
//! record of string fields:
//!
//! ```json
//! { "InfraStack": { "eventBusArn": "...", "replayRuleName": "bus|rule", ... } }
//! ```
//!
//! The document is located once by a depth-first search below a root
//! directory and then reused for every lookup.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(test)]
#[path = "stack_outputs_tests.rs"]
mod tests;

/// File name the provisioning step writes its outputs to
pub const OUTPUTS_FILE_NAME: &str = "outputs.json";

/// Stack whose outputs are read
pub const DEFAULT_STACK_NAME: &str = "InfraStack";

/// Separates the bus prefix from the rule name in `replayRuleName`
pub const RULE_NAME_DELIMITER: char = '|';

// ============================================================================
// Variables
// ============================================================================

/// A recognized output variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputVariable {
    EventBusArchiveName,
    EventBusArchiveArn,
    EventBusName,
    EventBusArn,
    ReplayRuleRoleArn,
    ReplayStateMachineArn,
    /// Stored as `<prefix>|<ruleName>`; resolves to the rule name
    ReplayRuleName,
}

impl OutputVariable {
    pub const ALL: [OutputVariable; 7] = [
        Self::EventBusArchiveName,
        Self::EventBusArchiveArn,
        Self::EventBusName,
        Self::EventBusArn,
        Self::ReplayRuleRoleArn,
        Self::ReplayStateMachineArn,
        Self::ReplayRuleName,
    ];

    /// Field name in the outputs document
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::EventBusArchiveName => "eventBusArchiveName",
            Self::EventBusArchiveArn => "eventBusArchiveArn",
            Self::EventBusName => "eventBusName",
            Self::EventBusArn => "eventBusArn",
            Self::ReplayRuleRoleArn => "replayRuleRoleArn",
            Self::ReplayStateMachineArn => "replayStateMachineArn",
            Self::ReplayRuleName => "replayRuleName",
        }
    }
}

impl fmt::Display for OutputVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for OutputVariable {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|variable| variable.field_name() == s)
            .ok_or_else(|| ConfigError::UnknownVariable {
                name: s.to_string(),
            })
    }
}

// ============================================================================
// Outputs document
// ============================================================================

/// Outputs of one stack as written by the provisioning step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StackRecord {
    event_bus_archive_name: String,
    event_bus_archive_arn: String,
    event_bus_name: String,
    event_bus_arn: String,
    replay_rule_role_arn: String,
    replay_state_machine_arn: String,
    replay_rule_name: String,
}

impl StackRecord {
    fn raw(&self, variable: OutputVariable) -> &str {
        match variable {
            OutputVariable::EventBusArchiveName => &self.event_bus_archive_name,
            OutputVariable::EventBusArchiveArn => &self.event_bus_archive_arn,
            OutputVariable::EventBusName => &self.event_bus_name,
            OutputVariable::EventBusArn => &self.event_bus_arn,
            OutputVariable::ReplayRuleRoleArn => &self.replay_rule_role_arn,
            OutputVariable::ReplayStateMachineArn => &self.replay_state_machine_arn,
            OutputVariable::ReplayRuleName => &self.replay_rule_name,
        }
    }
}

/// Resolved outputs of a single stack, loaded once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputs {
    path: PathBuf,
    stack_name: String,
    record: StackRecord,
}

impl StackOutputs {
    /// Search `root` for the outputs document and load `stack_name` from it
    pub fn discover(root: &Path, file_name: &str, stack_name: &str) -> Result<Self, ConfigError> {
        let path = find_outputs_file(root, file_name)?;
        Self::load(&path, stack_name)
    }

    /// Load `stack_name` from the outputs document at `path`
    ///
    /// # Errors
    /// - `ConfigError::Io` - file cannot be read
    /// - `ConfigError::Decode` - file is not a JSON object of records
    /// - `ConfigError::StackNotFound` - stack key is absent
    pub fn load(path: &Path, stack_name: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut stacks: HashMap<String, Value> =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        let stack = stacks
            .remove(stack_name)
            .ok_or_else(|| ConfigError::StackNotFound {
                stack: stack_name.to_string(),
                path: path.to_path_buf(),
            })?;

        let record: StackRecord =
            serde_json::from_value(stack).map_err(|source| ConfigError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), stack = %stack_name, "Loaded stack outputs");

        Ok(Self {
            path: path.to_path_buf(),
            stack_name: stack_name.to_string(),
            record,
        })
    }

    /// Path the outputs were loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// Resolve a variable to its non-empty value
    ///
    /// `ReplayRuleName` is split on the first `|` and the trailing segment is
    /// returned.
    pub fn resolve(&self, variable: OutputVariable) -> Result<String, ConfigError> {
        let raw = self.record.raw(variable);
        if raw.is_empty() {
            return Err(ConfigError::MissingValue {
                variable,
                stack: self.stack_name.clone(),
            });
        }

        match variable {
            OutputVariable::ReplayRuleName => parse_rule_name(raw),
            _ => Ok(raw.to_string()),
        }
    }

    /// Resolve a variable given by its document field name
    pub fn resolve_name(&self, name: &str) -> Result<String, ConfigError> {
        self.resolve(name.parse()?)
    }

    /// Resolve every recognized variable, in declaration order
    pub fn resolve_all(&self) -> Result<Vec<(OutputVariable, String)>, ConfigError> {
        OutputVariable::ALL
            .iter()
            .map(|variable| Ok((*variable, self.resolve(*variable)?)))
            .collect()
    }
}

/// Take the rule name out of a `<prefix>|<ruleName>` value
pub fn parse_rule_name(raw: &str) -> Result<String, ConfigError> {
    match raw.split_once(RULE_NAME_DELIMITER) {
        Some((_, rule_name)) => Ok(rule_name.to_string()),
        None => Err(ConfigError::Parse {
            variable: OutputVariable::ReplayRuleName,
            value: raw.to_string(),
        }),
    }
}

/// Depth-first search below `root` for a file called `file_name`.
///
/// Entries are visited in lexical order and the first match wins.
pub fn find_outputs_file(root: &Path, file_name: &str) -> Result<PathBuf, ConfigError> {
    match search_dir(root, file_name)? {
        Some(path) => {
            debug!(path = %path.display(), "Found outputs document");
            Ok(path)
        }
        None => Err(ConfigError::NotFound {
            file_name: file_name.to_string(),
            root: root.to_path_buf(),
        }),
    }
}

fn search_dir(dir: &Path, file_name: &str) -> Result<Option<PathBuf>, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(io_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_type = entry.file_type().map_err(io_error)?;
        if file_type.is_dir() {
            if let Some(found) = search_dir(&entry.path(), file_name)? {
                return Ok(Some(found));
            }
        } else if entry.file_name() == file_name {
            return Ok(Some(entry.path()));
        }
    }

    Ok(None)
}

// ============================================================================
// Errors
// ============================================================================

/// Errors resolving deployment outputs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{file_name} not found under {root}")]
    NotFound { file_name: String, root: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stack {stack} not present in {path}")]
    StackNotFound { stack: String, path: PathBuf },

    #[error("Output {variable} is missing or empty in stack {stack}")]
    MissingValue {
        variable: OutputVariable,
        stack: String,
    },

    #[error("Unable to parse {variable}: expected '<prefix>|<name>', got {value:?}")]
    Parse {
        variable: OutputVariable,
        value: String,
    },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },
}
