//! Rule target types and input transforms.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;

/// Maps a matched event into the payload delivered to a target.
///
/// `input_paths_map` binds placeholder names to JSON paths (`$` for the whole
/// event, `$.detail.id` for nested fields). Each `<name>` in the template is
/// replaced by the JSON text of the bound value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTransformer {
    pub input_paths_map: BTreeMap<String, String>,
    pub input_template: String,
}

impl InputTransformer {
    pub fn new(input_template: impl Into<String>) -> Self {
        Self {
            input_paths_map: BTreeMap::new(),
            input_template: input_template.into(),
        }
    }

    /// Bind a placeholder name to a JSON path
    pub fn with_path(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.input_paths_map.insert(name.into(), path.into());
        self
    }

    /// Render the template against a matched event
    pub fn render(&self, event: &Value) -> Result<String, BusError> {
        let mut rendered = self.input_template.clone();
        for (name, path) in &self.input_paths_map {
            let value = resolve_path(event, path)?;
            let text = serde_json::to_string(value.unwrap_or(&Value::Null)).map_err(|e| {
                BusError::InputTransform {
                    message: format!("cannot encode value for <{}>: {}", name, e),
                }
            })?;
            rendered = rendered.replace(&format!("<{}>", name), &text);
        }
        Ok(rendered)
    }
}

/// Resolve a `$`-rooted dotted path against a JSON document.
fn resolve_path<'a>(event: &'a Value, path: &str) -> Result<Option<&'a Value>, BusError> {
    let rest = path
        .strip_prefix('$')
        .ok_or_else(|| BusError::InputTransform {
            message: format!("path must start with '$': {}", path),
        })?;

    if rest.is_empty() {
        return Ok(Some(event));
    }

    let rest = rest.strip_prefix('.').ok_or_else(|| BusError::InputTransform {
        message: format!("unsupported path syntax: {}", path),
    })?;
    let pointer: String = rest.split('.').map(|segment| format!("/{}", segment)).collect();
    Ok(event.pointer(&pointer))
}

/// Delivery retry behaviour for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub maximum_retry_attempts: u32,
}

impl RetryPolicy {
    /// Deliver once; rejected deliveries surface instead of being retried
    pub fn no_retries() -> Self {
        Self {
            maximum_retry_attempts: 0,
        }
    }
}

/// A routing association between a rule and a downstream endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTarget {
    /// Target identifier, unique within its rule
    pub id: String,
    /// Downstream endpoint, e.g. a state machine ARN
    pub arn: String,
    /// Execution identity used to invoke the target
    pub role_arn: String,
    pub input_transformer: InputTransformer,
    pub retry_policy: RetryPolicy,
}

/// Request to upsert targets on a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutTargetsRequest {
    pub rule: String,
    /// Name or ARN of the bus the rule lives on
    pub event_bus: String,
    pub targets: Vec<RuleTarget>,
}

/// A target the bus refused to attach
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailedTargetEntry {
    pub target_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl fmt::Display for FailedTargetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target {}: {} {}",
            self.target_id.as_deref().unwrap_or("<unknown>"),
            self.error_code.as_deref().unwrap_or_default(),
            self.error_message.as_deref().unwrap_or_default()
        )
    }
}

/// Outcome of a put-targets call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PutTargetsOutcome {
    pub failed_entry_count: usize,
    pub failed_entries: Vec<FailedTargetEntry>,
}
