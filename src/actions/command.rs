use crate::errors::{AutomationError, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The closed set of commands the executor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Navigate,
    Click,
    Fill,
    FillForm,
    SubmitForm,
    Screenshot,
    Wait,
}

impl ActionType {
    pub const ALL: [ActionType; 7] = [
        ActionType::Navigate,
        ActionType::Click,
        ActionType::Fill,
        ActionType::FillForm,
        ActionType::SubmitForm,
        ActionType::Screenshot,
        ActionType::Wait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Fill => "fill",
            ActionType::FillForm => "fillForm",
            ActionType::SubmitForm => "submitForm",
            ActionType::Screenshot => "screenshot",
            ActionType::Wait => "wait",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AutomationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AutomationError::ValidationFailed(format!("unsupported action type '{}'", wanted)))
    }
}

/// One declarative instruction. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionCommand {
    #[serde(rename = "type")]
    action_type: ActionType,
    parameters: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Deserialize)]
struct RawCommand {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default, alias = "params")]
    parameters: Map<String, Value>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    description: Option<String>,
}

impl ActionCommand {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            parameters: Map::new(),
            timeout: None,
            description: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parse a command object. An unknown `type` is rejected with `VALIDATION_FAILED`.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawCommand = serde_json::from_value(value)
            .map_err(|e| AutomationError::ValidationFailed(format!("malformed action command: {}", e)))?;
        Ok(Self {
            action_type: raw.action_type.parse()?,
            parameters: raw.parameters,
            timeout: raw.timeout,
            description: raw.description,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AutomationError::ValidationFailed(format!("malformed action command: {}", e)))?;
        Self::from_value(value)
    }

    /// Parse a JSON array of commands, failing on the first malformed entry.
    pub fn batch_from_json_str(json: &str) -> Result<Vec<Self>> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AutomationError::ValidationFailed(format!("malformed action batch: {}", e)))?;
        match value {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            _ => Err(AutomationError::ValidationFailed(
                "action batch must be a JSON array".to_string(),
            )),
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// Non-blank string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.param_str(key).ok_or_else(|| {
            AutomationError::ValidationFailed(format!(
                "{} requires a non-empty '{}' parameter",
                self.action_type, key
            ))
        })
    }

    /// Unsigned number, also accepted as a numeric string.
    pub fn param_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.parameters.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| self.bad_param(key, "a non-negative integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| self.bad_param(key, "a non-negative integer")),
            Some(_) => Err(self.bad_param(key, "a non-negative integer")),
        }
    }

    pub fn param_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.parameters.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(self.bad_param(key, "a boolean")),
            },
            Some(_) => Err(self.bad_param(key, "a boolean")),
        }
    }

    fn bad_param(&self, key: &str, expected: &str) -> AutomationError {
        AutomationError::ValidationFailed(format!(
            "{} parameter '{}' must be {}",
            self.action_type, key, expected
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Outcome of one command, produced once by the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    success: bool,
    status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    action_type: Option<ActionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorKind>,
    timestamp: i64,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    screenshot: Option<String>,
}

impl ExecutionResult {
    pub fn completed(action_type: ActionType, data: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            status: ActionStatus::Completed,
            action_type: Some(action_type),
            data: (!data.is_null()).then_some(data),
            error: None,
            error_code: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
            duration_ms,
            screenshot: None,
        }
    }

    pub fn failed(action_type: Option<ActionType>, err: &AutomationError, duration_ms: u64) -> Self {
        Self {
            success: false,
            status: ActionStatus::Failed,
            action_type,
            data: err.data(),
            error: Some(err.to_string()),
            error_code: Some(err.kind()),
            timestamp: chrono::Utc::now().timestamp_millis(),
            duration_ms,
            screenshot: None,
        }
    }

    /// Attach a base64 diagnostic screenshot.
    pub fn with_screenshot(mut self, screenshot: String) -> Self {
        self.screenshot = Some(screenshot);
        self
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn action_type(&self) -> Option<ActionType> {
        self.action_type
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_code(&self) -> Option<ErrorKind> {
        self.error_code
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn screenshot(&self) -> Option<&str> {
        self.screenshot.as_deref()
    }
}
