use crate::forms::FormFillResult;
use crate::locator::CandidateSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Caller-facing error taxonomy carried in `ExecutionResult::error_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidAction,
    ElementNotFound,
    FormNotFound,
    FieldNotFound,
    ExecutionTimeout,
    ExecutionFailed,
    NetworkError,
    PermissionDenied,
    InvalidConfiguration,
    ScreenshotFailed,
    ValidationFailed,
    BrowserNotSupported,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAction => "INVALID_ACTION",
            ErrorKind::ElementNotFound => "ELEMENT_NOT_FOUND",
            ErrorKind::FormNotFound => "FORM_NOT_FOUND",
            ErrorKind::FieldNotFound => "FIELD_NOT_FOUND",
            ErrorKind::ExecutionTimeout => "EXECUTION_TIMEOUT",
            ErrorKind::ExecutionFailed => "EXECUTION_FAILED",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorKind::ScreenshotFailed => "SCREENSHOT_FAILED",
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::BrowserNotSupported => "BROWSER_NOT_SUPPORTED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Element not found: {query}")]
    ElementNotFound {
        query: String,
        candidates: Vec<CandidateSummary>,
    },

    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Form already registered: {0}")]
    DuplicateForm(String),

    #[error("Form registry is at capacity ({0} forms)")]
    RegistryFull(usize),

    #[error("Not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("Already initialized: {0}")]
    AlreadyInitialized(&'static str),

    #[error("Disposed: {0}")]
    Disposed(&'static str),

    #[error("Execution timed out after {0} ms")]
    Timeout(u64),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Form fill incomplete: {} of {} field(s) failed", .0.failed_fields.len(), .0.fields_count)]
    FillIncomplete(Box<FormFillResult>),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Browser not supported: {0}")]
    BrowserNotSupported(String),

    #[error("Event listener failed: {0}")]
    ListenerFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Chrome error: {0}")]
    ChromeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, AutomationError>;

// Convert anyhow::Error to AutomationError
impl From<anyhow::Error> for AutomationError {
    fn from(err: anyhow::Error) -> Self {
        AutomationError::AnyhowError(err.to_string())
    }
}

impl AutomationError {
    pub fn from_any_error<E: fmt::Display>(err: E) -> Self {
        AutomationError::ChromeError(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomationError::InvalidAction(_) => ErrorKind::InvalidAction,
            AutomationError::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            AutomationError::FormNotFound(_) => ErrorKind::FormNotFound,
            AutomationError::FieldNotFound(_) => ErrorKind::FieldNotFound,
            AutomationError::DuplicateForm(_) => ErrorKind::ValidationFailed,
            AutomationError::RegistryFull(_)
            | AutomationError::NotInitialized(_)
            | AutomationError::AlreadyInitialized(_)
            | AutomationError::Disposed(_)
            | AutomationError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            AutomationError::Timeout(_) => ErrorKind::ExecutionTimeout,
            AutomationError::NavigationFailed(_) => ErrorKind::NetworkError,
            AutomationError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AutomationError::ScreenshotFailed(_) => ErrorKind::ScreenshotFailed,
            AutomationError::ValidationFailed(_)
            | AutomationError::InvalidSelector(_)
            | AutomationError::SerializationError(_) => ErrorKind::ValidationFailed,
            AutomationError::BrowserNotSupported(_) => ErrorKind::BrowserNotSupported,
            AutomationError::ExecutionFailed(_)
            | AutomationError::FillIncomplete(_)
            | AutomationError::ListenerFailed(_)
            | AutomationError::JavaScriptFailed(_)
            | AutomationError::ChromeError(_)
            | AutomationError::IoError(_)
            | AutomationError::AnyhowError(_) => ErrorKind::ExecutionFailed,
        }
    }

    /// Structured payload that should travel with a failed result.
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            AutomationError::FillIncomplete(result) => serde_json::to_value(result.as_ref()).ok(),
            AutomationError::ElementNotFound { candidates, .. } if !candidates.is_empty() => {
                serde_json::to_value(candidates).ok().map(|candidates| {
                    serde_json::json!({ "candidates": candidates })
                })
            }
            _ => None,
        }
    }

    /// Lifecycle and contract violations that are surfaced to callers as hard errors.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AutomationError::NotInitialized(_) | AutomationError::Disposed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_in_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ElementNotFound).unwrap();
        assert_eq!(json, "\"ELEMENT_NOT_FOUND\"");
        assert_eq!(ErrorKind::ExecutionTimeout.to_string(), "EXECUTION_TIMEOUT");
    }

    #[test]
    fn registry_violations_map_to_configuration_errors() {
        assert_eq!(
            AutomationError::NotInitialized("registry").kind(),
            ErrorKind::InvalidConfiguration
        );
        assert_eq!(AutomationError::RegistryFull(3).kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(
            AutomationError::DuplicateForm("f1".into()).kind(),
            ErrorKind::ValidationFailed
        );
    }
}
