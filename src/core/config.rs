use crate::errors::{AutomationError, Result};
use crate::types::Viewport;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub forms: FormConfig,
    pub browser: BrowserConfig,
    pub wait: WaitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fail-fast batches and fatal listener errors.
    pub debug: bool,
    pub default_timeout_ms: u64,
    pub screenshot_on_error: bool,
    pub max_context_elements: usize,
    pub auto_detect_forms: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub max_forms: usize,
    pub debounce_ms: u64,
    pub track_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub args: Vec<String>,
    pub navigation_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub poll_interval_ms: u64,
    pub max_wait_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_timeout_ms: 30000,
            screenshot_on_error: false,
            max_context_elements: 200,
            auto_detect_forms: true,
        }
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            max_forms: 50,
            debounce_ms: 300,
            track_changes: true,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            args: vec![],
            navigation_timeout_ms: 10000,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_wait_ms: 10000,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| AutomationError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.engine.default_timeout_ms == 0, "engine.default_timeout_ms must be > 0"),
            (self.forms.max_forms == 0, "forms.max_forms must be > 0"),
            (self.wait.poll_interval_ms == 0, "wait.poll_interval_ms must be > 0"),
            (
                self.browser.navigation_timeout_ms == 0,
                "browser.navigation_timeout_ms must be > 0",
            ),
            (
                self.browser.viewport.width == 0 || self.browser.viewport.height == 0,
                "browser.viewport must have a non-zero size",
            ),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(AutomationError::InvalidConfiguration(message.to_string())),
            None => Ok(()),
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.engine.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = Config::from_json_str(r#"{"engine": {"debug": true}, "forms": {"max_forms": 3}}"#)
            .unwrap();
        assert!(config.engine.debug);
        assert_eq!(config.engine.default_timeout_ms, 30000);
        assert_eq!(config.forms.max_forms, 3);
        assert_eq!(config.forms.debounce_ms, 300);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Config::from_json_str(r#"{"forms": {"max_forms": 0}}"#).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidConfiguration(_)));
    }
}
