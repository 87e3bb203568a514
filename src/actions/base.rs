use crate::actions::command::{ActionCommand, ActionType};
use crate::core::{Config, PageDriver};
use crate::errors::{AutomationError, Result};
use crate::forms::{FormRegistry, SyncReport};
use crate::locator::ElementResolver;
use async_trait::async_trait;
use serde_json::Value;

/// Handler for one action type
#[async_trait]
pub trait Action: Send + Sync {
    /// Type this handler is registered under
    fn action_type(&self) -> ActionType;

    /// Description of what the action does
    fn description(&self) -> &str;

    /// Parameter schema for callers and tooling
    fn parameter_schema(&self) -> Value;

    /// Check parameters before anything touches the page
    fn validate_params(&self, _command: &ActionCommand) -> Result<()> {
        Ok(())
    }

    /// Execute the action, returning the `data` payload of the result
    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value>;
}

/// Everything a handler may touch while it runs
pub struct ActionContext<'a> {
    pub page: &'a mut dyn PageDriver,
    pub forms: &'a mut FormRegistry,
    pub resolver: &'a ElementResolver,
    pub config: &'a Config,
    /// Registry changes made by auto-detection during the action
    pub detected: Option<SyncReport>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        page: &'a mut dyn PageDriver,
        forms: &'a mut FormRegistry,
        resolver: &'a ElementResolver,
        config: &'a Config,
    ) -> Self {
        Self {
            page,
            forms,
            resolver,
            config,
            detected: None,
        }
    }

    /// Re-scan the page for forms when auto-detection is on.
    pub async fn detect_forms(&mut self) -> Result<()> {
        if !self.config.engine.auto_detect_forms {
            return Ok(());
        }
        let doc = self.page.snapshot().await?;
        let report = self.forms.sync_detected(&doc)?;
        match self.detected.as_mut() {
            Some(existing) => {
                existing.added.extend(report.added);
                existing.removed.extend(report.removed);
                existing.updated.extend(report.updated);
            }
            None => self.detected = Some(report),
        }
        Ok(())
    }
}

/// Shared check for handlers that target one element. The command's own description
/// counts as a target description when no parameter supplies one.
pub(crate) fn require_target(command: &ActionCommand) -> Result<()> {
    let described = command
        .description_text()
        .map(str::trim)
        .map(|d| !d.is_empty())
        .unwrap_or(false);
    if !described && command.param_str("description").is_none() && command.param_str("selector").is_none() {
        return Err(AutomationError::ValidationFailed(format!(
            "{} requires a 'description' or a 'selector'",
            command.action_type()
        )));
    }
    Ok(())
}
