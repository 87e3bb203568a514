use crate::actions::base::{Action, ActionContext};
use crate::actions::command::{ActionCommand, ExecutionResult};
use crate::actions::registry::ActionRegistry;
use crate::errors::{AutomationError, Result};
use crate::types::ScreenshotRequest;
use crate::utils::screenshot::ScreenshotManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DIAGNOSTIC_SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs commands through their handlers inside a timeout envelope.
pub struct ActionExecutor {
    registry: ActionRegistry,
}

impl ActionExecutor {
    pub fn new(registry: ActionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActionRegistry {
        &mut self.registry
    }

    /// Handler lookup plus parameter validation; nothing here touches the page.
    pub fn prepare(&self, command: &ActionCommand) -> Result<Arc<dyn Action>> {
        let handler = self.registry.get_action(command.action_type()).ok_or_else(|| {
            AutomationError::InvalidAction(format!("no handler for action type '{}'", command.action_type()))
        })?;
        if command.timeout_ms() == Some(0) {
            return Err(AutomationError::ValidationFailed(
                "timeout must be greater than 0 ms".to_string(),
            ));
        }
        handler.validate_params(command)?;
        Ok(handler)
    }

    /// Execute one command. Every failure is folded into the returned result.
    pub async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> ExecutionResult {
        let started = Instant::now();
        let action_type = command.action_type();

        let handler = match self.prepare(command) {
            Ok(handler) => handler,
            Err(err) => {
                warn!("rejected {} action: {}", action_type, err);
                return ExecutionResult::failed(Some(action_type), &err, elapsed_ms(started));
            }
        };

        let timeout_ms = command
            .timeout_ms()
            .unwrap_or(context.config.engine.default_timeout_ms);
        info!("executing {} (timeout {} ms)", action_type, timeout_ms);

        let outcome = match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            handler.execute(command, context),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AutomationError::Timeout(timeout_ms)),
        };

        let duration = elapsed_ms(started);
        match outcome {
            Ok(data) => {
                debug!("{} completed in {} ms", action_type, duration);
                ExecutionResult::completed(action_type, data, duration)
            }
            Err(err) => {
                warn!("{} failed after {} ms: {}", action_type, duration, err);
                let result = ExecutionResult::failed(Some(action_type), &err, duration);
                match self.diagnostic_screenshot(context).await {
                    Some(screenshot) => result.with_screenshot(screenshot),
                    None => result,
                }
            }
        }
    }

    /// Best-effort capture after a failure; any problem is only logged.
    async fn diagnostic_screenshot(&self, context: &mut ActionContext<'_>) -> Option<String> {
        if !context.config.engine.screenshot_on_error || !context.page.capabilities().supports_screenshots {
            return None;
        }
        let request = ScreenshotRequest::default();
        match tokio::time::timeout(
            DIAGNOSTIC_SCREENSHOT_TIMEOUT,
            ScreenshotManager::take_base64(&mut *context.page, &request),
        )
        .await
        {
            Ok(Ok(data)) => Some(data),
            Ok(Err(err)) => {
                debug!("diagnostic screenshot failed: {}", err);
                None
            }
            Err(_) => {
                debug!("diagnostic screenshot timed out");
                None
            }
        }
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(ActionRegistry::with_builtin())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
