use crate::errors::{AutomationError, Result};
use headless_chrome::Tab;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct JavaScriptRunner;

impl JavaScriptRunner {
    /// `raw` as a JavaScript string literal.
    pub fn js_string(raw: &str) -> String {
        Value::String(raw.to_string()).to_string()
    }

    /// Evaluate `script` on a blocking thread and return its primitive value.
    pub async fn execute(tab: &Arc<Tab>, script: &str) -> Result<Value> {
        let tab = Arc::clone(tab);
        let script = script.to_string();
        let object = tokio::task::spawn_blocking(move || tab.evaluate(&script, true))
            .await
            .map_err(|e| AutomationError::JavaScriptFailed(e.to_string()))?
            .map_err(|e| AutomationError::JavaScriptFailed(e.to_string()))?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    /// Evaluate an expression whose result is serialized in the page and decoded here,
    /// so objects and arrays survive the protocol round trip.
    pub async fn execute_json<T: DeserializeOwned>(tab: &Arc<Tab>, expression: &str) -> Result<T> {
        let script = format!("Promise.resolve({}).then(v => JSON.stringify(v === undefined ? null : v))", expression);
        let value = Self::execute(tab, &script).await?;
        let raw = value.as_str().ok_or_else(|| {
            AutomationError::JavaScriptFailed(format!("expected a JSON string, got {}", value))
        })?;
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn execute_with_timeout(tab: &Arc<Tab>, script: &str, timeout_ms: u64) -> Result<Value> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), Self::execute(tab, script))
            .await
            .map_err(|_| AutomationError::Timeout(timeout_ms))?
    }

    /// Poll a boolean expression until it holds or `timeout_ms` elapses.
    pub async fn wait_for_condition(
        tab: &Arc<Tab>,
        condition: &str,
        timeout_ms: u64,
        poll_interval_ms: u64,
    ) -> Result<bool> {
        let start_time = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let poll_interval = Duration::from_millis(poll_interval_ms);

        while start_time.elapsed() < timeout {
            // Evaluation errors while a document is being replaced are expected.
            if let Ok(Value::Bool(true)) = Self::execute(tab, condition).await {
                return Ok(true);
            }
            tokio::time::sleep(poll_interval).await;
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(JavaScriptRunner::js_string("a'b"), "\"a'b\"");
        assert_eq!(JavaScriptRunner::js_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }
}
