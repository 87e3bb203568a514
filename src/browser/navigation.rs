use crate::errors::{AutomationError, Result};
use crate::utils::javascript::JavaScriptRunner;
use headless_chrome::Tab;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

const READY_POLL_MS: u64 = 50;

pub struct NavigationManager;

impl NavigationManager {
    /// Wait until the current document reports `readyState === "complete"`.
    pub async fn wait_for_navigation_complete(tab: &Arc<Tab>, timeout_ms: u64) -> Result<NavigationResult> {
        let start_time = Instant::now();
        let loaded = JavaScriptRunner::wait_for_condition(
            tab,
            "document.readyState === 'complete'",
            timeout_ms,
            READY_POLL_MS,
        )
        .await?;
        if !loaded {
            return Err(AutomationError::Timeout(timeout_ms));
        }

        let state: PageState =
            JavaScriptRunner::execute_json(tab, "({readyState: document.readyState, url: location.href})").await?;
        Ok(NavigationResult {
            url: state.url,
            ready_state: state.ready_state,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageState {
    ready_state: String,
    url: String,
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub ready_state: String,
    pub duration_ms: u64,
}
