use crate::actions::{ActionCommand, ActionType};
use crate::browser::MemoryPage;
use crate::core::{Config, ElementHandle, FieldWrite, PageDriver, WriteOutcome};
use crate::dom::Document;
use crate::engine::AutomationEngine;
use crate::errors::Result;
use crate::forms::ChangeFeed;
use crate::types::{PageCapabilities, ScreenshotRequest, Viewport};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

pub struct TestHelper;

impl TestHelper {
    /// Initialized engine over an in-memory page built from `html`.
    pub async fn engine(html: &str) -> Result<AutomationEngine> {
        Self::engine_with_config(html, Config::default()).await
    }

    pub async fn engine_with_config(html: &str, config: Config) -> Result<AutomationEngine> {
        Self::engine_with_page(MemoryPage::from_html(html), config).await
    }

    pub async fn engine_with_page<P: PageDriver + 'static>(page: P, config: Config) -> Result<AutomationEngine> {
        let mut engine = AutomationEngine::new(Box::new(page), config)?;
        engine.initialize().await?;
        Ok(engine)
    }

    /// Run a future to completion outside of an async test.
    pub fn block_on<F: Future>(future: F) -> F::Output {
        tokio_test::block_on(future)
    }

    pub fn fill_form_command(form_id: Option<&str>, fields: Value) -> ActionCommand {
        let command = ActionCommand::new(ActionType::FillForm).param("fields", fields);
        match form_id {
            Some(id) => command.param("formId", id),
            None => command,
        }
    }

    pub fn click_command(description: &str) -> ActionCommand {
        ActionCommand::new(ActionType::Click).param("description", description)
    }

    pub async fn snapshot(engine: &mut AutomationEngine) -> Result<Document> {
        engine.page_mut().snapshot().await
    }

    /// Whether `selector` matches anything in the engine's current page.
    pub async fn exists(engine: &mut AutomationEngine, selector: &str) -> Result<bool> {
        let doc = Self::snapshot(engine).await?;
        Ok(doc.select_first(selector)?.is_some())
    }
}

/// In-memory page whose clicks never complete.
pub struct StallingPage {
    inner: MemoryPage,
}

impl StallingPage {
    pub fn from_html(html: &str) -> Self {
        Self {
            inner: MemoryPage::from_html(html),
        }
    }
}

#[async_trait]
impl PageDriver for StallingPage {
    async fn snapshot(&mut self) -> Result<Document> {
        self.inner.snapshot().await
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.inner.navigate(url).await
    }

    async fn wait_for_load(&mut self, timeout: Duration) -> Result<()> {
        self.inner.wait_for_load(timeout).await
    }

    async fn click(&mut self, _target: &ElementHandle) -> Result<()> {
        std::future::pending::<Result<()>>().await
    }

    async fn apply_writes(&mut self, batch: &[FieldWrite]) -> Result<Vec<WriteOutcome>> {
        self.inner.apply_writes(batch).await
    }

    async fn submit(&mut self, form: &ElementHandle) -> Result<()> {
        self.inner.submit(form).await
    }

    async fn screenshot(&mut self, request: &ScreenshotRequest) -> Result<Vec<u8>> {
        self.inner.screenshot(request).await
    }

    async fn url(&mut self) -> Result<String> {
        self.inner.url().await
    }

    async fn title(&mut self) -> Result<String> {
        self.inner.title().await
    }

    async fn viewport(&mut self) -> Result<Viewport> {
        self.inner.viewport().await
    }

    async fn attach_change_feed(&mut self, feed: ChangeFeed) -> Result<()> {
        self.inner.attach_change_feed(feed).await
    }

    fn capabilities(&self) -> PageCapabilities {
        self.inner.capabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn select_fill_replaces_selected_option() {
        let mut engine = TestHelper::engine(
            r#"<form id="shipping">
                 <select name="country">
                   <option value="US">United States</option>
                   <option value="CA" selected>Canada</option>
                 </select>
               </form>"#,
        )
        .await
        .unwrap();

        let result = engine
            .execute_action(&TestHelper::fill_form_command(Some("shipping"), json!({"country": "US"})))
            .await
            .unwrap();
        assert!(result.success(), "{:?}", result.error());
        let data = result.data().unwrap();
        assert_eq!(data["filledFields"], json!(["country"]));
        assert_eq!(data["failedFields"], json!([]));

        let doc = TestHelper::snapshot(&mut engine).await.unwrap();
        let us = doc.select_first(r#"option[value="US"]"#).unwrap().unwrap();
        let ca = doc.select_first(r#"option[value="CA"]"#).unwrap().unwrap();
        assert!(doc.has_attr(us, "selected"));
        assert!(!doc.has_attr(ca, "selected"));
    }

    #[tokio::test]
    async fn fill_any_form_picks_the_largest_overlap() {
        let mut engine = TestHelper::engine(
            r#"<form id="newsletter"><input name="email"></form>
               <form id="signup">
                 <input name="email"><input name="name"><input name="password" type="password">
               </form>"#,
        )
        .await
        .unwrap();

        let result = engine
            .execute_action(&TestHelper::fill_form_command(None, json!({"email": "a@b.co", "name": "Ada"})))
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(result.data().unwrap()["formId"], "signup");
        assert!(TestHelper::exists(&mut engine, r#"#signup input[value="Ada"]"#).await.unwrap());
        assert!(!TestHelper::exists(&mut engine, r#"#newsletter input[value="a@b.co"]"#).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_one_record() {
        let mut config = Config::default();
        config.engine.auto_detect_forms = false;
        let mut engine = TestHelper::engine_with_config(
            "<form id='f'><input name='user'></form>",
            config,
        )
        .await
        .unwrap();

        engine.register_form("login", "#f").await.unwrap();
        let err = assert_err!(engine.register_form("login", "#f").await);
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(engine.forms().ids(), vec!["login".to_string()]);
    }

    #[tokio::test]
    async fn click_reaches_a_nested_button() {
        let mut engine = TestHelper::engine(
            r#"<div class="card"><div class="card-body">
                 <h3>Pro plan</h3><button class="btn">Buy now</button>
               </div></div>"#,
        )
        .await
        .unwrap();

        let result = engine
            .execute_action(&TestHelper::click_command("Buy now"))
            .await
            .unwrap();
        assert!(result.success(), "{:?}", result.error());

        let selector = result.data().unwrap()["selector"].as_str().unwrap().to_string();
        let doc = TestHelper::snapshot(&mut engine).await.unwrap();
        let node = doc.select_first(&selector).unwrap().unwrap();
        assert_eq!(doc.tag(node), Some("button"));
    }

    #[tokio::test]
    async fn click_on_a_matched_container_substitutes_its_button() {
        let mut engine = TestHelper::engine(
            r#"<div class="card" aria-label="Checkout">
                 <h3>Pro plan</h3><p>Billed yearly</p><button class="btn">Buy now</button>
               </div>"#,
        )
        .await
        .unwrap();

        let result = engine
            .execute_action(&TestHelper::click_command("Checkout"))
            .await
            .unwrap();
        assert!(result.success(), "{:?}", result.error());

        let data = result.data().unwrap();
        assert_eq!(data["tier"], 4);
        assert_eq!(data["matchReason"], "aria_label");
        assert_eq!(data["substituted"], true);

        let selector = data["selector"].as_str().unwrap().to_string();
        let doc = TestHelper::snapshot(&mut engine).await.unwrap();
        let node = doc.select_first(&selector).unwrap().unwrap();
        assert_eq!(doc.tag(node), Some("button"));
        assert_eq!(doc.text_content(node), "Buy now");
    }

    async fn stalled_batch(debug: bool) -> Vec<crate::actions::ExecutionResult> {
        let config = Config::default().with_debug(debug);
        let mut engine = TestHelper::engine_with_page(StallingPage::from_html("<button>Go</button>"), config)
            .await
            .unwrap();
        let commands = vec![
            TestHelper::click_command("Go").timeout(50),
            ActionCommand::new(ActionType::Wait).param("duration", 1),
        ];
        engine.execute_actions(&commands).await.unwrap()
    }

    #[tokio::test]
    async fn timeout_respects_fail_fast() {
        let strict = stalled_batch(true).await;
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].error_code(), Some(ErrorKind::ExecutionTimeout));

        let relaxed = stalled_batch(false).await;
        assert_eq!(relaxed.len(), 2);
        assert_eq!(relaxed[0].error_code(), Some(ErrorKind::ExecutionTimeout));
        assert!(relaxed[1].success());
    }

    #[tokio::test]
    async fn unsupported_types_are_rejected() {
        let mut engine = TestHelper::engine("<p>hello</p>").await.unwrap();

        let result = engine
            .execute_raw(json!({"type": "hover", "parameters": {"selector": "p"}}))
            .await
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.error_code(), Some(ErrorKind::ValidationFailed));

        engine.executor_mut().registry_mut().unregister(ActionType::Screenshot);
        let result = engine
            .execute_action(&ActionCommand::new(ActionType::Screenshot))
            .await
            .unwrap();
        assert_eq!(result.error_code(), Some(ErrorKind::InvalidAction));
        assert!(TestHelper::exists(&mut engine, "p").await.unwrap());
    }

    #[test]
    fn block_on_drives_setup() {
        let engine = TestHelper::block_on(TestHelper::engine("<form id='x'><input name='q'></form>"));
        assert_eq!(engine.unwrap().forms().len(), 1);
    }
}
