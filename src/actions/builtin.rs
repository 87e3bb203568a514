//! Built-in handlers for every [`ActionType`].

use crate::actions::base::{require_target, Action, ActionContext};
use crate::actions::command::{ActionCommand, ActionType};
use crate::core::FieldWrite;
use crate::dom::inspect::is_skipped;
use crate::dom::{Document, SelectorList};
use crate::errors::{AutomationError, Result};
use crate::forms::fill::plan_for_element;
use crate::locator::{Purpose, Resolution, ResolveRequest};
use crate::types::{ImageFormat, Region, ScreenshotRequest};
use crate::utils::screenshot::ScreenshotManager;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

fn resolve_request(command: &ActionCommand, purpose: Purpose) -> ResolveRequest {
    ResolveRequest::new(
        command.param_str("description").or(command.description_text()),
        command.param_str("selector"),
        purpose,
    )
}

fn resolution_data(resolution: &Resolution) -> Value {
    json!({
        "selector": resolution.handle.selector,
        "matchReason": resolution.reason,
        "score": (resolution.score * 1000.0).round() / 1000.0,
        "tier": resolution.tier,
        "substituted": resolution.substituted_from.is_some(),
    })
}

pub struct NavigateAction;

#[async_trait]
impl Action for NavigateAction {
    fn action_type(&self) -> ActionType {
        ActionType::Navigate
    }

    fn description(&self) -> &str {
        "Navigate to a URL and optionally wait for the page to load"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute URL to open"},
                "waitForLoad": {"type": "boolean", "default": true}
            },
            "required": ["url"]
        })
    }

    fn validate_params(&self, command: &ActionCommand) -> Result<()> {
        let raw = command.require_str("url")?;
        url::Url::parse(raw)
            .map_err(|e| AutomationError::ValidationFailed(format!("invalid url '{}': {}", raw, e)))?;
        command.param_bool("waitForLoad")?;
        Ok(())
    }

    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value> {
        let url = command.require_str("url")?;
        context.page.navigate(url).await?;

        if command.param_bool("waitForLoad")?.unwrap_or(true) {
            let timeout = Duration::from_millis(context.config.browser.navigation_timeout_ms);
            context.page.wait_for_load(timeout).await?;
        }
        context.detect_forms().await?;

        let current = context.page.url().await?;
        let title = context.page.title().await?;
        info!("navigated to {}", current);
        Ok(json!({"url": current, "title": title}))
    }
}

pub struct ClickAction;

#[async_trait]
impl Action for ClickAction {
    fn action_type(&self) -> ActionType {
        ActionType::Click
    }

    fn description(&self) -> &str {
        "Click an element found by description or selector"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {"type": "string"},
                "selector": {"type": "string"}
            }
        })
    }

    fn validate_params(&self, command: &ActionCommand) -> Result<()> {
        require_target(command)
    }

    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value> {
        let doc = context.page.snapshot().await?;
        let resolution = context
            .resolver
            .resolve(&doc, &resolve_request(command, Purpose::Click))?;
        context.page.click(&resolution.handle).await?;
        debug!("clicked {}", resolution.handle.selector);
        Ok(resolution_data(&resolution))
    }
}

pub struct FillAction;

#[async_trait]
impl Action for FillAction {
    fn action_type(&self) -> ActionType {
        ActionType::Fill
    }

    fn description(&self) -> &str {
        "Fill a single control found by description or selector"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {"type": "string"},
                "selector": {"type": "string"},
                "value": {"description": "String, boolean or list depending on the control"}
            },
            "required": ["value"]
        })
    }

    fn validate_params(&self, command: &ActionCommand) -> Result<()> {
        require_target(command)?;
        match command.get("value") {
            None | Some(Value::Null) => Err(AutomationError::ValidationFailed(
                "fill requires a 'value' parameter".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value> {
        let value = command.get("value").cloned().unwrap_or(Value::Null);
        let doc = context.page.snapshot().await?;
        let resolution = context
            .resolver
            .resolve(&doc, &resolve_request(command, Purpose::Fill))?;
        let writes = plan_for_element(&doc, resolution.node, &value)?;

        let batch = [FieldWrite {
            field: resolution.handle.selector.clone(),
            writes,
        }];
        let outcomes = context.page.apply_writes(&batch).await?;
        if let Some(error) = outcomes.into_iter().find_map(|o| o.error) {
            return Err(AutomationError::ExecutionFailed(error));
        }

        let mut data = resolution_data(&resolution);
        data["value"] = value;
        Ok(data)
    }
}

/// `fields` may arrive as an object or as a JSON string holding one.
fn fields_param(command: &ActionCommand) -> Result<Map<String, Value>> {
    let invalid = |detail: &str| {
        AutomationError::ValidationFailed(format!("fillForm 'fields' must be an object: {}", detail))
    };
    match command.get("fields") {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(invalid("string does not hold a JSON object")),
            Err(e) => Err(invalid(&e.to_string())),
        },
        Some(_) => Err(invalid("unexpected JSON type")),
        None => Err(invalid("missing")),
    }
}

pub struct FillFormAction;

#[async_trait]
impl Action for FillFormAction {
    fn action_type(&self) -> ActionType {
        ActionType::FillForm
    }

    fn description(&self) -> &str {
        "Fill several fields of one form in a single batch"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "formId": {"type": "string", "description": "Defaults to the form with the largest field overlap"},
                "fields": {"type": ["object", "string"]}
            },
            "required": ["fields"]
        })
    }

    fn validate_params(&self, command: &ActionCommand) -> Result<()> {
        let fields = fields_param(command)?;
        if fields.is_empty() {
            return Err(AutomationError::ValidationFailed(
                "fillForm 'fields' must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value> {
        let fields = fields_param(command)?;
        context.detect_forms().await?;

        let result = match command.param_str("formId") {
            Some(id) => context.forms.fill_form(&mut *context.page, id, &fields).await?,
            None => context.forms.fill_any_form(&mut *context.page, &fields).await?,
        };
        if !result.success {
            return Err(AutomationError::FillIncomplete(Box::new(result)));
        }
        Ok(serde_json::to_value(&result)?)
    }
}

pub struct SubmitFormAction;

#[async_trait]
impl Action for SubmitFormAction {
    fn action_type(&self) -> ActionType {
        ActionType::SubmitForm
    }

    fn description(&self) -> &str {
        "Submit a registered form, or the first one when no id is given"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"formId": {"type": "string"}}
        })
    }

    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value> {
        context.detect_forms().await?;
        let result = match command.param_str("formId") {
            Some(id) => context.forms.submit_form(&mut *context.page, id).await?,
            None => context.forms.submit_any_form(&mut *context.page).await?,
        };
        Ok(serde_json::to_value(&result)?)
    }
}

fn region_param(command: &ActionCommand) -> Result<Option<Region>> {
    match command.get("region") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => raw.parse().map(Some),
        Some(value @ Value::Object(_)) => {
            let region: Region = serde_json::from_value(value.clone())
                .map_err(|e| AutomationError::ValidationFailed(format!("invalid region: {}", e)))?;
            if region.width <= 0.0 || region.height <= 0.0 {
                return Err(AutomationError::ValidationFailed(
                    "region must have a positive size".to_string(),
                ));
            }
            Ok(Some(region))
        }
        Some(_) => Err(AutomationError::ValidationFailed(
            "region must be 'x,y,width,height' or an object".to_string(),
        )),
    }
}

fn screenshot_request(command: &ActionCommand) -> Result<ScreenshotRequest> {
    let mut request = ScreenshotRequest::default();
    if let Some(format) = command.param_str("format") {
        request.format = format.parse::<ImageFormat>()?;
    }
    if let Some(quality) = command.param_u64("quality")? {
        if !(1..=100).contains(&quality) {
            return Err(AutomationError::ValidationFailed(format!(
                "quality must be between 1 and 100, got {}",
                quality
            )));
        }
        request.quality = quality as u8;
    }
    request.region = region_param(command)?;
    Ok(request)
}

pub struct ScreenshotAction;

#[async_trait]
impl Action for ScreenshotAction {
    fn action_type(&self) -> ActionType {
        ActionType::Screenshot
    }

    fn description(&self) -> &str {
        "Capture the page, or a region of it, as a base64 image"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {"type": "string", "enum": ["png", "jpeg", "webp"], "default": "png"},
                "quality": {"type": "integer", "minimum": 1, "maximum": 100, "default": 80},
                "region": {"type": ["string", "object"], "description": "x,y,width,height"}
            }
        })
    }

    fn validate_params(&self, command: &ActionCommand) -> Result<()> {
        screenshot_request(command).map(|_| ())
    }

    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value> {
        let request = screenshot_request(command)?;
        let data = ScreenshotManager::take_base64(&mut *context.page, &request).await?;
        Ok(json!({
            "format": request.format.as_str(),
            "data": data,
        }))
    }
}

fn condition_met(doc: &Document, selector: Option<&SelectorList>, text: Option<&str>) -> bool {
    let selector_ok = selector
        .map(|list| !doc.select_parsed(doc.root(), list).is_empty())
        .unwrap_or(true);
    let text_ok = text
        .map(|needle| {
            let needle = needle.to_lowercase();
            doc.elements().into_iter().any(|n| {
                !is_skipped(doc, n) && doc.own_text(n).to_lowercase().contains(&needle)
            })
        })
        .unwrap_or(true);
    selector_ok && text_ok
}

pub struct WaitAction;

#[async_trait]
impl Action for WaitAction {
    fn action_type(&self) -> ActionType {
        ActionType::Wait
    }

    fn description(&self) -> &str {
        "Sleep for a duration, or poll until a selector or text appears"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "duration": {"type": "integer", "description": "Milliseconds to sleep"},
                "selector": {"type": "string"},
                "text": {"type": "string"},
                "maxWait": {"type": "integer", "description": "Polling limit in milliseconds"}
            }
        })
    }

    fn validate_params(&self, command: &ActionCommand) -> Result<()> {
        let duration = command.param_u64("duration")?;
        command.param_u64("maxWait")?;
        if let Some(selector) = command.param_str("selector") {
            SelectorList::parse(selector)?;
        }
        if duration.is_none() && command.param_str("selector").is_none() && command.param_str("text").is_none() {
            return Err(AutomationError::ValidationFailed(
                "wait requires 'duration', 'selector' or 'text'".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, command: &ActionCommand, context: &mut ActionContext<'_>) -> Result<Value> {
        let selector = command.param_str("selector").map(SelectorList::parse).transpose()?;
        let text = command.param_str("text");

        if selector.is_none() && text.is_none() {
            let duration = command.param_u64("duration")?.unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(duration)).await;
            return Ok(json!({"waitedMs": duration}));
        }

        let max_wait = command
            .param_u64("maxWait")?
            .unwrap_or(context.config.wait.max_wait_ms);
        let poll = Duration::from_millis(context.config.wait.poll_interval_ms);
        let started = Instant::now();
        let deadline = started + Duration::from_millis(max_wait);

        loop {
            let doc = context.page.snapshot().await?;
            if condition_met(&doc, selector.as_ref(), text) {
                let waited = started.elapsed().as_millis() as u64;
                debug!("wait condition met after {} ms", waited);
                return Ok(json!({"waitedMs": waited, "conditionMet": true}));
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(max_wait));
            }
            tokio::time::sleep(poll.min(deadline.saturating_duration_since(Instant::now()))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MemoryPage;
    use crate::core::Config;
    use crate::forms::FormRegistry;
    use crate::locator::ElementResolver;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    struct Fixture {
        page: MemoryPage,
        forms: FormRegistry,
        resolver: ElementResolver,
        config: Config,
    }

    impl Fixture {
        fn new(html: &str) -> Self {
            let mut forms = FormRegistry::new(8);
            forms.initialize().unwrap();
            Self {
                page: MemoryPage::from_html(html),
                forms,
                resolver: ElementResolver::new(),
                config: Config::default(),
            }
        }

        async fn run(&mut self, action: &dyn Action, command: ActionCommand) -> Result<Value> {
            action.validate_params(&command)?;
            let mut context = ActionContext::new(&mut self.page, &mut self.forms, &self.resolver, &self.config);
            action.execute(&command, &mut context).await
        }
    }

    #[tokio::test]
    async fn click_targets_the_command_description() {
        let mut fixture = Fixture::new("<button id='go'>Continue</button>");
        let command = ActionCommand::new(ActionType::Click).description("Continue");
        let data = fixture.run(&ClickAction, command).await.unwrap();
        assert_eq!(data["selector"], "#go");
        assert_eq!(fixture.page.clicks(), &["#go".to_string()]);

        assert_err!(ClickAction.validate_params(&ActionCommand::new(ActionType::Click).description("  ")));
    }

    #[test]
    fn validation_rejects_missing_parameters() {
        assert_err!(NavigateAction.validate_params(&ActionCommand::new(ActionType::Navigate)));
        assert_err!(NavigateAction
            .validate_params(&ActionCommand::new(ActionType::Navigate).param("url", "not a url")));
        assert_err!(ClickAction.validate_params(&ActionCommand::new(ActionType::Click)));
        assert_err!(FillAction.validate_params(&ActionCommand::new(ActionType::Fill).param("selector", "#a")));
        assert_err!(WaitAction.validate_params(&ActionCommand::new(ActionType::Wait)));
        assert_err!(WaitAction.validate_params(&ActionCommand::new(ActionType::Wait).param("selector", "a:hover")));
        assert_err!(ScreenshotAction
            .validate_params(&ActionCommand::new(ActionType::Screenshot).param("quality", 0)));
    }

    #[test]
    fn fields_accepts_object_or_json_string() {
        let object = ActionCommand::new(ActionType::FillForm).param("fields", json!({"a": "1"}));
        assert_eq!(fields_param(&object).unwrap().len(), 1);

        let string = ActionCommand::new(ActionType::FillForm).param("fields", r#"{"a": "1", "b": true}"#);
        assert_eq!(fields_param(&string).unwrap().len(), 2);

        let malformed = ActionCommand::new(ActionType::FillForm).param("fields", "{oops");
        let err = fields_param(&malformed).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn fill_resolves_by_label() {
        let mut fixture = Fixture::new(r#"<label for="mail">Email address</label><input id="mail">"#);
        let command = ActionCommand::new(ActionType::Fill)
            .param("description", "Email address")
            .param("value", "a@b.c");
        let data = assert_ok!(fixture.run(&FillAction, command).await);
        assert_eq!(data["selector"], "#mail");

        let doc = fixture.page.document();
        let input = doc.select_first("#mail").unwrap().unwrap();
        assert_eq!(doc.attr(input, "value"), Some("a@b.c"));
    }

    #[tokio::test]
    async fn fill_form_auto_detects_and_reports_failures() {
        let mut fixture = Fixture::new(
            r#"<form id="signup"><input name="email"><input type="file" name="cv"></form>"#,
        );
        let command = ActionCommand::new(ActionType::FillForm)
            .param("fields", json!({"email": "a@b.c", "cv": "x.pdf"}));
        let err = fixture.run(&FillFormAction, command).await.unwrap_err();
        assert!(matches!(err, AutomationError::FillIncomplete(_)));
        let data = err.data().unwrap();
        assert_eq!(data["formId"], "signup");
        assert_eq!(data["failedFields"], json!(["cv"]));
    }

    #[tokio::test]
    async fn wait_polls_until_timeout() {
        let mut fixture = Fixture::new("<p>Loading</p>");
        fixture.config.wait.poll_interval_ms = 5;

        let found = ActionCommand::new(ActionType::Wait).param("text", "loading");
        assert_ok!(fixture.run(&WaitAction, found).await);

        let missing = ActionCommand::new(ActionType::Wait)
            .param("selector", "#done")
            .param("maxWait", 30);
        let err = fixture.run(&WaitAction, missing).await.unwrap_err();
        assert!(matches!(err, AutomationError::Timeout(30)));
    }

    #[tokio::test]
    async fn screenshot_is_not_supported_in_memory() {
        let mut fixture = Fixture::new("<p>x</p>");
        let err = fixture
            .run(&ScreenshotAction, ActionCommand::new(ActionType::Screenshot))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::BrowserNotSupported);
    }
}
