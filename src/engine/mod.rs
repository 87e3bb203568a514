//! Top-level façade: lifecycle, sequencing, form bookkeeping and events.

pub mod events;

pub use events::{EngineEvent, EventBus, EventType, Listener, ListenerId};

use crate::actions::{ActionCommand, ActionContext, ActionExecutor, ActionType, ExecutionResult};
use crate::context::{capture_page_context, FormContext, PageContext};
use crate::core::{Config, PageDriver};
use crate::errors::{AutomationError, Result};
use crate::forms::{ChangeQueue, FormRegistry, SyncReport};
use crate::locator::ElementResolver;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Ready,
    Disposed,
}

pub struct AutomationEngine {
    id: String,
    page: Box<dyn PageDriver>,
    forms: FormRegistry,
    resolver: ElementResolver,
    executor: ActionExecutor,
    config: Config,
    events: EventBus,
    changes: Option<ChangeQueue>,
    state: EngineState,
}

impl AutomationEngine {
    pub fn new(page: Box<dyn PageDriver>, config: Config) -> Result<Self> {
        Self::with_executor(page, config, ActionExecutor::default())
    }

    pub fn with_executor(page: Box<dyn PageDriver>, config: Config, executor: ActionExecutor) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            page,
            forms: FormRegistry::new(config.forms.max_forms),
            resolver: ElementResolver::new(),
            executor,
            events: EventBus::new(config.engine.debug),
            changes: None,
            state: EngineState::Created,
            config,
        })
    }

    /// Random id carried in lifecycle events and logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn forms(&self) -> &FormRegistry {
        &self.forms
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut ActionExecutor {
        &mut self.executor
    }

    pub fn page_mut(&mut self) -> &mut dyn PageDriver {
        &mut *self.page
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn on<F>(&mut self, event_type: EventType, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.events.on(event_type, listener)
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            EngineState::Ready => Ok(()),
            EngineState::Created => Err(AutomationError::NotInitialized("automation engine")),
            EngineState::Disposed => Err(AutomationError::Disposed("automation engine")),
        }
    }

    pub async fn initialize(&mut self) -> Result<()> {
        match self.state {
            EngineState::Created => {}
            EngineState::Ready => return Err(AutomationError::AlreadyInitialized("automation engine")),
            EngineState::Disposed => return Err(AutomationError::Disposed("automation engine")),
        }
        self.forms.initialize()?;

        if self.config.forms.track_changes && self.page.capabilities().supports_change_tracking {
            let (feed, queue) = ChangeQueue::channel(Duration::from_millis(self.config.forms.debounce_ms));
            self.page.attach_change_feed(feed).await?;
            self.changes = Some(queue);
            debug!("change tracking attached ({} ms window)", self.config.forms.debounce_ms);
        }

        self.state = EngineState::Ready;
        if self.config.engine.auto_detect_forms {
            self.rescan(0).await?;
        }

        info!("automation engine {} initialized with {} forms", self.id, self.forms.len());
        self.events.emit(
            EventType::EngineInitialized,
            json!({ "engineId": self.id, "forms": self.forms.ids() }),
        )
    }

    /// Drop every record and stop tracking. Disposing twice is a no-op.
    pub async fn dispose(&mut self) -> Result<()> {
        match self.state {
            EngineState::Created => return Err(AutomationError::NotInitialized("automation engine")),
            EngineState::Disposed => return Ok(()),
            EngineState::Ready => {}
        }
        self.forms.dispose()?;
        self.changes = None;
        self.state = EngineState::Disposed;
        info!("automation engine {} disposed", self.id);
        self.events.emit(EventType::EngineDisposed, json!({ "engineId": self.id }))
    }

    /// Run one command. Failures come back inside the result; `Err` means the engine was
    /// not ready or a listener failed in debug mode.
    pub async fn execute_action(&mut self, command: &ActionCommand) -> Result<ExecutionResult> {
        self.ensure_ready()?;
        let action_type = command.action_type();
        self.events.emit(
            EventType::ActionStarted,
            json!({ "type": action_type, "description": command.description_text() }),
        )?;

        let (result, detected) = {
            let mut context = ActionContext::new(&mut *self.page, &mut self.forms, &self.resolver, &self.config);
            let result = self.executor.execute(command, &mut context).await;
            (result, context.detected)
        };

        if let Some(report) = detected.filter(|r| !r.is_empty()) {
            self.events.emit(EventType::FormsDetected, json!(report))?;
        }
        self.emit_result(action_type, &result)?;
        Ok(result)
    }

    fn emit_result(&self, action_type: ActionType, result: &ExecutionResult) -> Result<()> {
        let payload = serde_json::to_value(result)?;
        if !result.success() {
            return self.events.emit(EventType::ActionFailed, payload);
        }
        match action_type {
            ActionType::FillForm => {
                self.events.emit(EventType::FormFilled, result.data().cloned().unwrap_or(Value::Null))?
            }
            ActionType::SubmitForm => {
                self.events.emit(EventType::FormSubmitted, result.data().cloned().unwrap_or(Value::Null))?
            }
            _ => {}
        }
        self.events.emit(EventType::ActionCompleted, payload)
    }

    /// Parse and run a raw JSON command; malformed input becomes a failed result.
    pub async fn execute_raw(&mut self, raw: Value) -> Result<ExecutionResult> {
        self.ensure_ready()?;
        match ActionCommand::from_value(raw) {
            Ok(command) => self.execute_action(&command).await,
            Err(e) => {
                warn!("rejected command: {}", e);
                let result = ExecutionResult::failed(None, &e, 0);
                self.events.emit(EventType::ActionFailed, serde_json::to_value(&result)?)?;
                Ok(result)
            }
        }
    }

    /// Run commands in order. In debug mode the batch stops at the first failure.
    pub async fn execute_actions(&mut self, commands: &[ActionCommand]) -> Result<Vec<ExecutionResult>> {
        self.ensure_ready()?;
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = self.execute_action(command).await?;
            let failed = !result.success();
            results.push(result);
            if failed && self.config.engine.debug {
                warn!(
                    "stopping batch after failed {} ({} of {} skipped)",
                    command.action_type(),
                    commands.len() - results.len(),
                    commands.len()
                );
                break;
            }
        }
        Ok(results)
    }

    /// Check a command against its handler without touching the page.
    pub fn validate_action(&self, command: &ActionCommand) -> Result<()> {
        self.executor.prepare(command).map(|_| ())
    }

    pub async fn capture_context(&mut self) -> Result<PageContext> {
        self.ensure_ready()?;
        let context =
            capture_page_context(&mut *self.page, &self.forms, self.config.engine.max_context_elements).await?;
        self.events.emit(
            EventType::ContextCaptured,
            json!({
                "url": context.url,
                "totalFormsFound": context.total_forms_found,
                "elements": context.elements.len(),
            }),
        )?;
        Ok(context)
    }

    /// Register the element matched by `selector` as form `id`.
    pub async fn register_form(&mut self, id: &str, selector: &str) -> Result<FormContext> {
        self.ensure_ready()?;
        let doc = self.page.snapshot().await?;
        let node = doc
            .select_first(selector)?
            .ok_or_else(|| AutomationError::ElementNotFound {
                query: selector.to_string(),
                candidates: Vec::new(),
            })?;
        let record = self.forms.register_form(id, &doc, node)?;
        let context = FormContext::from_record(record, true);
        self.events.emit(EventType::FormRegistered, json!(context))?;
        Ok(context)
    }

    pub async fn unregister_form(&mut self, id: &str) -> Result<()> {
        self.ensure_ready()?;
        let record = self.forms.unregister_form(id)?;
        self.events.emit(EventType::FormUnregistered, json!({ "formId": record.id() }))
    }

    async fn rescan(&mut self, changes: usize) -> Result<SyncReport> {
        let doc = self.page.snapshot().await?;
        let report = self.forms.sync_detected(&doc)?;
        if !report.is_empty() {
            info!(
                "re-scan after {} changes: +{} -{} ~{}",
                changes,
                report.added.len(),
                report.removed.len(),
                report.updated.len()
            );
            self.events.emit(EventType::FormsDetected, json!(report))?;
        }
        Ok(report)
    }

    /// Re-scan once if a debounced batch of relevant changes is ready.
    pub async fn process_changes(&mut self) -> Result<Option<SyncReport>> {
        self.ensure_ready()?;
        self.page.flush_changes().await?;
        let Some(batch) = self.changes.as_mut().and_then(ChangeQueue::poll_ready) else {
            return Ok(None);
        };
        self.rescan(batch.len()).await.map(Some)
    }

    /// Poll for a re-scan until one happens or `timeout` elapses.
    pub async fn wait_for_form_changes(&mut self, timeout: Duration) -> Result<Option<SyncReport>> {
        self.ensure_ready()?;
        if self.changes.is_none() {
            return Ok(None);
        }
        let deadline = Instant::now() + timeout;
        let interval = Duration::from_millis(self.config.wait.poll_interval_ms);
        loop {
            if let Some(report) = self.process_changes().await? {
                return Ok(Some(report));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}

impl std::fmt::Debug for AutomationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationEngine")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("forms", &self.forms.len())
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MemoryPage;
    use crate::errors::ErrorKind;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    fn engine(html: &str, config: Config) -> AutomationEngine {
        AutomationEngine::new(Box::new(MemoryPage::from_html(html)), config).unwrap()
    }

    fn recorder(engine: &mut AutomationEngine) -> Arc<Mutex<Vec<EventType>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.events_mut().on_any(move |event| {
            sink.lock().unwrap().push(event.event_type);
            Ok(())
        });
        seen
    }

    #[tokio::test]
    async fn lifecycle_guards() {
        let mut engine = engine("<p>hi</p>", Config::default());
        let command = ActionCommand::new(ActionType::Wait).param("duration", 1);
        let err = assert_err!(engine.execute_action(&command).await);
        assert!(err.is_contract_violation());
        assert_err!(engine.dispose().await);

        assert_ok!(engine.initialize().await);
        assert_err!(engine.initialize().await);
        assert_ok!(engine.dispose().await);
        assert_ok!(engine.dispose().await);
        assert_err!(engine.capture_context().await);
    }

    #[tokio::test]
    async fn initialize_detects_forms() {
        let mut engine = engine(
            "<form id='login'><input name='user'><input name='pass' type='password'></form>",
            Config::default(),
        );
        let seen = recorder(&mut engine);
        engine.initialize().await.unwrap();
        assert_eq!(engine.forms().ids(), vec!["login".to_string()]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventType::FormsDetected, EventType::EngineInitialized]
        );
    }

    #[tokio::test]
    async fn fill_form_emits_events() {
        let mut engine = engine(
            "<form id='login'><input name='user'><button type='submit'>Go</button></form>",
            Config::default(),
        );
        engine.initialize().await.unwrap();
        let seen = recorder(&mut engine);

        let command = ActionCommand::new(ActionType::FillForm)
            .param("formId", "login")
            .param("fields", json!({"user": "ada"}));
        let result = engine.execute_action(&command).await.unwrap();
        assert!(result.success());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventType::ActionStarted, EventType::FormFilled, EventType::ActionCompleted]
        );
    }

    #[tokio::test]
    async fn failing_listener_only_fails_in_debug() {
        let html = "<button id='go'>Go</button>";
        let click = ActionCommand::new(ActionType::Click).param("selector", "#go");

        let mut relaxed = engine(html, Config::default());
        relaxed.initialize().await.unwrap();
        relaxed.on(EventType::ActionCompleted, |_| {
            Err(AutomationError::ExecutionFailed("listener".into()))
        });
        assert!(relaxed.execute_action(&click).await.unwrap().success());

        let mut strict = engine(html, Config::default().with_debug(true));
        strict.initialize().await.unwrap();
        strict.on(EventType::ActionCompleted, |_| {
            Err(AutomationError::ExecutionFailed("listener".into()))
        });
        let err = assert_err!(strict.execute_action(&click).await);
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }

    #[tokio::test]
    async fn raw_commands_with_unknown_types_fail_softly() {
        let mut engine = engine("<p>x</p>", Config::default());
        engine.initialize().await.unwrap();
        let result = engine
            .execute_raw(json!({"type": "hover", "parameters": {}}))
            .await
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.error_code(), Some(ErrorKind::ValidationFailed));
    }

    #[tokio::test]
    async fn explicit_registration_round_trip() {
        let mut engine = engine(
            "<div id='card'><input name='code'></div>",
            Config::default(),
        );
        engine.initialize().await.unwrap();

        let context = engine.register_form("otp", "#card").await.unwrap();
        assert_eq!(context.field_count, 1);
        let err = assert_err!(engine.register_form("otp", "#card").await);
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        let err = assert_err!(engine.register_form("other", "#missing").await);
        assert_eq!(err.kind(), ErrorKind::ElementNotFound);

        assert_ok!(engine.unregister_form("otp").await);
        let err = assert_err!(engine.unregister_form("otp").await);
        assert_eq!(err.kind(), ErrorKind::FormNotFound);
    }

    #[tokio::test]
    async fn validate_action_checks_parameters() {
        let engine = engine("<p>x</p>", Config::default());
        assert_ok!(engine.validate_action(&ActionCommand::new(ActionType::Navigate).param("url", "https://a.test")));
        assert_err!(engine.validate_action(&ActionCommand::new(ActionType::Navigate)));
        assert_err!(engine.validate_action(&ActionCommand::new(ActionType::Click)));
    }
}
