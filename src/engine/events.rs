use crate::errors::{AutomationError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FormRegistered,
    FormUnregistered,
    FormsDetected,
    FormFilled,
    FormSubmitted,
    ActionStarted,
    ActionCompleted,
    ActionFailed,
    ContextCaptured,
    EngineInitialized,
    EngineDisposed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FormRegistered => "form_registered",
            EventType::FormUnregistered => "form_unregistered",
            EventType::FormsDetected => "forms_detected",
            EventType::FormFilled => "form_filled",
            EventType::FormSubmitted => "form_submitted",
            EventType::ActionStarted => "action_started",
            EventType::ActionCompleted => "action_completed",
            EventType::ActionFailed => "action_failed",
            EventType::ContextCaptured => "context_captured",
            EventType::EngineInitialized => "engine_initialized",
            EventType::EngineDisposed => "engine_disposed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: i64,
    pub data: Value,
}

impl EngineEvent {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            timestamp: chrono::Utc::now().timestamp_millis(),
            data,
        }
    }
}

pub type Listener = Box<dyn Fn(&EngineEvent) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    filter: Option<EventType>,
    listener: Listener,
}

/// Synchronous observer list.
///
/// Listener errors and panics are logged and swallowed, except in strict mode where the
/// first failure stops delivery and is returned to the emitting call.
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
    strict: bool,
}

impl EventBus {
    pub fn new(strict: bool) -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 0,
            strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    fn subscribe(&mut self, filter: Option<EventType>, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.subscriptions.push(Subscription { id, filter, listener });
        id
    }

    /// Listen to one event type.
    pub fn on<F>(&mut self, event_type: EventType, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Some(event_type), Box::new(listener))
    }

    /// Listen to every event.
    pub fn on_any<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(None, Box::new(listener))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    pub fn emit(&self, event_type: EventType, data: Value) -> Result<()> {
        let event = EngineEvent::new(event_type, data);
        debug!("event {}", event_type);

        for subscription in &self.subscriptions {
            if subscription.filter.map(|f| f != event_type).unwrap_or(false) {
                continue;
            }
            let outcome = match catch_unwind(AssertUnwindSafe(|| (subscription.listener)(&event))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            let message = format!("listener for {} failed: {}", event_type, outcome);
            if self.strict {
                return Err(AutomationError::ListenerFailed(message));
            }
            warn!("{}", message);
        }
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.subscriptions.len())
            .field("strict", &self.strict)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn filtered_delivery() {
        let mut bus = EventBus::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.on(EventType::FormFilled, move |event| {
            assert_eq!(event.data["formId"], "login");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = Arc::clone(&all);
        let any = bus.on_any(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_ok!(bus.emit(EventType::FormFilled, json!({"formId": "login"})));
        assert_ok!(bus.emit(EventType::ActionStarted, Value::Null));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);

        assert!(bus.off(any));
        assert!(!bus.off(any));
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn failures_are_swallowed_unless_strict() {
        let mut bus = EventBus::new(false);
        bus.on_any(|_| Err(AutomationError::ExecutionFailed("boom".into())));
        bus.on_any(|_| panic!("listener exploded"));
        assert_ok!(bus.emit(EventType::EngineInitialized, Value::Null));

        bus.set_strict(true);
        let err = assert_err!(bus.emit(EventType::EngineInitialized, Value::Null));
        assert_eq!(err.kind(), crate::errors::ErrorKind::ExecutionFailed);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn event_names_are_snake_case() {
        let event = EngineEvent::new(EventType::FormsDetected, json!({"added": ["f"]}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "forms_detected");
        assert_eq!(EventType::ContextCaptured.to_string(), "context_captured");
    }
}
