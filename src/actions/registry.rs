use crate::actions::base::Action;
use crate::actions::builtin;
use crate::actions::command::ActionType;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of action handlers, one per type
pub struct ActionRegistry {
    actions: HashMap<ActionType, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Registry with every built-in handler
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::NavigateAction);
        registry.register(builtin::ClickAction);
        registry.register(builtin::FillAction);
        registry.register(builtin::FillFormAction);
        registry.register(builtin::SubmitFormAction);
        registry.register(builtin::ScreenshotAction);
        registry.register(builtin::WaitAction);
        registry
    }

    /// Register a handler, replacing any previous one for the same type
    pub fn register<A: Action + 'static>(&mut self, action: A) {
        self.actions.insert(action.action_type(), Arc::new(action));
    }

    pub fn unregister(&mut self, action_type: ActionType) -> Option<Arc<dyn Action>> {
        self.actions.remove(&action_type)
    }

    pub fn get_action(&self, action_type: ActionType) -> Option<Arc<dyn Action>> {
        self.actions.get(&action_type).cloned()
    }

    pub fn list_actions(&self) -> Vec<ActionType> {
        ActionType::ALL
            .into_iter()
            .filter(|t| self.actions.contains_key(t))
            .collect()
    }

    pub fn get_action_metadata(&self, action_type: ActionType) -> Option<ActionMetadata> {
        self.get_action(action_type).map(|action| ActionMetadata::of(action.as_ref()))
    }

    /// Metadata for all handlers, in type order
    pub fn get_all_metadata(&self) -> Vec<ActionMetadata> {
        self.list_actions()
            .into_iter()
            .filter_map(|t| self.get_action_metadata(t))
            .collect()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Metadata about an action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub description: String,
    pub parameter_schema: serde_json::Value,
}

impl ActionMetadata {
    fn of(action: &dyn Action) -> Self {
        Self {
            action_type: action.action_type(),
            description: action.description().to_string(),
            parameter_schema: action.parameter_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_every_type() {
        let registry = ActionRegistry::with_builtin();
        assert_eq!(registry.list_actions(), ActionType::ALL.to_vec());
        let metadata = registry.get_all_metadata();
        assert_eq!(metadata.len(), 7);
        assert!(metadata.iter().all(|m| m.parameter_schema.is_object()));
    }

    #[test]
    fn unregistered_types_have_no_handler() {
        let mut registry = ActionRegistry::with_builtin();
        assert!(registry.unregister(ActionType::Screenshot).is_some());
        assert!(registry.get_action(ActionType::Screenshot).is_none());
        assert!(registry.get_action_metadata(ActionType::Screenshot).is_none());
        assert_eq!(registry.list_actions().len(), 6);
    }
}
