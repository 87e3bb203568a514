pub mod actions;
pub mod browser;
pub mod context;
pub mod core;
pub mod dom;
pub mod engine;
pub mod errors;
pub mod forms;
pub mod locator;
pub mod matching;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod utils;

pub use actions::{ActionCommand, ActionExecutor, ActionRegistry, ActionStatus, ActionType, ExecutionResult};
#[cfg(feature = "chrome")]
pub use browser::ChromePage;
pub use browser::MemoryPage;
pub use context::{ElementContext, FieldContext, FormContext, PageContext};
pub use crate::core::{Config, PageDriver};
pub use engine::{AutomationEngine, EngineEvent, EventType};
pub use errors::{AutomationError, ErrorKind, Result};
pub use forms::{FieldDescriptor, FieldKind, FieldValue, FormFillResult, FormRegistry};
pub use locator::ElementResolver;
pub use types::*;
