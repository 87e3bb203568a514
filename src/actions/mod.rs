pub mod base;
pub mod builtin;
pub mod command;
pub mod executor;
pub mod registry;

pub use base::{Action, ActionContext};
pub use command::{ActionCommand, ActionStatus, ActionType, ExecutionResult};
pub use executor::ActionExecutor;
pub use registry::{ActionMetadata, ActionRegistry};
