//! The `ActionExecutor` trait — the contract every action type must fulfil.

use std::sync::Arc;

use async_trait::async_trait;
use expressions::{ExpressionEngine, ValueContainer, NULL};

use crate::ExecutionError;

/// What an executor factory receives for one action dispatch.
///
/// Defined here (in the actions crate) so both the engine and individual
/// executor implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Name of the action as declared in the flow document.
    pub action_name: String,
    /// The action's input template, fully resolved against the run's
    /// evaluation context before dispatch.
    pub inputs: ValueContainer,
    /// The expression engine, for executors that evaluate formulas of
    /// their own (response mappings and the like).
    pub engine: Arc<ExpressionEngine>,
}

/// The value an executor produces on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionResult {
    /// Output published into the evaluation context under the action's
    /// name. `None` publishes nothing; downstream `outputs(..)` sees Null.
    pub output: Option<ValueContainer>,
}

impl ActionResult {
    /// A result carrying the given output.
    pub fn with_output(output: ValueContainer) -> Self {
        Self {
            output: Some(output),
        }
    }
}

/// The core executor trait.
///
/// All built-in executors and external extensions implement this; the engine
/// dispatches through the trait object a registered factory produces.
#[async_trait]
pub trait ActionExecutor: Send {
    /// The fully resolved input container for this action.
    fn inputs(&self) -> &ValueContainer;

    /// Shorthand for `inputs()["parameters"]` — the conventional home of an
    /// action's operation arguments.
    fn parameters(&self) -> &ValueContainer {
        match self.inputs() {
            ValueContainer::Mapping(entries) => entries.get("parameters").unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Run the action. May be long-running; the engine bounds it with the
    /// configured per-action timeout.
    async fn execute(&mut self) -> Result<ActionResult, ExecutionError>;
}
